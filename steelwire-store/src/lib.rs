/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # SteelWire Store
//!
//! Persistent key-value store abstraction for the SteelWire gateway engine.
//!
//! All durable gateway state (sequence counters, duplicate records, pending
//! acknowledgments, gap records, session records) lives behind the
//! [`KvStore`] trait: versioned values with atomic compare-and-swap and
//! optional TTL, durable and visible across process instances.
//!
//! The in-memory implementation is the reference semantics for external
//! stores and is suitable for tests and single-process deployments.

pub mod memory;
pub mod traits;

pub use memory::MemoryStore;
pub use traits::{CasOutcome, KvStore, VersionedValue};
