/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # SteelWire Session
//!
//! Session layer for the SteelWire gateway engine.
//!
//! This crate provides:
//! - **Configuration**: Session configuration options and builder
//! - **State machine**: Session FSM with persisted records and validated transitions
//! - **Sequence ledger**: Durable per-session counters with compare-and-swap semantics
//! - **Duplicate guard**: Persistent idempotency check keyed by business reference
//! - **Gap recovery**: Bounded recovery requests for missing sequence ranges
//! - **Heartbeat**: Keep-alive probing and missed-response tracking

pub mod config;
pub mod duplicate;
pub mod heartbeat;
pub mod ledger;
pub mod recovery;
pub mod state;

pub use config::{SessionConfig, SessionConfigBuilder};
pub use duplicate::{DuplicateCheck, DuplicateGuard};
pub use heartbeat::HeartbeatMonitor;
pub use ledger::{SequenceCheck, SequenceLedger};
pub use recovery::{GapRecovery, RecoveryStatus};
pub use state::{SessionRegistry, SessionState};
