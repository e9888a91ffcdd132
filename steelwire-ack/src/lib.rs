/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # SteelWire Ack
//!
//! Acknowledgment correlation for the SteelWire gateway engine.
//!
//! Maps outbound messages to eventual ACK/NACK/timeout outcomes. Pending
//! state is persisted, so a process restart neither loses nor extends an
//! outstanding timeout: hydration resolves already-elapsed records to
//! `TimedOut` immediately and re-arms the rest with their remaining
//! duration only.
//!
//! Resolution and the timeout check race on the same record; an atomic
//! compare-on-status update ensures exactly one wins.

pub mod correlator;
pub mod handle;

pub use correlator::{AckCorrelator, AckStatus, HydrationReport, PendingAck};
pub use handle::{AckHandle, Acknowledgment};
