/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # SteelWire Core
//!
//! Core types, traits, and error definitions for the SteelWire gateway engine.
//!
//! This crate provides:
//! - **Types**: Sequence numbers, message references, counterparty and session identifiers
//! - **Errors**: Unified `thiserror` hierarchy for all gateway operations
//! - **Messages**: The gateway message model and the integrity trailer wire format

pub mod error;
pub mod message;
pub mod types;

pub use error::{AckError, GatewayError, IntegrityError, Result, SessionError, StoreError};
pub use message::{AckResolution, GatewayMessage, Trailer};
pub use types::{CounterpartyId, MsgRef, SeqNum, SessionId};
