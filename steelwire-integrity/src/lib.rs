/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # SteelWire Integrity
//!
//! Trailer/integrity validation for the SteelWire gateway engine.
//!
//! This crate provides:
//! - **Trailer**: SHA-256 content checksum plus HMAC-SHA256 keyed MAC,
//!   sealed into and opened from the `{MAC:<hex>}{CHK:<hex>}` wire trailer
//! - **Handshake**: signature verification of handshake responses against a
//!   trusted key looked up per counterparty
//!
//! All comparisons are constant-time. Any mismatch rejects the message
//! outright; nothing is partially trusted.

pub mod handshake;
pub mod trailer;

pub use handshake::{TrustedKeyProvider, sign_handshake_ack, verify_handshake_ack};
pub use trailer::{compute, open, seal, verify};
