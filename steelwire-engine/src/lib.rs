/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # SteelWire Engine
//!
//! Session controller facade for the SteelWire gateway engine.
//!
//! This crate provides:
//! - **Controller**: session establishment, the inbound pipeline
//!   (integrity, sequencing, duplicate suppression, delivery), the outbound
//!   path with registered acknowledgments, and heartbeat supervision
//! - **Delivery**: the seam through which validated payloads reach the
//!   hosting application
//! - **Builder**: wiring of store, transport, trusted keys and delivery

pub mod builder;
pub mod controller;
pub mod delivery;

pub use builder::GatewayBuilder;
pub use controller::{InboundDisposition, SessionController};
pub use delivery::{DeliveryHandler, NoOpDelivery};
