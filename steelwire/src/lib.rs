/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # SteelWire
//!
//! A resilient bilateral messaging gateway engine for Rust.
//!
//! SteelWire keeps sequence-numbered message flows correct across crashes,
//! restarts and concurrent process instances: durable per-session counters,
//! duplicate suppression, integrity trailers, signed session establishment,
//! bounded gap recovery and persisted acknowledgment correlation.
//!
//! ## Features
//!
//! - **Durable sequencing**: Counters persist before numbers are handed out
//! - **Shared state**: All session state lives in a pluggable versioned
//!   store; instances cooperate through compare-and-swap
//! - **Integrity trailers**: SHA-256 checksum plus keyed HMAC on every frame
//! - **Bounded recovery**: Missing ranges are re-requested a limited number
//!   of times, then surfaced as fatal
//! - **Persisted acknowledgments**: Timeouts survive restarts with their
//!   original deadlines
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use steelwire::prelude::*;
//!
//! let controller = GatewayBuilder::new()
//!     .config(SessionConfig::new(
//!         CounterpartyId::new("BANKGB2L").unwrap(),
//!         CounterpartyId::new("BANKDEFF").unwrap(),
//!         "credentials",
//!     ))
//!     .store(store)
//!     .transport(transport)
//!     .keys(keys)
//!     .delivery(handler)
//!     .build()?;
//!
//! controller.establish().await?;
//! let ack = controller.send_business(reference, payload).await?.wait().await?;
//! ```
//!
//! ## Crate Organization
//!
//! - [`core`]: Fundamental types, messages, and error definitions
//! - [`store`]: Versioned key-value store abstraction and in-memory backend
//! - [`integrity`]: Trailer sealing/opening and handshake signatures
//! - [`transport`]: Raw frame transport seam
//! - [`session`]: Session state, sequence ledger, duplicates, recovery,
//!   heartbeats
//! - [`ack`]: Acknowledgment correlation with persisted pending state
//! - [`engine`]: High-level session controller facade

pub mod core {
    //! Core types, messages, and error definitions.
    pub use steelwire_core::*;
}

pub mod store {
    //! Versioned key-value store abstraction and in-memory backend.
    pub use steelwire_store::*;
}

pub mod integrity {
    //! Trailer sealing/opening and handshake signatures.
    pub use steelwire_integrity::*;
}

pub mod transport {
    //! Raw frame transport seam.
    pub use steelwire_transport::*;
}

pub mod session {
    //! Session state, sequencing, duplicates, recovery, and heartbeats.
    pub use steelwire_session::*;
}

pub mod ack {
    //! Acknowledgment correlation with persisted pending state.
    pub use steelwire_ack::*;
}

pub mod engine {
    //! High-level session controller facade.
    pub use steelwire_engine::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    // Core types
    pub use steelwire_core::error::{
        AckError, GatewayError, IntegrityError, Result, SessionError, StoreError, TransportError,
    };
    pub use steelwire_core::message::{AckResolution, GatewayMessage, Trailer};
    pub use steelwire_core::types::{CounterpartyId, MsgRef, SeqNum, SessionId};

    // Store
    pub use steelwire_store::{CasOutcome, KvStore, MemoryStore, VersionedValue};

    // Integrity
    pub use steelwire_integrity::TrustedKeyProvider;

    // Transport
    pub use steelwire_transport::{ChannelTransport, Transport};

    // Session
    pub use steelwire_session::{
        DuplicateCheck, DuplicateGuard, GapRecovery, HeartbeatMonitor, RecoveryStatus,
        SequenceCheck, SequenceLedger, SessionConfig, SessionConfigBuilder, SessionRegistry,
        SessionState,
    };

    // Ack
    pub use steelwire_ack::{AckCorrelator, AckHandle, AckStatus, Acknowledgment};

    // Engine
    pub use steelwire_engine::{
        DeliveryHandler, GatewayBuilder, InboundDisposition, NoOpDelivery, SessionController,
    };
}

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn test_prelude_imports() {
        let seq = SeqNum::new(1);
        assert!(seq.is_valid());
        let reference = MsgRef::generate();
        assert!(!reference.is_empty());
    }

    #[test]
    fn test_session_id_from_config() {
        let config = SessionConfig::new(
            CounterpartyId::new("BANKGB2L").unwrap(),
            CounterpartyId::new("BANKDEFF").unwrap(),
            "secret",
        );
        assert_eq!(config.session_id().as_str(), "BANKGB2L->BANKDEFF");
    }

    #[test]
    fn test_state_gating_reexported() {
        assert!(SessionState::Active.allows_send());
        assert!(!SessionState::Degraded.allows_send());
    }
}
