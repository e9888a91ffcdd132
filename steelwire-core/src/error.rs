/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Error types for the SteelWire gateway engine.
//!
//! This module provides a unified error hierarchy using `thiserror` for typed,
//! domain-specific errors across all gateway operations.
//!
//! The taxonomy separates protocol-integrity failures (fatal), business
//! rejections carried by a NACK, acknowledgment timeouts, and store/transport
//! faults, so callers can branch on each without string matching.

use thiserror::Error;

/// Result type alias using [`GatewayError`] as the error type.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Top-level error type for all SteelWire operations.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Error in session layer operations.
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// Error in persistent store operations.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Message integrity verification failure.
    #[error("integrity error: {0}")]
    Integrity(#[from] IntegrityError),

    /// Acknowledgment correlation failure.
    #[error("ack error: {0}")]
    Ack(#[from] AckError),

    /// Transport primitive failure.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Message encoding or decoding failure.
    #[error("codec error: {0}")]
    Codec(String),

    /// I/O error from the environment.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        Self::Codec(err.to_string())
    }
}

/// Errors in session layer operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Session is not in the correct state for the operation.
    #[error("invalid session state: expected {expected}, current {current}")]
    InvalidState {
        /// Expected state for the operation.
        expected: String,
        /// Current session state.
        current: String,
    },

    /// Handshake was rejected by the counterparty.
    #[error("handshake rejected: {reason}")]
    HandshakeRejected {
        /// Reason for rejection.
        reason: String,
    },

    /// Handshake response carried a missing or invalid signature.
    #[error("handshake signature invalid for counterparty {counterparty}")]
    HandshakeSignatureInvalid {
        /// The counterparty whose signature failed verification.
        counterparty: String,
    },

    /// No trusted key is registered for the counterparty.
    #[error("no trusted key for counterparty {counterparty}")]
    UnknownCounterparty {
        /// The unknown counterparty identifier.
        counterparty: String,
    },

    /// Session is inactive: persisted last activity is older than the
    /// liveness timeout.
    #[error("session inactive: idle for {idle_ms} milliseconds")]
    SessionInactive {
        /// Elapsed time in milliseconds since the last recorded activity.
        idle_ms: u64,
    },

    /// Sequence number gap detected.
    #[error("sequence gap detected: expected {expected}, received {received}")]
    SequenceGap {
        /// Expected sequence number.
        expected: u64,
        /// Received sequence number.
        received: u64,
    },

    /// Sequence number too low (possible duplicate).
    #[error("sequence too low: expected >= {expected}, received {received}")]
    SequenceTooLow {
        /// Minimum expected sequence number.
        expected: u64,
        /// Received sequence number.
        received: u64,
    },

    /// Reconciliation found the local output counter ahead of the value the
    /// counterparty reported. Messages were sent but apparently never
    /// acknowledged; this is surfaced for manual reconciliation, never
    /// auto-resolved.
    #[error("sequence inconsistency: local output {local} ahead of counterparty-reported {reported}")]
    SequenceInconsistency {
        /// Local output sequence counter.
        local: u64,
        /// Counterparty-reported sequence value.
        reported: u64,
    },

    /// Gap recovery attempts exhausted for a missing range.
    #[error("recovery exhausted for range {begin}..={end} after {attempts} attempts")]
    RecoveryExhausted {
        /// Begin sequence of the missing range.
        begin: u64,
        /// End sequence of the missing range.
        end: u64,
        /// Number of recovery attempts made.
        attempts: u32,
    },

    /// Session configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Connection error.
    #[error("connection error: {0}")]
    Connection(String),
}

/// Errors in persistent store operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Compare-and-swap lost the race against a concurrent writer.
    #[error("compare-and-swap conflict on key {key}")]
    CasConflict {
        /// The contested key.
        key: String,
    },

    /// Key not found in the store.
    #[error("key not found: {key}")]
    NotFound {
        /// The missing key.
        key: String,
    },

    /// Stored value could not be decoded.
    #[error("store corrupted at key {key}: {reason}")]
    Corrupted {
        /// The affected key.
        key: String,
        /// Description of the corruption.
        reason: String,
    },

    /// I/O error in the persistent store.
    #[error("store i/o error: {0}")]
    Io(String),
}

/// Message integrity verification failures.
///
/// These are security failures, reported distinctly from protocol-level
/// rejections. A message failing any of these checks is rejected outright.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IntegrityError {
    /// Content checksum did not match the trailer.
    #[error("checksum mismatch")]
    ChecksumMismatch,

    /// Keyed MAC did not match the trailer.
    #[error("mac mismatch")]
    MacMismatch,

    /// Trailer is missing or structurally invalid.
    #[error("malformed trailer: {0}")]
    MalformedTrailer(String),
}

/// Acknowledgment correlation failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AckError {
    /// Counterparty rejected the message (NACK) with a reason code.
    #[error("message rejected: code={code}, text={text}")]
    Rejected {
        /// Counterparty reason code.
        code: String,
        /// Human-readable rejection details.
        text: String,
    },

    /// No acknowledgment arrived within the registered timeout.
    #[error("acknowledgment timed out for message {message_id}")]
    Timeout {
        /// The unacknowledged message identifier.
        message_id: String,
    },

    /// A pending record already exists for this message identifier.
    #[error("acknowledgment already registered for message {message_id}")]
    AlreadyRegistered {
        /// The duplicate message identifier.
        message_id: String,
    },

    /// The resolution channel closed before an outcome arrived.
    #[error("acknowledgment handle detached for message {message_id}")]
    Detached {
        /// The affected message identifier.
        message_id: String,
    },
}

/// Transport primitive failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The transport is closed.
    #[error("transport closed")]
    Closed,

    /// I/O failure in the underlying transport.
    #[error("transport i/o error: {0}")]
    Io(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_error_display() {
        let err = SessionError::SequenceGap {
            expected: 5,
            received: 10,
        };
        assert_eq!(
            err.to_string(),
            "sequence gap detected: expected 5, received 10"
        );
    }

    #[test]
    fn test_gateway_error_from_session() {
        let err: GatewayError = SessionError::RecoveryExhausted {
            begin: 12,
            end: 13,
            attempts: 3,
        }
        .into();
        assert!(matches!(
            err,
            GatewayError::Session(SessionError::RecoveryExhausted { attempts: 3, .. })
        ));
    }

    #[test]
    fn test_store_error_display() {
        let err = StoreError::CasConflict {
            key: "seq/A->B".to_string(),
        };
        assert_eq!(err.to_string(), "compare-and-swap conflict on key seq/A->B");
    }

    #[test]
    fn test_ack_error_rejected_carries_code() {
        let err = AckError::Rejected {
            code: "T27".to_string(),
            text: "invalid field".to_string(),
        };
        assert_eq!(err.to_string(), "message rejected: code=T27, text=invalid field");
    }

    #[test]
    fn test_integrity_error_distinct_variants() {
        assert_ne!(IntegrityError::ChecksumMismatch, IntegrityError::MacMismatch);
    }
}
