/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Core types for gateway operations.
//!
//! This module provides fundamental types used throughout the SteelWire engine:
//! - [`SeqNum`]: Per-direction message sequence number
//! - [`MsgRef`]: Business message reference (idempotency key)
//! - [`CounterpartyId`]: Bilateral party identifier
//! - [`SessionId`]: Stable session identifier

use arrayvec::ArrayString;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum length for counterparty identifiers in bytes.
pub const COUNTERPARTY_ID_MAX_LEN: usize = 32;

/// Maximum length for message references in bytes.
pub const MSG_REF_MAX_LEN: usize = 64;

/// Maximum length for session identifiers in bytes: two maximum-length
/// counterparty identifiers joined by `->`, so [`SessionId::between`] can
/// never truncate.
pub const SESSION_ID_MAX_LEN: usize = 2 * COUNTERPARTY_ID_MAX_LEN + 2;

/// Gateway message sequence number.
///
/// Sequence numbers are unsigned 64-bit integers identifying message order
/// within a session and direction. They start at 1 and increment by exactly
/// one for each accepted message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct SeqNum(u64);

impl SeqNum {
    /// Creates a new sequence number.
    ///
    /// # Arguments
    /// * `value` - The sequence number value (should be >= 1 for accepted messages)
    #[inline]
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw sequence number value.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Returns the next sequence number.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Checks if this sequence number is valid (>= 1).
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 >= 1
    }
}

impl Default for SeqNum {
    fn default() -> Self {
        Self(1)
    }
}

impl From<u64> for SeqNum {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<SeqNum> for u64 {
    fn from(seq: SeqNum) -> Self {
        seq.0
    }
}

impl fmt::Display for SeqNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Business message reference.
///
/// The reference is the idempotency key for duplicate suppression and the
/// correlation key for acknowledgments. It is independent of the protocol
/// sequence number.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct MsgRef(ArrayString<MSG_REF_MAX_LEN>);

impl MsgRef {
    /// Creates a new message reference from a string slice.
    ///
    /// # Returns
    /// `Some(MsgRef)` if the string fits within the maximum length, `None` otherwise.
    #[must_use]
    pub fn new(s: &str) -> Option<Self> {
        ArrayString::from(s).ok().map(Self)
    }

    /// Generates a fresh unique reference (UUID v4).
    #[must_use]
    pub fn generate() -> Self {
        let id = uuid::Uuid::new_v4();
        let mut buf = ArrayString::new();
        let _ = std::fmt::write(&mut buf, format_args!("{id}"));
        Self(buf)
    }

    /// Returns the reference as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns true if the reference is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<str> for MsgRef {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for MsgRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MsgRef {
    type Err = arrayvec::CapacityError<()>;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ArrayString::try_from(s)
            .map(Self)
            .map_err(|_| arrayvec::CapacityError::new(()))
    }
}

/// Counterparty identifier for bilateral sessions.
///
/// Identifies the remote party for trusted-key lookup and session addressing.
/// Maximum length is 32 characters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct CounterpartyId(ArrayString<COUNTERPARTY_ID_MAX_LEN>);

impl CounterpartyId {
    /// Creates a new counterparty identifier from a string slice.
    ///
    /// # Returns
    /// `Some(CounterpartyId)` if the string fits within the maximum length,
    /// `None` otherwise.
    #[must_use]
    pub fn new(s: &str) -> Option<Self> {
        ArrayString::from(s).ok().map(Self)
    }

    /// Returns the identifier as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns true if the identifier is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<str> for CounterpartyId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for CounterpartyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CounterpartyId {
    type Err = arrayvec::CapacityError<()>;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ArrayString::try_from(s)
            .map(Self)
            .map_err(|_| arrayvec::CapacityError::new(()))
    }
}

/// Stable session identifier.
///
/// Used as the key prefix for all persisted session state, so every process
/// instance addressing the same session sees the same records.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct SessionId(ArrayString<SESSION_ID_MAX_LEN>);

impl SessionId {
    /// Creates a new session identifier from a string slice.
    ///
    /// # Returns
    /// `Some(SessionId)` if the string fits within the maximum length, `None` otherwise.
    #[must_use]
    pub fn new(s: &str) -> Option<Self> {
        ArrayString::from(s).ok().map(Self)
    }

    /// Derives a session identifier from the two party identifiers.
    ///
    /// The backing capacity fits two maximum-length counterparty identifiers
    /// plus the separator, so the write cannot truncate: distinct party
    /// pairs always map to distinct session identifiers.
    ///
    /// # Arguments
    /// * `local` - The local party identifier
    /// * `counterparty` - The remote party identifier
    #[must_use]
    pub fn between(local: &CounterpartyId, counterparty: &CounterpartyId) -> Self {
        let mut buf = ArrayString::new();
        std::fmt::write(&mut buf, format_args!("{local}->{counterparty}"))
            .expect("two bounded party ids always fit the session id capacity");
        Self(buf)
    }

    /// Returns the identifier as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_num_operations() {
        let seq = SeqNum::new(5);
        assert_eq!(seq.value(), 5);
        assert_eq!(seq.next().value(), 6);
        assert!(seq.is_valid());
        assert!(!SeqNum::new(0).is_valid());
    }

    #[test]
    fn test_seq_num_default() {
        let seq = SeqNum::default();
        assert_eq!(seq.value(), 1);
    }

    #[test]
    fn test_msg_ref() {
        let msg_ref = MsgRef::new("REF-100").unwrap();
        assert_eq!(msg_ref.as_str(), "REF-100");
        assert!(!msg_ref.is_empty());
    }

    #[test]
    fn test_msg_ref_generate_unique() {
        let a = MsgRef::generate();
        let b = MsgRef::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn test_counterparty_id_too_long() {
        let long_str = "A".repeat(COUNTERPARTY_ID_MAX_LEN + 1);
        assert!(CounterpartyId::new(&long_str).is_none());
    }

    #[test]
    fn test_session_id_between() {
        let local = CounterpartyId::new("BANKGB2L").unwrap();
        let remote = CounterpartyId::new("BANKDEFF").unwrap();
        let session = SessionId::between(&local, &remote);
        assert_eq!(session.as_str(), "BANKGB2L->BANKDEFF");
    }

    #[test]
    fn test_session_id_between_max_length_parties_stays_distinct() {
        let local = CounterpartyId::new(&"L".repeat(COUNTERPARTY_ID_MAX_LEN)).unwrap();
        let a = CounterpartyId::new(&"A".repeat(COUNTERPARTY_ID_MAX_LEN)).unwrap();
        let b = CounterpartyId::new(&"B".repeat(COUNTERPARTY_ID_MAX_LEN)).unwrap();

        let session_a = SessionId::between(&local, &a);
        let session_b = SessionId::between(&local, &b);

        assert_eq!(session_a.as_str().len(), SESSION_ID_MAX_LEN);
        assert!(session_a.as_str().ends_with(a.as_str()));
        assert_ne!(session_a, session_b);
    }
}
