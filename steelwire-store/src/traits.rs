/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Persistent store trait definition.
//!
//! This module defines the abstract interface for durable gateway state.
//! Correctness with multiple concurrent process instances relies on the
//! versioned compare-and-swap primitive: every mutation of shared state goes
//! through [`KvStore::compare_and_swap`], never through read-modify-write.

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use steelwire_core::error::StoreError;

/// A stored value together with its write version.
///
/// Versions are opaque and strictly increase with every successful write to
/// the store; they are never reused, even after a key expires or is deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedValue {
    /// Version assigned by the write that produced this value.
    pub version: u64,
    /// The stored bytes.
    pub data: Bytes,
}

/// Outcome of a compare-and-swap attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    /// The swap committed; carries the new version.
    Committed(u64),
    /// The expected version no longer matched; nothing was written.
    Conflict,
}

impl CasOutcome {
    /// Returns true if the swap committed.
    #[must_use]
    pub const fn is_committed(&self) -> bool {
        matches!(self, Self::Committed(_))
    }
}

/// Abstract interface for durable, instance-shared gateway state.
///
/// Implementations must make writes visible to every process instance and
/// must enforce TTL expiry (an expired key behaves exactly like an absent
/// one, including for compare-and-swap with `expected_version: None`).
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Reads the value at `key`.
    ///
    /// # Returns
    /// `None` if the key is absent or expired.
    ///
    /// # Errors
    /// Returns `StoreError` on store failure.
    async fn get(&self, key: &str) -> Result<Option<VersionedValue>, StoreError>;

    /// Writes `data` at `key` unconditionally.
    ///
    /// # Arguments
    /// * `key` - The target key
    /// * `data` - The value bytes
    /// * `ttl` - Optional expiry relative to now
    ///
    /// # Returns
    /// The version assigned to the write.
    ///
    /// # Errors
    /// Returns `StoreError` on store failure.
    async fn put(&self, key: &str, data: &[u8], ttl: Option<Duration>) -> Result<u64, StoreError>;

    /// Atomically writes `data` at `key` if the current version matches.
    ///
    /// # Arguments
    /// * `key` - The target key
    /// * `expected_version` - `Some(v)` to replace version `v`; `None` to
    ///   create the key only if it is absent
    /// * `data` - The value bytes
    /// * `ttl` - Optional expiry relative to now
    ///
    /// # Errors
    /// Returns `StoreError` on store failure; a lost race is reported as
    /// [`CasOutcome::Conflict`], not an error.
    async fn compare_and_swap(
        &self,
        key: &str,
        expected_version: Option<u64>,
        data: &[u8],
        ttl: Option<Duration>,
    ) -> Result<CasOutcome, StoreError>;

    /// Deletes the value at `key`. Deleting an absent key is a no-op.
    ///
    /// # Errors
    /// Returns `StoreError` on store failure.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Returns all live entries whose key starts with `prefix`.
    ///
    /// # Errors
    /// Returns `StoreError` on store failure.
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, VersionedValue)>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockStore;

    #[async_trait]
    impl KvStore for MockStore {
        async fn get(&self, _key: &str) -> Result<Option<VersionedValue>, StoreError> {
            Ok(None)
        }

        async fn put(
            &self,
            _key: &str,
            _data: &[u8],
            _ttl: Option<Duration>,
        ) -> Result<u64, StoreError> {
            Ok(1)
        }

        async fn compare_and_swap(
            &self,
            _key: &str,
            _expected_version: Option<u64>,
            _data: &[u8],
            _ttl: Option<Duration>,
        ) -> Result<CasOutcome, StoreError> {
            Ok(CasOutcome::Committed(1))
        }

        async fn delete(&self, _key: &str) -> Result<(), StoreError> {
            Ok(())
        }

        async fn scan_prefix(
            &self,
            _prefix: &str,
        ) -> Result<Vec<(String, VersionedValue)>, StoreError> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn test_mock_store() {
        let store = MockStore;
        assert!(store.get("k").await.unwrap().is_none());
        assert_eq!(store.put("k", b"v", None).await.unwrap(), 1);
        assert!(
            store
                .compare_and_swap("k", None, b"v", None)
                .await
                .unwrap()
                .is_committed()
        );
    }

    #[test]
    fn test_cas_outcome() {
        assert!(CasOutcome::Committed(3).is_committed());
        assert!(!CasOutcome::Conflict.is_committed());
    }
}
