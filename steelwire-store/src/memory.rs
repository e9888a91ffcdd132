/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! In-memory store implementation.
//!
//! This module provides a simple in-memory store suitable for testing and
//! single-process deployments. TTL expiry is lazy: expired entries are
//! dropped whenever they are observed, so an expired key behaves exactly
//! like an absent one.

use crate::traits::{CasOutcome, KvStore, VersionedValue};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use steelwire_core::error::StoreError;

#[derive(Debug, Clone)]
struct Entry {
    version: u64,
    data: Bytes,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// In-memory key-value store.
///
/// Stores entries in a `BTreeMap` for efficient prefix scans. Versions come
/// from a store-wide counter, so a version observed before a delete or
/// expiry can never match a later recreation of the same key.
#[derive(Debug)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, Entry>>,
    next_version: AtomicU64,
}

impl MemoryStore {
    /// Creates a new empty memory store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            next_version: AtomicU64::new(1),
        }
    }

    /// Returns the number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .values()
            .filter(|e| !e.is_expired(now))
            .count()
    }

    /// Returns true if the store holds no live entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn allocate_version(&self) -> u64 {
        self.next_version.fetch_add(1, Ordering::SeqCst)
    }

    fn expires_at(ttl: Option<Duration>) -> Option<Instant> {
        ttl.map(|ttl| Instant::now() + ttl)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<VersionedValue>, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.write();
        match entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                entries.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(VersionedValue {
                version: entry.version,
                data: entry.data.clone(),
            })),
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, data: &[u8], ttl: Option<Duration>) -> Result<u64, StoreError> {
        let version = self.allocate_version();
        let mut entries = self.entries.write();
        entries.insert(
            key.to_string(),
            Entry {
                version,
                data: Bytes::copy_from_slice(data),
                expires_at: Self::expires_at(ttl),
            },
        );
        Ok(version)
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected_version: Option<u64>,
        data: &[u8],
        ttl: Option<Duration>,
    ) -> Result<CasOutcome, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.write();

        let current = match entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                entries.remove(key);
                None
            }
            Some(entry) => Some(entry.version),
            None => None,
        };

        if current != expected_version {
            return Ok(CasOutcome::Conflict);
        }

        let version = self.allocate_version();
        entries.insert(
            key.to_string(),
            Entry {
                version,
                data: Bytes::copy_from_slice(data),
                expires_at: Self::expires_at(ttl),
            },
        );
        Ok(CasOutcome::Committed(version))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.write().remove(key);
        Ok(())
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, VersionedValue)>, StoreError> {
        let now = Instant::now();
        let entries = self.entries.read();
        Ok(entries
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .filter(|(_, entry)| !entry.is_expired(now))
            .map(|(key, entry)| {
                (
                    key.clone(),
                    VersionedValue {
                        version: entry.version,
                        data: entry.data.clone(),
                    },
                )
            })
            .collect())
    }
}
