/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Persistent duplicate guard.
//!
//! Idempotency check keyed by business message reference, independent of
//! sequence state: retransmission after an ambiguous failure can deliver a
//! duplicate without any sequence anomaly. The check must run before any
//! business processing of an inbound message.
//!
//! A duplicate is a value, never an error; callers branch on it explicitly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use steelwire_core::error::{Result, StoreError};
use steelwire_core::types::MsgRef;
use steelwire_store::{CasOutcome, KvStore};
use tracing::debug;

/// Persisted record of a seen message reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateRecord {
    /// The business message reference.
    pub message_reference: MsgRef,
    /// When the reference was first seen.
    pub first_seen_at: DateTime<Utc>,
    /// When the record expires.
    pub ttl_expiry: DateTime<Utc>,
    /// How many times the reference has been seen, first sighting included.
    pub occurrence_count: u64,
}

/// Result of a duplicate check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateCheck {
    /// First sighting within the TTL window; processing may proceed.
    New,
    /// Already seen; no business side effects may run.
    Duplicate {
        /// Occurrence count including this sighting.
        occurrence_count: u64,
    },
}

impl DuplicateCheck {
    /// Returns true for a first sighting.
    #[must_use]
    pub const fn is_new(&self) -> bool {
        matches!(self, Self::New)
    }
}

fn record_key(reference: &MsgRef) -> String {
    format!("dup/{reference}")
}

/// Store-backed idempotency check.
#[derive(Clone)]
pub struct DuplicateGuard {
    store: Arc<dyn KvStore>,
    ttl: Duration,
}

impl DuplicateGuard {
    /// Creates a guard with the given record TTL.
    #[must_use]
    pub fn new(store: Arc<dyn KvStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Atomically checks and registers a message reference.
    ///
    /// Absent: creates the record with the configured TTL and returns
    /// [`DuplicateCheck::New`]. Present: increments the occurrence count
    /// (keeping the original expiry) and returns
    /// [`DuplicateCheck::Duplicate`].
    ///
    /// # Errors
    /// Returns a store error on failure.
    pub async fn check_and_register(&self, reference: &MsgRef) -> Result<DuplicateCheck> {
        let key = record_key(reference);
        loop {
            match self.store.get(&key).await? {
                None => {
                    let now = Utc::now();
                    let record = DuplicateRecord {
                        message_reference: reference.clone(),
                        first_seen_at: now,
                        ttl_expiry: now
                            + chrono::Duration::from_std(self.ttl)
                                .unwrap_or(chrono::Duration::zero()),
                        occurrence_count: 1,
                    };
                    let data = serde_json::to_vec(&record)?;
                    match self
                        .store
                        .compare_and_swap(&key, None, &data, Some(self.ttl))
                        .await?
                    {
                        CasOutcome::Committed(_) => return Ok(DuplicateCheck::New),
                        // Lost the race to a concurrent first sighting.
                        CasOutcome::Conflict => continue,
                    }
                }
                Some(value) => {
                    let mut record: DuplicateRecord = serde_json::from_slice(&value.data)
                        .map_err(|e| StoreError::Corrupted {
                            key: key.clone(),
                            reason: e.to_string(),
                        })?;
                    record.occurrence_count += 1;

                    let remaining = (record.ttl_expiry - Utc::now())
                        .to_std()
                        .unwrap_or(Duration::ZERO);
                    let data = serde_json::to_vec(&record)?;
                    match self
                        .store
                        .compare_and_swap(&key, Some(value.version), &data, Some(remaining))
                        .await?
                    {
                        CasOutcome::Committed(_) => {
                            debug!(
                                reference = %reference,
                                occurrences = record.occurrence_count,
                                "duplicate reference suppressed"
                            );
                            return Ok(DuplicateCheck::Duplicate {
                                occurrence_count: record.occurrence_count,
                            });
                        }
                        CasOutcome::Conflict => continue,
                    }
                }
            }
        }
    }
}
