/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Gap detection and bounded recovery.
//!
//! Triggered by a `Gap` result from the sequence ledger. Recovery attempts
//! are counted per exact missing range in the persistent store, so every
//! process instance shares one bounded counter; once attempts reach the
//! configured maximum the gap becomes a fatal, non-retryable
//! sequence-integrity error. When retransmitted sequences fill the range,
//! the gap record is cleared and its counter starts over.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use steelwire_core::error::{Result, SessionError, StoreError};
use steelwire_core::message::GatewayMessage;
use steelwire_core::types::SessionId;
use steelwire_store::{CasOutcome, KvStore};
use steelwire_transport::Transport;
use tracing::{info, warn};

/// Persisted record of a detected gap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapRecord {
    /// Session the gap belongs to.
    pub session_id: SessionId,
    /// Sequence number that was expected.
    pub expected_sequence: u64,
    /// Sequence number that actually arrived.
    pub received_sequence: u64,
    /// Missing range `[begin, end]`, both inclusive.
    pub gap_range: (u64, u64),
    /// Recovery attempts made for this exact range.
    pub resend_attempts: u32,
    /// When the gap was resolved, if it has been.
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Result of driving recovery for a gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStatus {
    /// A recovery request went out; the triggering message must not be
    /// processed until the range is filled.
    Recovering {
        /// First missing sequence (inclusive).
        begin: u64,
        /// Last missing sequence (inclusive).
        end: u64,
        /// Attempt number just consumed (1-based).
        attempt: u32,
    },
}

fn gap_key(session_id: &SessionId, begin: u64, end: u64) -> String {
    format!("gap/{session_id}/{begin}-{end}")
}

fn gap_prefix(session_id: &SessionId) -> String {
    format!("gap/{session_id}/")
}

/// Bounded recovery coordinator over the persistent store.
#[derive(Clone)]
pub struct GapRecovery {
    store: Arc<dyn KvStore>,
    max_attempts: u32,
    mac_key: Vec<u8>,
}

impl GapRecovery {
    /// Creates a coordinator.
    ///
    /// # Arguments
    /// * `store` - The shared persistent store
    /// * `max_attempts` - Maximum recovery attempts per missing range
    /// * `mac_key` - Bilateral secret used to seal outbound recovery requests
    #[must_use]
    pub fn new(store: Arc<dyn KvStore>, max_attempts: u32, mac_key: Vec<u8>) -> Self {
        Self {
            store,
            max_attempts,
            mac_key,
        }
    }

    /// Drives recovery for a detected gap.
    ///
    /// Computes the missing range `[expected, received - 1]`, consumes one
    /// persisted attempt for that exact range, and sends a recovery request
    /// with explicit bounds. The caller must not process the triggering
    /// message while recovery is in flight.
    ///
    /// # Errors
    /// Returns [`SessionError::RecoveryExhausted`] once attempts reach the
    /// maximum; this is fatal and non-retryable.
    pub async fn on_gap(
        &self,
        transport: &dyn Transport,
        session_id: &SessionId,
        expected: u64,
        received: u64,
    ) -> Result<RecoveryStatus> {
        debug_assert!(received > expected, "gap requires received > expected");
        let begin = expected;
        let end = received - 1;
        let key = gap_key(session_id, begin, end);

        let attempt = loop {
            match self.store.get(&key).await? {
                None => {
                    let record = GapRecord {
                        session_id: session_id.clone(),
                        expected_sequence: expected,
                        received_sequence: received,
                        gap_range: (begin, end),
                        resend_attempts: 1,
                        resolved_at: None,
                    };
                    let data = serde_json::to_vec(&record)?;
                    match self.store.compare_and_swap(&key, None, &data, None).await? {
                        CasOutcome::Committed(_) => break 1,
                        CasOutcome::Conflict => continue,
                    }
                }
                Some(value) => {
                    let mut record: GapRecord = serde_json::from_slice(&value.data)
                        .map_err(|e| StoreError::Corrupted {
                            key: key.clone(),
                            reason: e.to_string(),
                        })?;

                    if record.resend_attempts >= self.max_attempts {
                        warn!(
                            session = %session_id,
                            begin,
                            end,
                            attempts = record.resend_attempts,
                            "gap recovery exhausted"
                        );
                        return Err(SessionError::RecoveryExhausted {
                            begin,
                            end,
                            attempts: record.resend_attempts,
                        }
                        .into());
                    }

                    record.resend_attempts += 1;
                    let next = record.resend_attempts;
                    let data = serde_json::to_vec(&record)?;
                    match self
                        .store
                        .compare_and_swap(&key, Some(value.version), &data, None)
                        .await?
                    {
                        CasOutcome::Committed(_) => break next,
                        CasOutcome::Conflict => continue,
                    }
                }
            }
        };

        warn!(
            session = %session_id,
            begin,
            end,
            attempt,
            "sequence gap detected, requesting retransmission"
        );

        let request = GatewayMessage::recovery_request(begin, end);
        let frame = steelwire_integrity::seal(&request.encode()?, &self.mac_key);
        transport.send(Bytes::from(frame)).await?;

        Ok(RecoveryStatus::Recovering {
            begin,
            end,
            attempt,
        })
    }

    /// Clears gap records whose range the ledger has fully caught up with.
    ///
    /// Call after each accepted input. Deleting the record also resets its
    /// attempt counter: a future gap over the same range starts fresh.
    ///
    /// # Returns
    /// The number of records cleared.
    ///
    /// # Errors
    /// Returns a store error on failure.
    pub async fn clear_filled(&self, session_id: &SessionId, last_accepted: u64) -> Result<usize> {
        let mut cleared = 0;
        for (key, value) in self.store.scan_prefix(&gap_prefix(session_id)).await? {
            let record: GapRecord =
                serde_json::from_slice(&value.data).map_err(|e| StoreError::Corrupted {
                    key: key.clone(),
                    reason: e.to_string(),
                })?;
            let (_, end) = record.gap_range;
            if end <= last_accepted {
                self.store.delete(&key).await?;
                cleared += 1;
                info!(session = %session_id, begin = record.gap_range.0, end, "gap resolved");
            }
        }
        Ok(cleared)
    }

    /// Returns the unresolved gap records for a session.
    ///
    /// # Errors
    /// Returns a store error on failure.
    pub async fn pending(&self, session_id: &SessionId) -> Result<Vec<GapRecord>> {
        let mut records = Vec::new();
        for (key, value) in self.store.scan_prefix(&gap_prefix(session_id)).await? {
            records.push(
                serde_json::from_slice(&value.data).map_err(|e| StoreError::Corrupted {
                    key,
                    reason: e.to_string(),
                })?,
            );
        }
        Ok(records)
    }
}
