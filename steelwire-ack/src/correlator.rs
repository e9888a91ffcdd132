/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Acknowledgment correlator.
//!
//! Pending acknowledgments are persisted versioned records; the in-process
//! waiter map only carries the local awaitable side. Resolution may
//! originate from any task or process instance: whoever wins the
//! compare-on-status update owns the terminal transition, the loser does
//! nothing. Terminal records are deleted immediately; any stranded by a
//! crash mid-settle are cleaned up by the hydration sweep.

use crate::handle::{AckHandle, AckResult, Acknowledgment};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use steelwire_core::error::{AckError, Result, StoreError};
use steelwire_core::message::AckResolution;
use steelwire_core::types::MsgRef;
use steelwire_store::{CasOutcome, KvStore};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Status of a persisted pending acknowledgment.
///
/// Transitions are one-way and terminal: `Pending` moves exactly once to
/// one of the other states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AckStatus {
    /// Awaiting resolution.
    Pending,
    /// Positively acknowledged.
    Acked,
    /// Negatively acknowledged.
    Nacked,
    /// Timed out without an acknowledgment.
    TimedOut,
}

/// Persisted pending acknowledgment record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAck {
    /// The outbound message awaiting acknowledgment.
    pub message_id: MsgRef,
    /// When the registration happened.
    pub registered_at: DateTime<Utc>,
    /// Absolute deadline; restarts never reset or extend it.
    pub timeout_at: DateTime<Utc>,
    /// Current status.
    pub status: AckStatus,
    /// Resend attempts made for this message.
    pub resend_attempts: u32,
}

/// Result of a hydration sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HydrationReport {
    /// Records whose deadline had already elapsed and were timed out.
    pub expired: usize,
    /// Records re-armed with their remaining duration.
    pub rearmed: usize,
}

fn ack_key(message_id: &MsgRef) -> String {
    format!("ack/{message_id}")
}

struct Inner {
    store: Arc<dyn KvStore>,
    waiters: Mutex<HashMap<String, oneshot::Sender<AckResult>>>,
}

/// Store-backed acknowledgment correlator.
///
/// Cheap to clone; clones share the waiter map and store.
#[derive(Clone)]
pub struct AckCorrelator {
    inner: Arc<Inner>,
}

impl AckCorrelator {
    /// Creates a correlator over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                waiters: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Registers an outbound message for acknowledgment.
    ///
    /// Persists the pending record, arms the per-record timeout check, and
    /// returns an awaitable handle. Dropping the handle does not invalidate
    /// the persisted record.
    ///
    /// # Errors
    /// Returns [`AckError::AlreadyRegistered`] if a pending record for the
    /// message already exists.
    pub async fn register(&self, message_id: &MsgRef, timeout: Duration) -> Result<AckHandle> {
        let now = Utc::now();
        let record = PendingAck {
            message_id: message_id.clone(),
            registered_at: now,
            timeout_at: now
                + chrono::Duration::from_std(timeout).unwrap_or(chrono::Duration::zero()),
            status: AckStatus::Pending,
            resend_attempts: 0,
        };
        let data = serde_json::to_vec(&record)?;

        let outcome = self
            .inner
            .store
            .compare_and_swap(&ack_key(message_id), None, &data, None)
            .await?;
        if !outcome.is_committed() {
            return Err(AckError::AlreadyRegistered {
                message_id: message_id.to_string(),
            }
            .into());
        }

        let (tx, rx) = oneshot::channel();
        self.inner
            .waiters
            .lock()
            .insert(message_id.to_string(), tx);

        self.arm_timeout(message_id.clone(), timeout);
        debug!(message = %message_id, timeout_ms = timeout.as_millis() as u64, "ack registered");

        Ok(AckHandle::new(message_id.clone(), rx))
    }

    /// Applies an ACK or NACK resolution.
    ///
    /// Absent or already-terminal records are a safe no-op, so late or
    /// duplicate deliveries do nothing.
    ///
    /// # Errors
    /// Returns a store error on failure.
    pub async fn resolve(&self, message_id: &MsgRef, resolution: AckResolution) -> Result<()> {
        let (status, result) = match resolution {
            AckResolution::Ack => (
                AckStatus::Acked,
                Ok(Acknowledgment {
                    message_id: message_id.clone(),
                    resolved_at: Utc::now(),
                }),
            ),
            AckResolution::Nack { code, text } => {
                (AckStatus::Nacked, Err(AckError::Rejected { code, text }))
            }
        };
        self.settle(message_id, status, result).await
    }

    /// Times out a still-pending record.
    ///
    /// No-op if the record is absent or a resolution won the race.
    ///
    /// # Errors
    /// Returns a store error on failure.
    pub async fn fire_timeout(&self, message_id: &MsgRef) -> Result<()> {
        self.settle(
            message_id,
            AckStatus::TimedOut,
            Err(AckError::Timeout {
                message_id: message_id.to_string(),
            }),
        )
        .await
    }

    /// Rebuilds timeout scheduling from persisted pending records.
    ///
    /// Records whose deadline already elapsed resolve to `TimedOut`
    /// immediately; the rest are re-armed with their *remaining* duration,
    /// never a fresh window. Terminal records stranded by a crash between
    /// settle and delete are removed. Re-running the sweep may arm extra
    /// timers for the same record; the compare-on-status transition makes
    /// the extras harmless no-ops.
    ///
    /// # Errors
    /// Returns a store error on failure.
    pub async fn hydrate(&self) -> Result<HydrationReport> {
        let mut report = HydrationReport::default();
        let now = Utc::now();

        for (key, value) in self.inner.store.scan_prefix("ack/").await? {
            let record: PendingAck =
                serde_json::from_slice(&value.data).map_err(|e| StoreError::Corrupted {
                    key: key.clone(),
                    reason: e.to_string(),
                })?;
            if record.status != AckStatus::Pending {
                // A crash between the terminal transition and its delete can
                // strand the record; the sweep finishes the cleanup.
                debug!(message = %record.message_id, status = ?record.status, "removing stranded terminal record");
                self.inner.store.delete(&key).await?;
                continue;
            }

            if record.timeout_at <= now {
                self.fire_timeout(&record.message_id).await?;
                report.expired += 1;
            } else {
                let remaining = (record.timeout_at - now)
                    .to_std()
                    .unwrap_or(Duration::ZERO);
                self.arm_timeout(record.message_id.clone(), remaining);
                report.rearmed += 1;
            }
        }

        if report.expired > 0 || report.rearmed > 0 {
            info!(
                expired = report.expired,
                rearmed = report.rearmed,
                "hydrated pending acknowledgments"
            );
        }
        Ok(report)
    }

    /// Spawns the periodic hydration sweep.
    #[must_use]
    pub fn spawn_hydration(&self, interval: Duration) -> JoinHandle<()> {
        let correlator = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Err(e) = correlator.hydrate().await {
                    warn!(error = %e, "hydration sweep failed");
                }
            }
        })
    }

    /// Returns the persisted record for a message, if any.
    ///
    /// # Errors
    /// Returns a store error on failure.
    pub async fn pending(&self, message_id: &MsgRef) -> Result<Option<PendingAck>> {
        let key = ack_key(message_id);
        match self.inner.store.get(&key).await? {
            Some(value) => Ok(Some(serde_json::from_slice(&value.data).map_err(|e| {
                StoreError::Corrupted {
                    key,
                    reason: e.to_string(),
                }
            })?)),
            None => Ok(None),
        }
    }

    fn arm_timeout(&self, message_id: MsgRef, after: Duration) {
        let correlator = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            if let Err(e) = correlator.fire_timeout(&message_id).await {
                warn!(message = %message_id, error = %e, "timeout check failed");
            }
        });
    }

    /// Performs the terminal transition. The compare-on-status update
    /// guarantees exactly one caller wins a race on the same record.
    async fn settle(&self, message_id: &MsgRef, status: AckStatus, result: AckResult) -> Result<()> {
        let key = ack_key(message_id);
        loop {
            let Some(value) = self.inner.store.get(&key).await? else {
                return Ok(());
            };
            let mut record: PendingAck =
                serde_json::from_slice(&value.data).map_err(|e| StoreError::Corrupted {
                    key: key.clone(),
                    reason: e.to_string(),
                })?;
            if record.status != AckStatus::Pending {
                return Ok(());
            }

            record.status = status;
            let data = serde_json::to_vec(&record)?;
            match self
                .inner
                .store
                .compare_and_swap(&key, Some(value.version), &data, None)
                .await?
            {
                CasOutcome::Committed(_) => {
                    if let Some(tx) = self.inner.waiters.lock().remove(message_id.as_str()) {
                        // Receiver may have been dropped; that only cancels the wait.
                        let _ = tx.send(result);
                    }
                    self.inner.store.delete(&key).await?;
                    debug!(message = %message_id, status = ?status, "ack settled");
                    return Ok(());
                }
                CasOutcome::Conflict => continue,
            }
        }
    }
}
