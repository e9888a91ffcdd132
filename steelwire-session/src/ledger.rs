/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Persistent sequence ledger.
//!
//! Durable per-session input/output counters with compare-and-swap
//! semantics. Output numbers are persisted before they are handed out, so a
//! crash between increment and use can never reuse a sequence number.
//! Input validation accepts only `last_accepted + 1`; anything lower is a
//! duplicate, anything higher is a gap, and neither mutates the ledger.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use steelwire_core::error::{Result, SessionError, StoreError};
use steelwire_core::types::{SeqNum, SessionId};
use steelwire_store::KvStore;
use tracing::{debug, info, warn};

/// Persisted per-session counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceCounters {
    /// Session identifier.
    pub session_id: SessionId,
    /// Last accepted input sequence (0 when nothing accepted yet).
    pub input_sequence: u64,
    /// Last allocated output sequence (0 when nothing sent yet).
    pub output_sequence: u64,
}

impl SequenceCounters {
    fn fresh(session_id: &SessionId) -> Self {
        Self {
            session_id: session_id.clone(),
            input_sequence: 0,
            output_sequence: 0,
        }
    }
}

/// Result of input sequence validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceCheck {
    /// Sequence number is the expected next one; the ledger advanced.
    Accepted,
    /// Sequence number at or below the last accepted one. Not an error:
    /// callers must branch explicitly.
    Duplicate {
        /// Expected sequence number.
        expected: u64,
        /// Received sequence number.
        received: u64,
    },
    /// Sequence number ahead of the expected one; recovery must run before
    /// the triggering message is processed.
    Gap {
        /// Expected sequence number.
        expected: u64,
        /// Received sequence number.
        received: u64,
    },
}

impl SequenceCheck {
    /// Returns true if the sequence was accepted.
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    /// Returns true if a gap was detected.
    #[must_use]
    pub const fn is_gap(&self) -> bool {
        matches!(self, Self::Gap { .. })
    }

    /// Returns true if the number was a duplicate.
    #[must_use]
    pub const fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }
}

fn counters_key(session_id: &SessionId) -> String {
    format!("seq/{session_id}")
}

/// Durable sequence counter operations over the persistent store.
#[derive(Clone)]
pub struct SequenceLedger {
    store: Arc<dyn KvStore>,
}

impl SequenceLedger {
    /// Creates a ledger over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Allocates the next output sequence number.
    ///
    /// The incremented counter is persisted before the value is returned;
    /// on a compare-and-swap conflict the whole allocation retries, so two
    /// instances can never hand out the same number.
    ///
    /// # Errors
    /// Returns a store error on failure.
    pub async fn next_output_sequence(&self, session_id: &SessionId) -> Result<SeqNum> {
        loop {
            let (mut counters, version) = self.load(session_id).await?;
            counters.output_sequence += 1;
            let allocated = counters.output_sequence;

            if self.persist(session_id, &counters, version).await? {
                debug!(session = %session_id, seq = allocated, "allocated output sequence");
                return Ok(SeqNum::new(allocated));
            }
        }
    }

    /// Validates a received input sequence number.
    ///
    /// Accepting persists `received` as the new last accepted value before
    /// returning. Duplicate and gap results never mutate the ledger.
    ///
    /// # Errors
    /// Returns a store error on failure.
    pub async fn validate_input_sequence(
        &self,
        session_id: &SessionId,
        received: u64,
    ) -> Result<SequenceCheck> {
        loop {
            let (mut counters, version) = self.load(session_id).await?;
            let expected = counters.input_sequence + 1;

            if received == expected {
                counters.input_sequence = received;
                if self.persist(session_id, &counters, version).await? {
                    return Ok(SequenceCheck::Accepted);
                }
                // Another instance advanced the counter; re-validate.
                continue;
            }

            if received <= counters.input_sequence {
                return Ok(SequenceCheck::Duplicate { expected, received });
            }

            return Ok(SequenceCheck::Gap { expected, received });
        }
    }

    /// Reconciles the local output counter with the value the counterparty
    /// reported at session establishment.
    ///
    /// If the counterparty saw more than we recorded (acknowledgments lost
    /// during an outage), the higher value is adopted. If we recorded more
    /// than the counterparty saw, messages went missing on their side; that
    /// is surfaced as a fatal inconsistency, never auto-resolved.
    ///
    /// # Errors
    /// Returns [`SessionError::SequenceInconsistency`] when the local
    /// counter is ahead, or a store error on failure.
    pub async fn reconcile(&self, session_id: &SessionId, counterparty_reported: u64) -> Result<()> {
        loop {
            let (mut counters, version) = self.load(session_id).await?;

            if counterparty_reported > counters.output_sequence {
                info!(
                    session = %session_id,
                    local = counters.output_sequence,
                    reported = counterparty_reported,
                    "adopting counterparty-reported output sequence"
                );
                counters.output_sequence = counterparty_reported;
                if self.persist(session_id, &counters, version).await? {
                    return Ok(());
                }
                continue;
            }

            if counters.output_sequence > counterparty_reported {
                warn!(
                    session = %session_id,
                    local = counters.output_sequence,
                    reported = counterparty_reported,
                    "local output sequence ahead of counterparty report"
                );
                return Err(SessionError::SequenceInconsistency {
                    local: counters.output_sequence,
                    reported: counterparty_reported,
                }
                .into());
            }

            return Ok(());
        }
    }

    /// Returns the current counters without mutating them.
    ///
    /// # Errors
    /// Returns a store error on failure.
    pub async fn counters(&self, session_id: &SessionId) -> Result<SequenceCounters> {
        Ok(self.load(session_id).await?.0)
    }

    async fn load(&self, session_id: &SessionId) -> Result<(SequenceCounters, Option<u64>)> {
        let key = counters_key(session_id);
        match self.store.get(&key).await? {
            Some(value) => {
                let counters: SequenceCounters =
                    serde_json::from_slice(&value.data).map_err(|e| StoreError::Corrupted {
                        key,
                        reason: e.to_string(),
                    })?;
                Ok((counters, Some(value.version)))
            }
            None => Ok((SequenceCounters::fresh(session_id), None)),
        }
    }

    async fn persist(
        &self,
        session_id: &SessionId,
        counters: &SequenceCounters,
        version: Option<u64>,
    ) -> Result<bool> {
        let data = serde_json::to_vec(counters)?;
        let outcome = self
            .store
            .compare_and_swap(&counters_key(session_id), version, &data, None)
            .await?;
        Ok(outcome.is_committed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use steelwire_store::MemoryStore;

    fn session() -> SessionId {
        SessionId::new("BANKGB2L->BANKDEFF").unwrap()
    }

    fn ledger() -> SequenceLedger {
        SequenceLedger::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_output_sequence_allocation() {
        let ledger = ledger();
        let session = session();

        for expected in 1..=5u64 {
            let seq = ledger.next_output_sequence(&session).await.unwrap();
            assert_eq!(seq.value(), expected);
        }
        let counters = ledger.counters(&session).await.unwrap();
        assert_eq!(counters.output_sequence, 5);
        assert_eq!(counters.input_sequence, 0);
    }

    #[tokio::test]
    async fn test_allocation_is_persisted_before_return() {
        let store = Arc::new(MemoryStore::new());
        let ledger = SequenceLedger::new(store.clone());
        let session = session();

        ledger.next_output_sequence(&session).await.unwrap();

        // A second ledger instance over the same store continues the series.
        let other = SequenceLedger::new(store);
        let seq = other.next_output_sequence(&session).await.unwrap();
        assert_eq!(seq.value(), 2);
    }

    #[tokio::test]
    async fn test_input_validation_contiguous() {
        let ledger = ledger();
        let session = session();

        for received in 1..=3u64 {
            let check = ledger
                .validate_input_sequence(&session, received)
                .await
                .unwrap();
            assert!(check.is_accepted());
        }
    }

    #[tokio::test]
    async fn test_input_validation_duplicate_and_gap() {
        let ledger = ledger();
        let session = session();

        assert!(
            ledger
                .validate_input_sequence(&session, 1)
                .await
                .unwrap()
                .is_accepted()
        );

        let check = ledger.validate_input_sequence(&session, 1).await.unwrap();
        assert_eq!(
            check,
            SequenceCheck::Duplicate {
                expected: 2,
                received: 1
            }
        );

        let check = ledger.validate_input_sequence(&session, 5).await.unwrap();
        assert_eq!(
            check,
            SequenceCheck::Gap {
                expected: 2,
                received: 5
            }
        );

        // Neither duplicate nor gap moved the counter.
        let counters = ledger.counters(&session).await.unwrap();
        assert_eq!(counters.input_sequence, 1);
    }

    #[tokio::test]
    async fn test_reconcile_adopts_higher_report() {
        let ledger = ledger();
        let session = session();

        ledger.next_output_sequence(&session).await.unwrap();
        ledger.reconcile(&session, 7).await.unwrap();

        let counters = ledger.counters(&session).await.unwrap();
        assert_eq!(counters.output_sequence, 7);
        assert_eq!(
            ledger.next_output_sequence(&session).await.unwrap().value(),
            8
        );
    }

    #[tokio::test]
    async fn test_reconcile_equal_is_noop() {
        let ledger = ledger();
        let session = session();

        for _ in 0..3 {
            ledger.next_output_sequence(&session).await.unwrap();
        }
        ledger.reconcile(&session, 3).await.unwrap();
        let counters = ledger.counters(&session).await.unwrap();
        assert_eq!(counters.output_sequence, 3);
    }

    #[tokio::test]
    async fn test_reconcile_local_ahead_is_fatal() {
        let ledger = ledger();
        let session = session();

        for _ in 0..5 {
            ledger.next_output_sequence(&session).await.unwrap();
        }
        let err = ledger.reconcile(&session, 2).await.unwrap_err();
        assert!(matches!(
            err,
            steelwire_core::error::GatewayError::Session(SessionError::SequenceInconsistency {
                local: 5,
                reported: 2
            })
        ));
    }

    #[tokio::test]
    async fn test_concurrent_allocation_never_duplicates() {
        let store = Arc::new(MemoryStore::new());
        let session = session();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let ledger = SequenceLedger::new(store.clone());
            let session = session.clone();
            handles.push(tokio::spawn(async move {
                let mut seen = Vec::new();
                for _ in 0..10 {
                    seen.push(
                        ledger
                            .next_output_sequence(&session)
                            .await
                            .unwrap()
                            .value(),
                    );
                }
                seen
            }));
        }

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }
        all.sort_unstable();
        let expected: Vec<u64> = (1..=80).collect();
        assert_eq!(all, expected);
    }
}
