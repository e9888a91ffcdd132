/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Session state machine with persisted records.
//!
//! Session state lives in the persistent store, not in a process-local flag,
//! so every instance addressing the same session agrees on its state and on
//! `last_activity_at`. Transitions are validated against the lifecycle
//! `Uninitialized → HandshakePending → Active ⇄ Degraded → Terminated | Error`
//! and applied with compare-and-swap.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use steelwire_core::error::{GatewayError, Result, SessionError, StoreError};
use steelwire_core::types::{CounterpartyId, SessionId};
use steelwire_store::{CasOutcome, KvStore};
use tracing::info;

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    /// No handshake attempted yet.
    Uninitialized,
    /// Handshake in flight, awaiting the counterparty response.
    HandshakePending,
    /// Session established; sends and receives allowed.
    Active,
    /// Liveness lost (missed heartbeats); sends blocked until a fresh
    /// handshake and reconcile.
    Degraded,
    /// Orderly termination.
    Terminated,
    /// Fatal failure (invalid handshake signature, sequence inconsistency,
    /// exhausted recovery).
    Error,
}

impl SessionState {
    /// Returns true if `next` is a legal transition from this state.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Uninitialized, Self::HandshakePending)
                | (Self::HandshakePending, Self::Active)
                | (Self::HandshakePending, Self::Error)
                | (Self::HandshakePending, Self::Terminated)
                | (Self::Active, Self::Degraded)
                | (Self::Active, Self::Terminated)
                | (Self::Active, Self::Error)
                | (Self::Degraded, Self::Active)
                | (Self::Degraded, Self::HandshakePending)
                | (Self::Degraded, Self::Terminated)
                | (Self::Degraded, Self::Error)
        )
    }

    /// Returns true if new sends are allowed in this state.
    #[must_use]
    pub const fn allows_send(self) -> bool {
        matches!(self, Self::Active)
    }

    /// Returns true if inbound traffic is accepted in this state.
    ///
    /// Degraded sessions keep receiving so recovery retransmissions can
    /// still land.
    #[must_use]
    pub const fn allows_receive(self) -> bool {
        matches!(self, Self::Active | Self::Degraded)
    }

    /// Returns true if this state is terminal.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Terminated | Self::Error)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "UNINITIALIZED",
            Self::HandshakePending => "HANDSHAKE_PENDING",
            Self::Active => "ACTIVE",
            Self::Degraded => "DEGRADED",
            Self::Terminated => "TERMINATED",
            Self::Error => "ERROR",
        };
        write!(f, "{name}")
    }
}

/// Persisted session record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Session identifier.
    pub id: SessionId,
    /// Current lifecycle state.
    pub state: SessionState,
    /// When the session last entered `Active`, if ever.
    pub established_at: Option<DateTime<Utc>>,
    /// Last recorded send/receive/heartbeat activity.
    pub last_activity_at: DateTime<Utc>,
    /// The remote party.
    pub counterparty_id: CounterpartyId,
}

fn session_key(id: &SessionId) -> String {
    format!("session/{id}")
}

/// Store-backed session lifecycle operations.
#[derive(Clone)]
pub struct SessionRegistry {
    store: Arc<dyn KvStore>,
}

impl SessionRegistry {
    /// Creates a registry over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Loads the session record, creating an `Uninitialized` one if absent.
    ///
    /// # Errors
    /// Returns a store error on failure.
    pub async fn init(
        &self,
        id: &SessionId,
        counterparty_id: &CounterpartyId,
    ) -> Result<SessionRecord> {
        loop {
            if let Some((record, _)) = self.load(id).await? {
                return Ok(record);
            }
            let record = SessionRecord {
                id: id.clone(),
                state: SessionState::Uninitialized,
                established_at: None,
                last_activity_at: Utc::now(),
                counterparty_id: counterparty_id.clone(),
            };
            let data = serde_json::to_vec(&record)?;
            match self
                .store
                .compare_and_swap(&session_key(id), None, &data, None)
                .await?
            {
                CasOutcome::Committed(_) => return Ok(record),
                // Another instance created it first; reload.
                CasOutcome::Conflict => continue,
            }
        }
    }

    /// Loads the persisted record and its version.
    ///
    /// # Errors
    /// Returns a store error on failure or corruption.
    pub async fn load(&self, id: &SessionId) -> Result<Option<(SessionRecord, u64)>> {
        let key = session_key(id);
        match self.store.get(&key).await? {
            Some(value) => {
                let record: SessionRecord =
                    serde_json::from_slice(&value.data).map_err(|e| StoreError::Corrupted {
                        key,
                        reason: e.to_string(),
                    })?;
                Ok(Some((record, value.version)))
            }
            None => Ok(None),
        }
    }

    /// Returns the current state of the session.
    ///
    /// # Errors
    /// Returns `StoreError::NotFound` if the session was never initialized.
    pub async fn state(&self, id: &SessionId) -> Result<SessionState> {
        Ok(self.require(id).await?.0.state)
    }

    /// Applies a validated state transition.
    ///
    /// On entering `Active`, `established_at` is stamped. Every transition
    /// refreshes `last_activity_at`.
    ///
    /// # Errors
    /// Returns `SessionError::InvalidState` if the transition is not legal
    /// from the current state.
    pub async fn transition(&self, id: &SessionId, next: SessionState) -> Result<SessionRecord> {
        loop {
            let (mut record, version) = self.require(id).await?;
            if !record.state.can_transition_to(next) {
                return Err(SessionError::InvalidState {
                    expected: format!("state allowing transition to {next}"),
                    current: record.state.to_string(),
                }
                .into());
            }

            let previous = record.state;
            record.state = next;
            record.last_activity_at = Utc::now();
            if next == SessionState::Active {
                record.established_at = Some(Utc::now());
            }

            let data = serde_json::to_vec(&record)?;
            match self
                .store
                .compare_and_swap(&session_key(id), Some(version), &data, None)
                .await?
            {
                CasOutcome::Committed(_) => {
                    info!(session = %id, from = %previous, to = %next, "session transition");
                    return Ok(record);
                }
                CasOutcome::Conflict => continue,
            }
        }
    }

    /// Records activity now, refreshing the persisted `last_activity_at`.
    ///
    /// # Errors
    /// Returns a store error on failure.
    pub async fn touch(&self, id: &SessionId) -> Result<()> {
        loop {
            let (mut record, version) = self.require(id).await?;
            record.last_activity_at = Utc::now();
            let data = serde_json::to_vec(&record)?;
            match self
                .store
                .compare_and_swap(&session_key(id), Some(version), &data, None)
                .await?
            {
                CasOutcome::Committed(_) => return Ok(()),
                CasOutcome::Conflict => continue,
            }
        }
    }

    /// Re-derives session usability from the persisted record.
    ///
    /// A session is usable only if it is `Active` and its persisted
    /// `last_activity_at` is within `liveness_timeout` of now. Local belief
    /// plays no part, so every process instance answers identically.
    ///
    /// # Errors
    /// Returns a store error on failure.
    pub async fn is_usable(&self, id: &SessionId, liveness_timeout: Duration) -> Result<bool> {
        let (record, _) = self.require(id).await?;
        if record.state != SessionState::Active {
            return Ok(false);
        }
        Ok(self.idle_duration(&record) <= liveness_timeout)
    }

    /// Returns how long the session has been idle.
    #[must_use]
    pub fn idle_duration(&self, record: &SessionRecord) -> Duration {
        (Utc::now() - record.last_activity_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    async fn require(&self, id: &SessionId) -> Result<(SessionRecord, u64)> {
        self.load(id).await?.ok_or_else(|| {
            GatewayError::Store(StoreError::NotFound {
                key: session_key(id),
            })
        })
    }
}
