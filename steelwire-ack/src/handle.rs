/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Awaitable acknowledgment handle.
//!
//! The handle is the local face of a persisted pending record. Dropping it
//! cancels only the wait: the record stays in the store and a later
//! resolution or timeout still lands correctly.

use chrono::{DateTime, Utc};
use steelwire_core::error::AckError;
use steelwire_core::types::MsgRef;
use tokio::sync::oneshot;

/// Success value of a resolved acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acknowledgment {
    /// The acknowledged message.
    pub message_id: MsgRef,
    /// When the acknowledgment was recorded.
    pub resolved_at: DateTime<Utc>,
}

/// Outcome delivered through an [`AckHandle`].
pub type AckResult = Result<Acknowledgment, AckError>;

/// Awaitable handle for one registered acknowledgment.
#[derive(Debug)]
pub struct AckHandle {
    message_id: MsgRef,
    rx: oneshot::Receiver<AckResult>,
}

impl AckHandle {
    pub(crate) fn new(message_id: MsgRef, rx: oneshot::Receiver<AckResult>) -> Self {
        Self { message_id, rx }
    }

    /// Returns the message this handle is waiting on.
    #[must_use]
    pub fn message_id(&self) -> &MsgRef {
        &self.message_id
    }

    /// Waits for the acknowledgment outcome.
    ///
    /// # Errors
    /// - [`AckError::Rejected`] on a counterparty NACK, carrying the reason code
    /// - [`AckError::Timeout`] when no acknowledgment arrived in time
    /// - [`AckError::Detached`] if the correlator went away before resolving
    pub async fn wait(self) -> AckResult {
        match self.rx.await {
            Ok(result) => result,
            Err(_) => Err(AckError::Detached {
                message_id: self.message_id.to_string(),
            }),
        }
    }
}
