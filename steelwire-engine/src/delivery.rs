/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Delivery seam between the gateway and the hosting application.
//!
//! The controller hands validated, deduplicated business payloads to a
//! [`DeliveryHandler`] and notifies it of session lifecycle changes. The
//! handler runs on the inbound path: a slow handler delays subsequent
//! frames on the same session.

use async_trait::async_trait;
use bytes::Bytes;
use steelwire_core::types::{MsgRef, SessionId};
use tracing::info;

/// Callbacks the hosting application implements to receive traffic and
/// lifecycle events.
///
/// A payload reaches [`on_message`](Self::on_message) exactly once per
/// business reference: duplicates and out-of-order sequences are suppressed
/// before this seam.
#[async_trait]
pub trait DeliveryHandler: Send + Sync {
    /// Called with each accepted business payload.
    async fn on_message(&self, session_id: &SessionId, reference: &MsgRef, payload: Bytes);

    /// Called when the session becomes active after a successful handshake.
    async fn on_session_active(&self, session_id: &SessionId) {
        let _ = session_id;
    }

    /// Called when the session degrades after missed heartbeats.
    async fn on_session_degraded(&self, session_id: &SessionId) {
        let _ = session_id;
    }

    /// Called on orderly or fatal session termination.
    async fn on_session_terminated(&self, session_id: &SessionId) {
        let _ = session_id;
    }
}

/// Handler that logs deliveries and discards payloads.
///
/// Default when no handler is configured; useful for drains and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpDelivery;

#[async_trait]
impl DeliveryHandler for NoOpDelivery {
    async fn on_message(&self, session_id: &SessionId, reference: &MsgRef, payload: Bytes) {
        info!(
            session = %session_id,
            reference = %reference,
            bytes = payload.len(),
            "payload discarded by no-op delivery"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_delivery_accepts_payload() {
        let delivery = NoOpDelivery;
        let session = SessionId::new("A->B").unwrap();
        let reference = MsgRef::new("M1").unwrap();
        delivery
            .on_message(&session, &reference, Bytes::from_static(b"payload"))
            .await;
    }

    #[tokio::test]
    async fn test_lifecycle_defaults_are_noops() {
        let delivery = NoOpDelivery;
        let session = SessionId::new("A->B").unwrap();
        delivery.on_session_active(&session).await;
        delivery.on_session_degraded(&session).await;
        delivery.on_session_terminated(&session).await;
    }
}
