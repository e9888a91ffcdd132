/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Session controller.
//!
//! Orchestrates one bilateral session end to end:
//! - Establishment via signed handshake and sequence reconciliation
//! - Outbound path: durable sequence allocation, sealed frame, registered
//!   acknowledgment
//! - Inbound pipeline: integrity validation, then sequence validation, then
//!   duplicate suppression, then delivery
//! - Heartbeat supervision and liveness gating from the persisted record
//!
//! Session state, counters, gaps, duplicates and pending acknowledgments
//! all live in the shared store; any number of controller instances over
//! the same store cooperate through compare-and-swap.

use crate::delivery::DeliveryHandler;
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use steelwire_ack::{AckCorrelator, AckHandle, HydrationReport};
use steelwire_core::error::{Result, SessionError};
use steelwire_core::message::{AckResolution, GatewayMessage};
use steelwire_core::types::{MsgRef, SessionId};
use steelwire_integrity::TrustedKeyProvider;
use steelwire_session::config::SessionConfig;
use steelwire_session::duplicate::{DuplicateCheck, DuplicateGuard};
use steelwire_session::heartbeat::HeartbeatMonitor;
use steelwire_session::ledger::{SequenceCheck, SequenceLedger};
use steelwire_session::recovery::{GapRecovery, RecoveryStatus};
use steelwire_session::state::{SessionRegistry, SessionState};
use steelwire_store::KvStore;
use steelwire_transport::Transport;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// What the inbound pipeline did with a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundDisposition {
    /// Business payload accepted and handed to the delivery seam.
    Delivered,
    /// Business reference already seen; no side effects ran.
    DuplicateSuppressed {
        /// Occurrence count including this sighting.
        occurrence_count: u64,
    },
    /// Sequence number at or below the last accepted one; dropped.
    StaleSequence {
        /// Expected sequence number.
        expected: u64,
        /// Received sequence number.
        received: u64,
    },
    /// Gap detected; a recovery request went out and the triggering message
    /// was not processed.
    Recovering {
        /// First missing sequence (inclusive).
        begin: u64,
        /// Last missing sequence (inclusive).
        end: u64,
        /// Recovery attempt number (1-based).
        attempt: u32,
    },
    /// Protocol-level message handled internally.
    Control,
}

/// Controller for one bilateral gateway session.
pub struct SessionController {
    config: SessionConfig,
    session_id: SessionId,
    registry: SessionRegistry,
    ledger: SequenceLedger,
    duplicates: DuplicateGuard,
    recovery: GapRecovery,
    correlator: AckCorrelator,
    transport: Arc<dyn Transport>,
    keys: Arc<dyn TrustedKeyProvider>,
    delivery: Arc<dyn DeliveryHandler>,
    heartbeat: Mutex<HeartbeatMonitor>,
    mac_key: Vec<u8>,
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("config", &self.config)
            .field("session_id", &self.session_id)
            .finish_non_exhaustive()
    }
}

impl SessionController {
    /// Assembles a controller from its collaborators.
    ///
    /// # Arguments
    /// * `config` - Session configuration
    /// * `store` - Shared persistent store
    /// * `transport` - Raw frame transport
    /// * `keys` - Trusted key lookup per counterparty
    /// * `delivery` - Application delivery seam
    /// * `mac_key` - Bilateral secret for sealing and opening frames
    #[must_use]
    pub fn new(
        config: SessionConfig,
        store: Arc<dyn KvStore>,
        transport: Arc<dyn Transport>,
        keys: Arc<dyn TrustedKeyProvider>,
        delivery: Arc<dyn DeliveryHandler>,
        mac_key: Vec<u8>,
    ) -> Self {
        let session_id = config.session_id();
        let heartbeat = HeartbeatMonitor::new(
            config.heartbeat_interval,
            config.missed_heartbeat_limit,
        );
        Self {
            session_id,
            registry: SessionRegistry::new(store.clone()),
            ledger: SequenceLedger::new(store.clone()),
            duplicates: DuplicateGuard::new(store.clone(), config.duplicate_ttl),
            recovery: GapRecovery::new(store.clone(), config.max_recovery_attempts, mac_key.clone()),
            correlator: AckCorrelator::new(store),
            transport,
            keys,
            delivery,
            heartbeat: Mutex::new(heartbeat),
            mac_key,
            config,
        }
    }

    /// Returns the stable session identifier.
    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Returns the current persisted session state.
    ///
    /// # Errors
    /// Returns a store error on failure.
    pub async fn state(&self) -> Result<SessionState> {
        Ok(match self.registry.load(&self.session_id).await? {
            Some((record, _)) => record.state,
            None => SessionState::Uninitialized,
        })
    }

    /// Returns the acknowledgment correlator shared by this controller.
    #[must_use]
    pub fn correlator(&self) -> &AckCorrelator {
        &self.correlator
    }

    /// Establishes the session with a signed handshake.
    ///
    /// Sends the handshake carrying credentials and the last accepted input
    /// sequence, verifies the response signature against the trusted key for
    /// the counterparty, reconciles the output counter with the value the
    /// counterparty reported, and transitions to `Active`. Any failure past
    /// the handshake send moves the session to `Error`.
    ///
    /// # Errors
    /// - [`SessionError::UnknownCounterparty`] if no trusted key is registered
    /// - [`SessionError::HandshakeSignatureInvalid`] on a bad signature
    /// - [`SessionError::SequenceInconsistency`] if the local output counter
    ///   is ahead of what the counterparty reported
    pub async fn establish(&self) -> Result<()> {
        let key = self
            .keys
            .verification_key(&self.config.counterparty_id)
            .ok_or_else(|| SessionError::UnknownCounterparty {
                counterparty: self.config.counterparty_id.to_string(),
            })?;

        self.registry
            .init(&self.session_id, &self.config.counterparty_id)
            .await?;
        self.registry
            .transition(&self.session_id, SessionState::HandshakePending)
            .await?;

        match self.run_handshake(&key).await {
            Ok(()) => {
                self.registry
                    .transition(&self.session_id, SessionState::Active)
                    .await?;
                self.heartbeat.lock().reset();
                info!(session = %self.session_id, "session established");
                self.delivery.on_session_active(&self.session_id).await;
                Ok(())
            }
            Err(e) => {
                warn!(session = %self.session_id, error = %e, "handshake failed");
                let _ = self
                    .registry
                    .transition(&self.session_id, SessionState::Error)
                    .await;
                self.delivery.on_session_terminated(&self.session_id).await;
                Err(e)
            }
        }
    }

    async fn run_handshake(&self, key: &[u8]) -> Result<()> {
        let counters = self.ledger.counters(&self.session_id).await?;
        let request = GatewayMessage::Handshake {
            reference: MsgRef::generate(),
            counterparty_id: self.config.local_id.clone(),
            last_input_sequence: counters.input_sequence,
            credentials: self.config.credentials.clone(),
        };
        self.send_message(&request).await?;

        let frame = self.transport.recv().await?;
        let content = steelwire_integrity::open(&frame, &self.mac_key)?;
        let response = GatewayMessage::decode(content)?;

        match response {
            GatewayMessage::HandshakeAck {
                reference,
                counterparty_id,
                last_received_sequence,
                signature,
            } => {
                if counterparty_id != self.config.counterparty_id {
                    return Err(SessionError::HandshakeRejected {
                        reason: format!("response from unexpected party {counterparty_id}"),
                    }
                    .into());
                }
                if !steelwire_integrity::verify_handshake_ack(
                    &reference,
                    &counterparty_id,
                    last_received_sequence,
                    &signature,
                    key,
                ) {
                    return Err(SessionError::HandshakeSignatureInvalid {
                        counterparty: counterparty_id.to_string(),
                    }
                    .into());
                }
                self.ledger
                    .reconcile(&self.session_id, last_received_sequence)
                    .await
            }
            other => Err(SessionError::HandshakeRejected {
                reason: format!(
                    "expected handshake response, got message {}",
                    other.reference()
                ),
            }
            .into()),
        }
    }

    /// Sends a business payload over the session.
    ///
    /// Allocates the next durable output sequence, seals and sends the
    /// frame, and registers it for acknowledgment. The returned handle
    /// resolves to the ACK, the NACK reason, or a timeout.
    ///
    /// # Errors
    /// - [`SessionError::InvalidState`] unless the session is `Active`
    /// - [`SessionError::SessionInactive`] if the persisted last activity is
    ///   older than the liveness timeout, regardless of local belief
    pub async fn send_business(&self, reference: MsgRef, payload: Bytes) -> Result<AckHandle> {
        let state = self.state().await?;
        if !state.allows_send() {
            return Err(SessionError::InvalidState {
                expected: SessionState::Active.to_string(),
                current: state.to_string(),
            }
            .into());
        }
        if !self
            .registry
            .is_usable(&self.session_id, self.config.liveness_timeout)
            .await?
        {
            let idle = match self.registry.load(&self.session_id).await? {
                Some((record, _)) => self.registry.idle_duration(&record),
                None => Duration::ZERO,
            };
            return Err(SessionError::SessionInactive {
                idle_ms: idle.as_millis() as u64,
            }
            .into());
        }

        let sequence = self.ledger.next_output_sequence(&self.session_id).await?;
        let message = GatewayMessage::Business {
            reference: reference.clone(),
            sequence: sequence.value(),
            payload,
        };
        self.send_message(&message).await?;
        let handle = self
            .correlator
            .register(&reference, self.config.ack_timeout)
            .await?;
        self.registry.touch(&self.session_id).await?;
        debug!(session = %self.session_id, reference = %reference, seq = %sequence, "business message sent");
        Ok(handle)
    }

    /// Runs one frame through the inbound pipeline.
    ///
    /// Order is fixed: integrity validation, then sequence validation, then
    /// duplicate suppression, then delivery. A message failing an earlier
    /// stage never reaches a later one.
    ///
    /// # Errors
    /// - An integrity error rejects the frame outright
    /// - [`SessionError::RecoveryExhausted`] once a gap range used up its
    ///   attempts; the session moves to `Error`
    pub async fn handle_inbound(&self, frame: Bytes) -> Result<InboundDisposition> {
        let state = self.state().await?;
        if !state.allows_receive() {
            return Err(SessionError::InvalidState {
                expected: "ACTIVE or DEGRADED".to_string(),
                current: state.to_string(),
            }
            .into());
        }

        let content = steelwire_integrity::open(&frame, &self.mac_key)?;
        let message = GatewayMessage::decode(content)?;

        {
            let mut monitor = self.heartbeat.lock();
            match &message {
                GatewayMessage::KeepAliveResponse { reference } => {
                    monitor.on_message_received(Some(reference));
                }
                _ => monitor.on_message_received(None),
            }
        }
        self.registry.touch(&self.session_id).await?;

        match message {
            GatewayMessage::Business {
                reference,
                sequence,
                payload,
            } => {
                self.handle_business(reference, sequence, payload).await
            }
            GatewayMessage::KeepAlive { reference } => {
                let response = GatewayMessage::KeepAliveResponse { reference };
                self.send_message(&response).await?;
                Ok(InboundDisposition::Control)
            }
            GatewayMessage::KeepAliveResponse { .. } => Ok(InboundDisposition::Control),
            GatewayMessage::Ack { message_id, .. } => {
                self.correlator.resolve(&message_id, AckResolution::Ack).await?;
                Ok(InboundDisposition::Control)
            }
            GatewayMessage::Nack {
                message_id,
                code,
                text,
                ..
            } => {
                self.correlator
                    .resolve(&message_id, AckResolution::Nack { code, text })
                    .await?;
                Ok(InboundDisposition::Control)
            }
            GatewayMessage::RecoveryRequest { begin, end, .. } => {
                // Retransmission is served by the hosting application, which
                // owns the outbound archive.
                warn!(
                    session = %self.session_id,
                    begin,
                    end,
                    "counterparty requested retransmission"
                );
                Ok(InboundDisposition::Control)
            }
            GatewayMessage::Logout { .. } => {
                info!(session = %self.session_id, "counterparty logout");
                self.registry
                    .transition(&self.session_id, SessionState::Terminated)
                    .await?;
                self.delivery.on_session_terminated(&self.session_id).await;
                Ok(InboundDisposition::Control)
            }
            GatewayMessage::Handshake { .. } | GatewayMessage::HandshakeAck { .. } => {
                warn!(session = %self.session_id, "handshake message outside establishment");
                Ok(InboundDisposition::Control)
            }
        }
    }

    async fn handle_business(
        &self,
        reference: MsgRef,
        sequence: u64,
        payload: Bytes,
    ) -> Result<InboundDisposition> {
        match self
            .ledger
            .validate_input_sequence(&self.session_id, sequence)
            .await?
        {
            SequenceCheck::Accepted => {
                self.recovery.clear_filled(&self.session_id, sequence).await?;
                match self.duplicates.check_and_register(&reference).await? {
                    DuplicateCheck::New => {
                        self.delivery
                            .on_message(&self.session_id, &reference, payload)
                            .await;
                        Ok(InboundDisposition::Delivered)
                    }
                    DuplicateCheck::Duplicate { occurrence_count } => {
                        Ok(InboundDisposition::DuplicateSuppressed { occurrence_count })
                    }
                }
            }
            SequenceCheck::Duplicate { expected, received } => {
                debug!(
                    session = %self.session_id,
                    expected,
                    received,
                    "stale sequence dropped"
                );
                Ok(InboundDisposition::StaleSequence { expected, received })
            }
            SequenceCheck::Gap { expected, received } => {
                match self
                    .recovery
                    .on_gap(self.transport.as_ref(), &self.session_id, expected, received)
                    .await
                {
                    Ok(RecoveryStatus::Recovering {
                        begin,
                        end,
                        attempt,
                    }) => Ok(InboundDisposition::Recovering {
                        begin,
                        end,
                        attempt,
                    }),
                    Err(e) => {
                        let _ = self
                            .registry
                            .transition(&self.session_id, SessionState::Error)
                            .await;
                        self.delivery.on_session_terminated(&self.session_id).await;
                        Err(e)
                    }
                }
            }
        }
    }

    /// Runs one heartbeat supervision step.
    ///
    /// Sends a keep-alive probe after a quiet interval; counts an unanswered
    /// probe as a miss; at the configured miss limit the session degrades.
    ///
    /// # Errors
    /// Returns a store or transport error on failure.
    pub async fn heartbeat_tick(&self) -> Result<()> {
        if self.state().await? != SessionState::Active {
            return Ok(());
        }

        enum Action {
            Idle,
            Degrade(u32),
            Probe(GatewayMessage),
        }

        let action = {
            let mut monitor = self.heartbeat.lock();
            if monitor.probe_overdue() {
                let missed = monitor.record_missed();
                if monitor.is_degraded() {
                    Action::Degrade(missed)
                } else {
                    Action::Idle
                }
            } else if monitor.should_send_probe() {
                let probe = GatewayMessage::keep_alive();
                monitor.on_probe_sent(probe.reference().clone());
                Action::Probe(probe)
            } else {
                Action::Idle
            }
        };

        match action {
            Action::Degrade(missed) => {
                warn!(session = %self.session_id, missed, "heartbeat misses reached limit");
                self.registry
                    .transition(&self.session_id, SessionState::Degraded)
                    .await?;
                self.delivery.on_session_degraded(&self.session_id).await;
            }
            Action::Probe(probe) => {
                debug!(session = %self.session_id, reference = %probe.reference(), "keep-alive probe");
                self.send_message(&probe).await?;
                self.registry.touch(&self.session_id).await?;
            }
            Action::Idle => {}
        }
        Ok(())
    }

    /// Spawns the periodic heartbeat supervision task.
    ///
    /// The task stops once the session reaches a terminal state.
    #[must_use]
    pub fn spawn_heartbeat(self: &Arc<Self>) -> JoinHandle<()> {
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(controller.config.heartbeat_interval);
            loop {
                ticker.tick().await;
                match controller.state().await {
                    Ok(state) if state.is_terminal() => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "heartbeat state check failed");
                        continue;
                    }
                }
                if let Err(e) = controller.heartbeat_tick().await {
                    warn!(error = %e, "heartbeat tick failed");
                }
            }
        })
    }

    /// Drives the inbound loop until the transport closes or the session
    /// reaches a terminal state.
    ///
    /// Frame-level failures are logged and do not stop the loop; the
    /// counterparty retransmits or the session degrades on its own terms.
    ///
    /// # Errors
    /// Returns a store error if session state cannot be read.
    pub async fn run(&self) -> Result<()> {
        loop {
            let frame = match self.transport.recv().await {
                Ok(frame) => frame,
                Err(e) => {
                    info!(session = %self.session_id, error = %e, "transport closed");
                    return Ok(());
                }
            };
            match self.handle_inbound(frame).await {
                Ok(disposition) => {
                    debug!(session = %self.session_id, ?disposition, "frame handled");
                }
                Err(e) => warn!(session = %self.session_id, error = %e, "frame rejected"),
            }
            if self.state().await?.is_terminal() {
                return Ok(());
            }
        }
    }

    /// Rebuilds acknowledgment timeout scheduling from persisted records.
    ///
    /// Call once at startup; deadlines are absolute, so a restart neither
    /// resets nor extends them.
    ///
    /// # Errors
    /// Returns a store error on failure.
    pub async fn hydrate(&self) -> Result<HydrationReport> {
        self.correlator.hydrate().await
    }

    /// Spawns the periodic acknowledgment hydration sweep.
    #[must_use]
    pub fn spawn_hydration(&self) -> JoinHandle<()> {
        self.correlator.spawn_hydration(self.config.hydration_interval)
    }

    /// Terminates the session in an orderly fashion.
    ///
    /// Sends a logout best-effort and persists the terminal state.
    ///
    /// # Errors
    /// Returns a store error on failure.
    pub async fn terminate(&self) -> Result<()> {
        let logout = GatewayMessage::Logout {
            reference: MsgRef::generate(),
        };
        if let Err(e) = self.send_message(&logout).await {
            warn!(session = %self.session_id, error = %e, "logout send failed");
        }
        self.registry
            .transition(&self.session_id, SessionState::Terminated)
            .await?;
        self.delivery.on_session_terminated(&self.session_id).await;
        Ok(())
    }

    async fn send_message(&self, message: &GatewayMessage) -> Result<()> {
        let frame = steelwire_integrity::seal(&message.encode()?, &self.mac_key);
        self.transport.send(Bytes::from(frame)).await?;
        self.heartbeat.lock().on_message_sent();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::GatewayBuilder;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use steelwire_core::error::{AckError, GatewayError};
    use steelwire_core::types::CounterpartyId;
    use steelwire_integrity::sign_handshake_ack;
    use steelwire_store::MemoryStore;
    use steelwire_transport::ChannelTransport;

    const KEY: &[u8] = b"bilateral-secret";

    struct StaticKeys(HashMap<String, Vec<u8>>);

    impl TrustedKeyProvider for StaticKeys {
        fn verification_key(&self, counterparty: &CounterpartyId) -> Option<Vec<u8>> {
            self.0.get(counterparty.as_str()).cloned()
        }
    }

    #[derive(Default)]
    struct RecordingDelivery {
        messages: Mutex<Vec<(MsgRef, Bytes)>>,
    }

    #[async_trait]
    impl DeliveryHandler for RecordingDelivery {
        async fn on_message(&self, _session_id: &SessionId, reference: &MsgRef, payload: Bytes) {
            self.messages.lock().push((reference.clone(), payload));
        }
    }

    struct Harness {
        controller: Arc<SessionController>,
        remote: Arc<ChannelTransport>,
        delivery: Arc<RecordingDelivery>,
        store: Arc<MemoryStore>,
    }

    fn keys() -> Arc<StaticKeys> {
        let mut map = HashMap::new();
        map.insert("BANKDEFF".to_string(), KEY.to_vec());
        Arc::new(StaticKeys(map))
    }

    fn config() -> SessionConfig {
        SessionConfig::new(
            CounterpartyId::new("BANKGB2L").unwrap(),
            CounterpartyId::new("BANKDEFF").unwrap(),
            "secret",
        )
    }

    fn harness_with(config: SessionConfig) -> Harness {
        let (local, remote) = ChannelTransport::pair();
        let delivery = Arc::new(RecordingDelivery::default());
        let store = Arc::new(MemoryStore::new());
        let controller = GatewayBuilder::new()
            .config(config)
            .store(store.clone())
            .transport(Arc::new(local))
            .keys(keys())
            .delivery(delivery.clone())
            .build()
            .unwrap();
        Harness {
            controller: Arc::new(controller),
            remote: Arc::new(remote),
            delivery,
            store,
        }
    }

    fn harness() -> Harness {
        harness_with(config())
    }

    async fn remote_recv(remote: &ChannelTransport) -> GatewayMessage {
        let frame = remote.recv().await.unwrap();
        let content = steelwire_integrity::open(&frame, KEY).unwrap();
        GatewayMessage::decode(content).unwrap()
    }

    fn frame(message: &GatewayMessage) -> Bytes {
        Bytes::from(steelwire_integrity::seal(&message.encode().unwrap(), KEY))
    }

    fn business(reference: &str, sequence: u64) -> GatewayMessage {
        GatewayMessage::Business {
            reference: MsgRef::new(reference).unwrap(),
            sequence,
            payload: Bytes::from_static(b"payload"),
        }
    }

    /// Plays the counterparty side of a handshake, signing with `key`.
    fn accept_handshake(remote: Arc<ChannelTransport>, key: &'static [u8]) -> JoinHandle<()> {
        tokio::spawn(async move {
            let request = remote_recv(&remote).await;
            assert!(matches!(request, GatewayMessage::Handshake { .. }));

            let reference = MsgRef::generate();
            let counterparty = CounterpartyId::new("BANKDEFF").unwrap();
            let signature = sign_handshake_ack(&reference, &counterparty, 0, key);
            let response = GatewayMessage::HandshakeAck {
                reference,
                counterparty_id: counterparty,
                last_received_sequence: 0,
                signature,
            };
            remote.send(frame(&response)).await.unwrap();
        })
    }

    async fn established() -> Harness {
        let harness = harness();
        let responder = accept_handshake(harness.remote.clone(), KEY);
        harness.controller.establish().await.unwrap();
        responder.await.unwrap();
        harness
    }

    #[tokio::test]
    async fn test_establish_reaches_active() {
        let harness = established().await;
        assert_eq!(
            harness.controller.state().await.unwrap(),
            SessionState::Active
        );
    }

    #[tokio::test]
    async fn test_establish_rejects_bad_signature() {
        let harness = harness();
        let responder = accept_handshake(harness.remote.clone(), b"wrong-key");

        let err = harness.controller.establish().await.unwrap_err();
        responder.await.unwrap();
        assert!(matches!(
            err,
            GatewayError::Session(SessionError::HandshakeSignatureInvalid { .. })
        ));
        assert_eq!(
            harness.controller.state().await.unwrap(),
            SessionState::Error
        );
    }

    #[tokio::test]
    async fn test_send_requires_active_session() {
        let harness = harness();
        let err = harness
            .controller
            .send_business(MsgRef::new("M1").unwrap(), Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GatewayError::Session(SessionError::InvalidState { .. })
        ));
    }

    #[tokio::test]
    async fn test_stale_activity_blocks_send() {
        let harness = established().await;

        // Age the persisted record; the gate re-derives liveness from it,
        // not from any local belief.
        let key = format!("session/{}", harness.controller.session_id());
        let value = harness.store.get(&key).await.unwrap().unwrap();
        let mut record: steelwire_session::state::SessionRecord =
            serde_json::from_slice(&value.data).unwrap();
        record.last_activity_at = chrono::Utc::now() - chrono::Duration::minutes(10);
        harness
            .store
            .put(&key, &serde_json::to_vec(&record).unwrap(), None)
            .await
            .unwrap();

        let err = harness
            .controller
            .send_business(MsgRef::new("M-STALE").unwrap(), Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GatewayError::Session(SessionError::SessionInactive { .. })
        ));
        // State alone still reads Active; only the liveness gate blocks.
        assert_eq!(
            harness.controller.state().await.unwrap(),
            SessionState::Active
        );
    }

    #[tokio::test]
    async fn test_send_allocates_contiguous_sequences() {
        let harness = established().await;

        for expected in 1..=3u64 {
            let reference = MsgRef::generate();
            harness
                .controller
                .send_business(reference, Bytes::from_static(b"x"))
                .await
                .unwrap();
            match remote_recv(&harness.remote).await {
                GatewayMessage::Business { sequence, .. } => assert_eq!(sequence, expected),
                other => panic!("expected business message, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_ack_resolves_sent_message() {
        let harness = established().await;
        let reference = MsgRef::new("M-ACK").unwrap();
        let handle = harness
            .controller
            .send_business(reference.clone(), Bytes::from_static(b"x"))
            .await
            .unwrap();
        remote_recv(&harness.remote).await;

        let ack = GatewayMessage::Ack {
            reference: MsgRef::generate(),
            message_id: reference.clone(),
        };
        let disposition = harness.controller.handle_inbound(frame(&ack)).await.unwrap();
        assert_eq!(disposition, InboundDisposition::Control);

        let ack = handle.wait().await.unwrap();
        assert_eq!(ack.message_id, reference);
    }

    #[tokio::test]
    async fn test_nack_carries_reason_code() {
        let harness = established().await;
        let reference = MsgRef::new("M-NACK").unwrap();
        let handle = harness
            .controller
            .send_business(reference.clone(), Bytes::from_static(b"x"))
            .await
            .unwrap();
        remote_recv(&harness.remote).await;

        let nack = GatewayMessage::Nack {
            reference: MsgRef::generate(),
            message_id: reference,
            code: "T27".to_string(),
            text: "invalid field".to_string(),
        };
        harness.controller.handle_inbound(frame(&nack)).await.unwrap();

        let err = handle.wait().await.unwrap_err();
        assert!(matches!(err, AckError::Rejected { code, .. } if code == "T27"));
    }

    #[tokio::test]
    async fn test_inbound_gap_recovery_pipeline() {
        let harness = established().await;
        let controller = &harness.controller;

        // Catch the input counter up to 9.
        for seq in 1..=9u64 {
            let disposition = controller
                .handle_inbound(frame(&business(&format!("R{seq}"), seq)))
                .await
                .unwrap();
            assert_eq!(disposition, InboundDisposition::Delivered);
        }

        assert_eq!(
            controller
                .handle_inbound(frame(&business("R10", 10)))
                .await
                .unwrap(),
            InboundDisposition::Delivered
        );
        assert_eq!(
            controller
                .handle_inbound(frame(&business("R11", 11)))
                .await
                .unwrap(),
            InboundDisposition::Delivered
        );

        // 14 while expecting 12: recovery request for [12, 13] goes out and
        // the triggering message is not delivered.
        assert_eq!(
            controller
                .handle_inbound(frame(&business("R14", 14)))
                .await
                .unwrap(),
            InboundDisposition::Recovering {
                begin: 12,
                end: 13,
                attempt: 1
            }
        );
        match remote_recv(&harness.remote).await {
            GatewayMessage::RecoveryRequest { begin, end, .. } => {
                assert_eq!((begin, end), (12, 13));
            }
            other => panic!("expected recovery request, got {other:?}"),
        }

        // Retransmissions fill the range, then 14 arrives again in order.
        for seq in 12..=14u64 {
            assert_eq!(
                controller
                    .handle_inbound(frame(&business(&format!("R{seq}"), seq)))
                    .await
                    .unwrap(),
                InboundDisposition::Delivered
            );
        }

        // A replay of 14 is stale, not a gap.
        assert_eq!(
            controller
                .handle_inbound(frame(&business("R14-BIS", 14)))
                .await
                .unwrap(),
            InboundDisposition::StaleSequence {
                expected: 15,
                received: 14
            }
        );

        // A new sequence reusing an already-seen reference is suppressed.
        assert_eq!(
            controller
                .handle_inbound(frame(&business("R10", 15)))
                .await
                .unwrap(),
            InboundDisposition::DuplicateSuppressed {
                occurrence_count: 2
            }
        );

        let delivered: Vec<String> = harness
            .delivery
            .messages
            .lock()
            .iter()
            .map(|(reference, _)| reference.to_string())
            .collect();
        assert_eq!(delivered.len(), 14);
        assert_eq!(delivered.last().unwrap(), "R14");
    }

    #[tokio::test]
    async fn test_tampered_frame_rejected_before_sequencing() {
        let harness = established().await;
        let mut bytes = frame(&business("R1", 1)).to_vec();
        bytes[0] ^= 0x01;

        let err = harness
            .controller
            .handle_inbound(Bytes::from(bytes))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Integrity(_)));
        assert!(harness.delivery.messages.lock().is_empty());
    }

    #[tokio::test]
    async fn test_keep_alive_is_answered() {
        let harness = established().await;
        let probe = GatewayMessage::KeepAlive {
            reference: MsgRef::new("PROBE-1").unwrap(),
        };
        harness.controller.handle_inbound(frame(&probe)).await.unwrap();

        match remote_recv(&harness.remote).await {
            GatewayMessage::KeepAliveResponse { reference } => {
                assert_eq!(reference.as_str(), "PROBE-1");
            }
            other => panic!("expected keep-alive response, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missed_heartbeats_degrade_session() {
        let mut config = config().with_heartbeat_interval(Duration::from_millis(10));
        config.missed_heartbeat_limit = 1;
        let harness = harness_with(config);
        let responder = accept_handshake(harness.remote.clone(), KEY);
        harness.controller.establish().await.unwrap();
        responder.await.unwrap();

        // Quiet interval: tick sends a probe.
        tokio::time::sleep(Duration::from_millis(15)).await;
        harness.controller.heartbeat_tick().await.unwrap();
        assert!(matches!(
            remote_recv(&harness.remote).await,
            GatewayMessage::KeepAlive { .. }
        ));

        // The probe goes unanswered for a full interval: one miss, limit 1.
        tokio::time::sleep(Duration::from_millis(15)).await;
        harness.controller.heartbeat_tick().await.unwrap();

        assert_eq!(
            harness.controller.state().await.unwrap(),
            SessionState::Degraded
        );
        let err = harness
            .controller
            .send_business(MsgRef::generate(), Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GatewayError::Session(SessionError::InvalidState { .. })
        ));
    }

    #[tokio::test]
    async fn test_probe_response_keeps_session_active() {
        let config = config().with_heartbeat_interval(Duration::from_millis(10));
        let harness = harness_with(config);
        let responder = accept_handshake(harness.remote.clone(), KEY);
        harness.controller.establish().await.unwrap();
        responder.await.unwrap();

        tokio::time::sleep(Duration::from_millis(15)).await;
        harness.controller.heartbeat_tick().await.unwrap();
        let probe_ref = match remote_recv(&harness.remote).await {
            GatewayMessage::KeepAlive { reference } => reference,
            other => panic!("expected probe, got {other:?}"),
        };

        let response = GatewayMessage::KeepAliveResponse {
            reference: probe_ref,
        };
        harness
            .controller
            .handle_inbound(frame(&response))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(15)).await;
        harness.controller.heartbeat_tick().await.unwrap();
        assert_eq!(
            harness.controller.state().await.unwrap(),
            SessionState::Active
        );
    }

    #[tokio::test]
    async fn test_counterparty_logout_terminates() {
        let harness = established().await;
        let logout = GatewayMessage::Logout {
            reference: MsgRef::generate(),
        };
        harness.controller.handle_inbound(frame(&logout)).await.unwrap();
        assert_eq!(
            harness.controller.state().await.unwrap(),
            SessionState::Terminated
        );

        // Terminal sessions accept nothing further.
        let err = harness
            .controller
            .handle_inbound(frame(&business("R1", 1)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GatewayError::Session(SessionError::InvalidState { .. })
        ));
    }

    #[tokio::test]
    async fn test_terminate_sends_logout() {
        let harness = established().await;
        harness.controller.terminate().await.unwrap();
        assert!(matches!(
            remote_recv(&harness.remote).await,
            GatewayMessage::Logout { .. }
        ));
        assert_eq!(
            harness.controller.state().await.unwrap(),
            SessionState::Terminated
        );
    }
}
