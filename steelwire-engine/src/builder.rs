/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Gateway builder.
//!
//! Wires the controller to its store, transport, key provider and delivery
//! seam. Missing collaborators are a configuration error at build time, not
//! a panic at first use.

use crate::controller::SessionController;
use crate::delivery::{DeliveryHandler, NoOpDelivery};
use std::sync::Arc;
use steelwire_core::error::{Result, SessionError};
use steelwire_integrity::TrustedKeyProvider;
use steelwire_session::config::SessionConfig;
use steelwire_store::KvStore;
use steelwire_transport::Transport;

/// Builder for a [`SessionController`].
#[derive(Default)]
pub struct GatewayBuilder {
    config: Option<SessionConfig>,
    store: Option<Arc<dyn KvStore>>,
    transport: Option<Arc<dyn Transport>>,
    keys: Option<Arc<dyn TrustedKeyProvider>>,
    delivery: Option<Arc<dyn DeliveryHandler>>,
}

impl GatewayBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the session configuration.
    #[must_use]
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the shared persistent store.
    #[must_use]
    pub fn store(mut self, store: Arc<dyn KvStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the raw frame transport.
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the trusted key provider.
    #[must_use]
    pub fn keys(mut self, keys: Arc<dyn TrustedKeyProvider>) -> Self {
        self.keys = Some(keys);
        self
    }

    /// Sets the application delivery handler. Defaults to a logging no-op.
    #[must_use]
    pub fn delivery(mut self, delivery: Arc<dyn DeliveryHandler>) -> Self {
        self.delivery = Some(delivery);
        self
    }

    /// Builds the controller.
    ///
    /// # Errors
    /// - [`SessionError::Configuration`] if a required collaborator is missing
    /// - [`SessionError::UnknownCounterparty`] if the key provider has no key
    ///   for the configured counterparty
    pub fn build(self) -> Result<SessionController> {
        let config = self
            .config
            .ok_or_else(|| SessionError::Configuration("config is required".to_string()))?;
        let store = self
            .store
            .ok_or_else(|| SessionError::Configuration("store is required".to_string()))?;
        let transport = self
            .transport
            .ok_or_else(|| SessionError::Configuration("transport is required".to_string()))?;
        let keys = self
            .keys
            .ok_or_else(|| SessionError::Configuration("key provider is required".to_string()))?;
        let delivery = self
            .delivery
            .unwrap_or_else(|| Arc::new(NoOpDelivery));

        let mac_key = keys
            .verification_key(&config.counterparty_id)
            .ok_or_else(|| SessionError::UnknownCounterparty {
                counterparty: config.counterparty_id.to_string(),
            })?;

        Ok(SessionController::new(
            config, store, transport, keys, delivery, mac_key,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use steelwire_core::error::GatewayError;
    use steelwire_core::types::CounterpartyId;
    use steelwire_store::MemoryStore;
    use steelwire_transport::ChannelTransport;

    struct StaticKeys(HashMap<String, Vec<u8>>);

    impl TrustedKeyProvider for StaticKeys {
        fn verification_key(&self, counterparty: &CounterpartyId) -> Option<Vec<u8>> {
            self.0.get(counterparty.as_str()).cloned()
        }
    }

    fn config() -> SessionConfig {
        SessionConfig::new(
            CounterpartyId::new("BANKGB2L").unwrap(),
            CounterpartyId::new("BANKDEFF").unwrap(),
            "secret",
        )
    }

    fn keys_with(counterparty: &str) -> Arc<StaticKeys> {
        let mut map = HashMap::new();
        map.insert(counterparty.to_string(), b"key".to_vec());
        Arc::new(StaticKeys(map))
    }

    #[test]
    fn test_build_with_all_parts() {
        let (local, _remote) = ChannelTransport::pair();
        let controller = GatewayBuilder::new()
            .config(config())
            .store(Arc::new(MemoryStore::new()))
            .transport(Arc::new(local))
            .keys(keys_with("BANKDEFF"))
            .build()
            .unwrap();
        assert_eq!(controller.session_id().as_str(), "BANKGB2L->BANKDEFF");
    }

    #[test]
    fn test_build_missing_transport_fails() {
        let err = GatewayBuilder::new()
            .config(config())
            .store(Arc::new(MemoryStore::new()))
            .keys(keys_with("BANKDEFF"))
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            GatewayError::Session(SessionError::Configuration(_))
        ));
    }

    #[test]
    fn test_build_unknown_counterparty_fails() {
        let (local, _remote) = ChannelTransport::pair();
        let err = GatewayBuilder::new()
            .config(config())
            .store(Arc::new(MemoryStore::new()))
            .transport(Arc::new(local))
            .keys(keys_with("BANKFRPP"))
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            GatewayError::Session(SessionError::UnknownCounterparty { .. })
        ));
    }
}
