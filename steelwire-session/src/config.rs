/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Session configuration.
//!
//! This module provides configuration options for gateway sessions.

use std::time::Duration;
use steelwire_core::types::{CounterpartyId, SessionId};

/// Configuration for a gateway session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Local party identifier.
    pub local_id: CounterpartyId,
    /// Remote party identifier.
    pub counterparty_id: CounterpartyId,
    /// Opaque credential material sent during handshake.
    pub credentials: String,
    /// Heartbeat interval.
    pub heartbeat_interval: Duration,
    /// Consecutive missed heartbeat responses before the session degrades.
    pub missed_heartbeat_limit: u32,
    /// Elapsed time since last persisted activity beyond which the session
    /// counts as inactive regardless of local belief.
    pub liveness_timeout: Duration,
    /// Maximum recovery attempts per missing sequence range.
    pub max_recovery_attempts: u32,
    /// Retention for duplicate records.
    pub duplicate_ttl: Duration,
    /// Default timeout for outbound acknowledgment registration.
    pub ack_timeout: Duration,
    /// Interval between hydration sweeps of persisted pending acknowledgments.
    pub hydration_interval: Duration,
}

impl SessionConfig {
    /// Creates a new session configuration with required fields and defaults.
    ///
    /// # Arguments
    /// * `local_id` - The local party identifier
    /// * `counterparty_id` - The remote party identifier
    /// * `credentials` - Credential material for the handshake
    #[must_use]
    pub fn new(
        local_id: CounterpartyId,
        counterparty_id: CounterpartyId,
        credentials: impl Into<String>,
    ) -> Self {
        Self {
            local_id,
            counterparty_id,
            credentials: credentials.into(),
            heartbeat_interval: Duration::from_secs(60),
            missed_heartbeat_limit: 3,
            liveness_timeout: Duration::from_secs(300),
            max_recovery_attempts: 3,
            duplicate_ttl: Duration::from_secs(72 * 3600),
            ack_timeout: Duration::from_secs(30),
            hydration_interval: Duration::from_secs(60),
        }
    }

    /// Returns the stable session identifier for this configuration.
    #[must_use]
    pub fn session_id(&self) -> SessionId {
        SessionId::between(&self.local_id, &self.counterparty_id)
    }

    /// Sets the heartbeat interval.
    #[must_use]
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Sets the liveness timeout.
    #[must_use]
    pub fn with_liveness_timeout(mut self, timeout: Duration) -> Self {
        self.liveness_timeout = timeout;
        self
    }

    /// Sets the maximum recovery attempts per missing range.
    #[must_use]
    pub const fn with_max_recovery_attempts(mut self, attempts: u32) -> Self {
        self.max_recovery_attempts = attempts;
        self
    }

    /// Sets the duplicate record TTL.
    #[must_use]
    pub fn with_duplicate_ttl(mut self, ttl: Duration) -> Self {
        self.duplicate_ttl = ttl;
        self
    }

    /// Sets the default acknowledgment timeout.
    #[must_use]
    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }
}

/// Builder for session configuration.
#[derive(Debug, Default)]
pub struct SessionConfigBuilder {
    local_id: Option<CounterpartyId>,
    counterparty_id: Option<CounterpartyId>,
    credentials: Option<String>,
    heartbeat_interval: Option<Duration>,
    liveness_timeout: Option<Duration>,
    max_recovery_attempts: Option<u32>,
    duplicate_ttl: Option<Duration>,
    ack_timeout: Option<Duration>,
}

impl SessionConfigBuilder {
    /// Creates a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the local party identifier.
    #[must_use]
    pub fn local_id(mut self, id: CounterpartyId) -> Self {
        self.local_id = Some(id);
        self
    }

    /// Sets the counterparty identifier.
    #[must_use]
    pub fn counterparty_id(mut self, id: CounterpartyId) -> Self {
        self.counterparty_id = Some(id);
        self
    }

    /// Sets the handshake credentials.
    #[must_use]
    pub fn credentials(mut self, credentials: impl Into<String>) -> Self {
        self.credentials = Some(credentials.into());
        self
    }

    /// Sets the heartbeat interval.
    #[must_use]
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = Some(interval);
        self
    }

    /// Sets the liveness timeout.
    #[must_use]
    pub fn liveness_timeout(mut self, timeout: Duration) -> Self {
        self.liveness_timeout = Some(timeout);
        self
    }

    /// Sets the maximum recovery attempts per missing range.
    #[must_use]
    pub const fn max_recovery_attempts(mut self, attempts: u32) -> Self {
        self.max_recovery_attempts = Some(attempts);
        self
    }

    /// Sets the duplicate record TTL.
    #[must_use]
    pub fn duplicate_ttl(mut self, ttl: Duration) -> Self {
        self.duplicate_ttl = Some(ttl);
        self
    }

    /// Sets the default acknowledgment timeout.
    #[must_use]
    pub fn ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = Some(timeout);
        self
    }

    /// Builds the configuration.
    ///
    /// # Panics
    /// Panics if required fields are not set.
    #[must_use]
    pub fn build(self) -> SessionConfig {
        let local = self.local_id.expect("local_id is required");
        let counterparty = self.counterparty_id.expect("counterparty_id is required");
        let credentials = self.credentials.unwrap_or_default();

        let mut config = SessionConfig::new(local, counterparty, credentials);
        if let Some(interval) = self.heartbeat_interval {
            config.heartbeat_interval = interval;
        }
        if let Some(timeout) = self.liveness_timeout {
            config.liveness_timeout = timeout;
        }
        if let Some(attempts) = self.max_recovery_attempts {
            config.max_recovery_attempts = attempts;
        }
        if let Some(ttl) = self.duplicate_ttl {
            config.duplicate_ttl = ttl;
        }
        if let Some(timeout) = self.ack_timeout {
            config.ack_timeout = timeout;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_config_defaults() {
        let config = SessionConfig::new(
            CounterpartyId::new("BANKGB2L").unwrap(),
            CounterpartyId::new("BANKDEFF").unwrap(),
            "secret",
        );

        assert_eq!(config.heartbeat_interval, Duration::from_secs(60));
        assert_eq!(config.missed_heartbeat_limit, 3);
        assert_eq!(config.liveness_timeout, Duration::from_secs(300));
        assert_eq!(config.max_recovery_attempts, 3);
        assert_eq!(config.duplicate_ttl, Duration::from_secs(72 * 3600));
        assert_eq!(config.session_id().as_str(), "BANKGB2L->BANKDEFF");
    }

    #[test]
    fn test_session_config_builder() {
        let config = SessionConfigBuilder::new()
            .local_id(CounterpartyId::new("BANKGB2L").unwrap())
            .counterparty_id(CounterpartyId::new("BANKDEFF").unwrap())
            .credentials("secret")
            .heartbeat_interval(Duration::from_secs(10))
            .max_recovery_attempts(5)
            .build();

        assert_eq!(config.heartbeat_interval, Duration::from_secs(10));
        assert_eq!(config.max_recovery_attempts, 5);
        assert_eq!(config.credentials, "secret");
    }
}
