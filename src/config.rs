use crate::auth::{AcceptNonEmpty, CredentialValidator};
use crate::relay::{DEFAULT_CHUNK_SIZE, DEFAULT_POLL_INTERVAL, Relay};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

/// ServerConfig holds the per-connection settings shared by every
/// association spawned from one server
#[derive(Clone)]
pub struct ServerConfig {
    /// Whether clients may skip authentication
    pub allow_no_auth: bool,
    /// Credential policy for username/password authentication
    pub validator: Arc<dyn CredentialValidator>,
    /// Local source address for upstream connections
    pub bind_addr: Option<IpAddr>,
    pub relay: Relay,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            allow_no_auth: true,
            validator: Arc::new(AcceptNonEmpty),
            bind_addr: None,
            relay: Relay::new(DEFAULT_CHUNK_SIZE, DEFAULT_POLL_INTERVAL),
        }
    }
}

impl ServerConfig {
    pub fn with_validator(mut self, validator: Arc<dyn CredentialValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_bind_addr(mut self, bind_addr: Option<IpAddr>) -> Self {
        self.bind_addr = bind_addr;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.relay = Relay::new(self.relay.chunk_size, poll_interval);
        self
    }
}
