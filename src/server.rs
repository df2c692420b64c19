use crate::association::{Association, SessionEnd};
use crate::auth::{CredentialValidator, UserPass};
use crate::config::ServerConfig;
use crate::registry::Registry;
use anyhow::{Result, anyhow, bail};
use std::future;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::select;
use tracing::{error, info};

/// Socks5Server represents a SOCKS5 server and houses related
/// configuration data
pub struct Socks5Server {
    pub listen_addr: String,
    config: ServerConfig,
    registry: Arc<Registry>,
    listener: Option<TcpListener>,
}

/// Socks5Server implementation block
impl Socks5Server {
    /// new is a constructor for the Socks5Server type
    pub fn new(listen_addr: impl Into<String>) -> Self {
        Self {
            listen_addr: listen_addr.into(),
            config: ServerConfig::default(),
            registry: Registry::new(),
            listener: None,
        }
    }

    /// with_auth requires the given credentials from every client. No
    /// credentials keeps the default policy
    pub fn with_auth(mut self, auth: Option<UserPass>) -> Self {
        if let Some(creds) = auth {
            self.config.allow_no_auth = false;
            self.config.validator = Arc::new(creds);
        }
        self
    }

    /// with_validator replaces the credential policy used for
    /// username/password authentication
    pub fn with_validator(mut self, validator: Arc<dyn CredentialValidator>) -> Self {
        self.config = self.config.with_validator(validator);
        self
    }

    /// with_bind_addr sets the local source address of upstream connections
    pub fn with_bind_addr(mut self, bind_addr: Option<IpAddr>) -> Self {
        self.config = self.config.with_bind_addr(bind_addr);
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.config = self.config.with_poll_interval(poll_interval);
        self
    }

    pub fn with_config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// registry returns the set of relaying associations
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// bind to the listen address, fails when called twice
    pub async fn bind(&mut self) -> Result<SocketAddr> {
        if self.listener.is_some() {
            bail!("[ERR] server is already bound");
        }

        // Instantiate tokio listener
        let listener = TcpListener::bind(&self.listen_addr).await?;
        let addr = listener.local_addr()?;

        // DEBUG
        info!("SOCKS5 proxy listening on {:?}", addr);

        self.listener = Some(listener);
        Ok(addr)
    }

    /// run handles server spinup and listens for incoming connections
    pub async fn run(&mut self) -> Result<()> {
        self.run_until(future::pending()).await
    }

    /// run_until accepts connections until `shutdown` completes, then closes
    /// every relaying association
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        if self.listener.is_none() {
            self.bind().await?;
        }
        let listener = self
            .listener
            .take()
            .ok_or_else(|| anyhow!("[ERR] listener not bound"))?;
        let config = Arc::new(self.config.clone());
        tokio::pin!(shutdown);

        // Listen for connections to proxy
        loop {
            select! {
                _ = &mut shutdown => {
                    info!("shutdown requested");
                    break;
                }
                accepted = listener.accept() => {
                    let (inbound, peer_addr) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            error!("accept failed: {e}");
                            continue;
                        }
                    };

                    let association =
                        Association::new(inbound, peer_addr, config.clone(), &self.registry);

                    // Spawn async task
                    tokio::spawn(async move {
                        // DEBUG
                        info!("new client: {}", peer_addr);

                        match association.run().await {
                            Ok(SessionEnd::Relayed(stats)) => info!(
                                "connection closed: {} bytes from client, {} bytes from server",
                                stats.client_to_upstream, stats.upstream_to_client
                            ),
                            Ok(SessionEnd::Rejected(rejection)) => {
                                info!("client {peer_addr} rejected: {rejection}")
                            }
                            Err(e) => error!("connection error: {e}"),
                        }
                    });
                }
            }
        }

        let closed = self.registry.close_all();
        info!("closed {closed} active associations");
        Ok(())
    }
}
