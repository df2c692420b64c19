//! Per-client session: greeting, authentication, command handling and relay.
//!
//! An [`Association`] owns the client channel and, once CONNECT succeeds, the
//! upstream channel. Its [`AssociationHandle`] is the part shared with the
//! [`Registry`] so that a server shutdown can close a relaying session from
//! another task.

use crate::auth;
use crate::commands;
use crate::config::ServerConfig;
use crate::error::{Rejection, SessionError};
use crate::protocol::AuthMethod;
use crate::registry::Registry;
use crate::relay::RelayStats;
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// AssociationId identifies one client session for the life of the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AssociationId(u64);

impl AssociationId {
    fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        AssociationId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for AssociationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// AssociationState is the lifecycle of a session. States only move forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AssociationState {
    Greeting,
    Authenticating,
    CommandPending,
    Relaying,
    Closed,
}

/// SessionEnd is how a session that did not fail finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    Relayed(RelayStats),
    Rejected(Rejection),
}

/// AssociationHandle carries the closed flag of a session, the token that
/// interrupts its relay, and a weak back-reference to the registry it joins
#[derive(Debug)]
pub struct AssociationHandle {
    id: AssociationId,
    peer_addr: SocketAddr,
    closed: AtomicBool,
    cancel: CancellationToken,
    registry: Weak<Registry>,
}

impl AssociationHandle {
    pub fn new(peer_addr: SocketAddr, registry: &Arc<Registry>) -> Arc<Self> {
        Arc::new(Self {
            id: AssociationId::next(),
            peer_addr,
            closed: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            registry: Arc::downgrade(registry),
        })
    }

    pub fn id(&self) -> AssociationId {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// register adds this association to its registry
    pub fn register(self: &Arc<Self>) -> bool {
        match self.registry.upgrade() {
            Some(registry) => registry.add(self.clone()),
            None => false,
        }
    }

    /// close marks the association closed, interrupts any I/O its task is
    /// blocked on and deregisters it. Only the first call has an effect and
    /// returns true
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.cancel.cancel();
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
        debug!("association {} closed", self.id);
        true
    }
}

/// Association drives one client connection through the SOCKS5 session
pub struct Association {
    handle: Arc<AssociationHandle>,
    client: TcpStream,
    upstream: Option<TcpStream>,
    state: AssociationState,
    config: Arc<ServerConfig>,
}

impl Association {
    pub fn new(
        client: TcpStream,
        peer_addr: SocketAddr,
        config: Arc<ServerConfig>,
        registry: &Arc<Registry>,
    ) -> Self {
        Self {
            handle: AssociationHandle::new(peer_addr, registry),
            client,
            upstream: None,
            state: AssociationState::Greeting,
            config,
        }
    }

    /// run handles the full client/server SOCKS5 protocol flow and always
    /// leaves the association closed
    pub async fn run(mut self) -> Result<SessionEnd, SessionError> {
        let result = self.drive().await;
        self.close().await;

        match result {
            Ok(stats) => Ok(SessionEnd::Relayed(stats)),
            Err(SessionError::Rejected(rejection)) => Ok(SessionEnd::Rejected(rejection)),
            Err(e) => Err(e),
        }
    }

    async fn drive(&mut self) -> Result<RelayStats, SessionError> {
        // Negotiate authentication with client
        let method = auth::greet(&mut self.client, &self.config).await?;
        match method {
            AuthMethod::Password => {
                self.transition(AssociationState::Authenticating);
                auth::authenticate_userpass(&mut self.client, self.config.validator.as_ref())
                    .await?;
            }
            AuthMethod::NoAuth => {}
            AuthMethod::GssApi | AuthMethod::Other(_) | AuthMethod::NoAcceptable => {
                return Err(Rejection::NoAcceptableMethod.into());
            }
        }

        // Handle connection request from client
        self.transition(AssociationState::CommandPending);
        let outbound = commands::handle_socks_request(&mut self.client, &self.config).await?;
        let upstream = self.upstream.insert(outbound);

        self.handle.register();
        self.state = AssociationState::Relaying;
        debug!("association {} -> {:?}", self.handle.id, self.state);

        let stats = self
            .config
            .relay
            .run(&mut self.client, upstream, &self.handle.cancel)
            .await?;

        Ok(stats)
    }

    fn transition(&mut self, next: AssociationState) {
        debug_assert!(next > self.state);
        debug!("association {} -> {next:?}", self.handle.id);
        self.state = next;
    }

    /// close deregisters the association and shuts down both channels
    async fn close(&mut self) {
        self.handle.close();
        self.state = AssociationState::Closed;

        // Best effort: the peer may already be gone
        let _ = self.client.shutdown().await;
        if let Some(mut upstream) = self.upstream.take() {
            let _ = upstream.shutdown().await;
        }
        info!(
            "association {} with {} closed",
            self.handle.id, self.handle.peer_addr
        );
    }
}
