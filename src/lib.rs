//! A lightweight SOCKS5 proxy library
//!
//! ## SOCKS5 Implementation
//!
//! - Features:
//!     - CONNECT, optionally from a fixed local source address
//!     - BIND and UDP ASSOCIATE are answered with "command not supported"
//!     - No Authentication
//!     - Username/Password Authentication with a pluggable credential policy
//!     - Async using tokio, one task per client connection
//!     - Half-close aware relay
//!     - Registry of relaying sessions for bulk shutdown
//!     - Client-side handshake helper sharing the same codec
//! - [SOCKS5 (RFC 1928)](https://datatracker.ietf.org/doc/html/rfc1928)
//! - [Username/Password Authentication (RFC 1929)](https://datatracker.ietf.org/doc/html/rfc1929)
//!
//! # Example
//! ```no_run
//! use minisocks::Socks5Server;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut server = Socks5Server::new("127.0.0.1:1080");
//!     server.run_until(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await
//! }
//! ```

pub mod address;
pub mod association;
pub mod auth;
pub mod client;
pub mod commands;
pub mod config;
pub mod error;
pub mod message;
pub mod protocol;
pub mod registry;
pub mod relay;
pub mod server;

// Re-export main types at crate root for convenience
pub use address::Address;
pub use association::{Association, AssociationHandle, AssociationState, SessionEnd};
pub use auth::{AcceptNonEmpty, CredentialValidator, UserPass};
pub use client::Socks5Client;
pub use config::ServerConfig;
pub use error::{ClientError, CodecError, ProtocolError, Rejection, SessionError};
pub use protocol::{AddressType, AuthMethod, Command, ReplyCode};
pub use registry::Registry;
pub use relay::{Relay, RelayStats};
pub use server::Socks5Server;
