//! Client side of the SOCKS5 handshake, built on the same message codec the
//! server uses.

use crate::address::Address;
use crate::error::ClientError;
use crate::message::{
    ConnectionReply, ConnectionRequest, MethodSelection, MethodsOffer, UserPassRequest,
    UserPassStatus,
};
use crate::protocol::{AuthMethod, Command, ReplyCode};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream, ToSocketAddrs};

#[derive(Debug, Clone, Default)]
pub struct Socks5Client {
    credentials: Option<UserPassRequest>,
}

impl Socks5Client {
    pub fn new() -> Self {
        Self::default()
    }

    /// with_credentials offers username/password instead of no-auth
    pub fn with_credentials(username: impl Into<Vec<u8>>, password: impl Into<Vec<u8>>) -> Self {
        Self {
            credentials: Some(UserPassRequest::new(username, password)),
        }
    }

    /// login runs the greeting and, if the proxy asks for it, the
    /// username/password subnegotiation
    pub async fn login<S>(&self, stream: &mut S) -> Result<AuthMethod, ClientError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let method = match self.credentials {
            Some(_) => AuthMethod::Password,
            None => AuthMethod::NoAuth,
        };
        MethodsOffer {
            methods: vec![method],
        }
        .write_to(stream)
        .await?;

        let selected = MethodSelection::read_from(stream).await?.method;
        match (&self.credentials, selected) {
            (None, AuthMethod::NoAuth) => Ok(selected),
            (Some(credentials), AuthMethod::Password) => {
                credentials.write_to(stream).await?;
                let status = UserPassStatus::read_from(stream).await?;
                if status.is_success() {
                    Ok(selected)
                } else {
                    Err(ClientError::AuthFailed(status.status))
                }
            }
            _ => Err(ClientError::NoAcceptableMethod),
        }
    }

    /// request sends a command and returns the proxy's reply whatever its code
    pub async fn request<S>(
        &self,
        stream: &mut S,
        command: Command,
        address: Address,
        port: u16,
    ) -> Result<ConnectionReply, ClientError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        ConnectionRequest {
            command,
            address,
            port,
        }
        .write_to(stream)
        .await?;
        Ok(ConnectionReply::read_from(stream).await?)
    }

    /// connect opens a tunnel through the proxy. On success the returned
    /// stream carries the relayed bytes
    pub async fn connect<A>(
        &self,
        proxy: A,
        address: Address,
        port: u16,
    ) -> Result<(TcpStream, ConnectionReply), ClientError>
    where
        A: ToSocketAddrs,
    {
        let mut stream = TcpStream::connect(proxy).await?;
        self.login(&mut stream).await?;

        let reply = self
            .request(&mut stream, Command::Connect, address, port)
            .await?;
        match reply.reply {
            ReplyCode::Succeeded => Ok((stream, reply)),
            code => Err(ClientError::RequestFailed(code)),
        }
    }
}
