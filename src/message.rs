//! Encode and decode of every SOCKS5 handshake, request and reply message.
//!
//! Each message has a `read_from` for the receiving side and a `write_to`
//! for the sending side, so the same types serve the server and client roles.

use crate::address::{Address, put_address, read_address};
use crate::error::{CodecError, ProtocolError};
use crate::protocol::{AuthMethod, Command, RSV, ReplyCode, SOCKS5_VERSION, USERPASS_VERSION};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

async fn read_version<R>(reader: &mut R, expected: u8) -> Result<(), CodecError>
where
    R: AsyncRead + Unpin,
{
    let actual = reader.read_u8().await?;
    if actual != expected {
        return Err(ProtocolError::VersionMismatch { expected, actual }.into());
    }
    Ok(())
}

async fn read_reserved<R>(reader: &mut R) -> Result<(), CodecError>
where
    R: AsyncRead + Unpin,
{
    let rsv = reader.read_u8().await?;
    if rsv != RSV {
        return Err(ProtocolError::ReservedNotZero(rsv).into());
    }
    Ok(())
}

/// read_field reads a one byte length prefix and that many bytes
async fn read_field<R>(reader: &mut R) -> Result<Vec<u8>, CodecError>
where
    R: AsyncRead + Unpin,
{
    let len = reader.read_u8().await?;
    let mut field = vec![0u8; len as usize];
    reader.read_exact(&mut field).await?;
    Ok(field)
}

fn field_len(field: &'static str, len: usize) -> Result<u8, CodecError> {
    match len {
        1..=255 => Ok(len as u8),
        _ => Err(CodecError::InvalidField { field, len }),
    }
}

async fn send<W>(writer: &mut W, buf: &[u8]) -> Result<(), CodecError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(buf).await.map_err(CodecError::Transport)?;
    writer.flush().await.map_err(CodecError::Transport)
}

/// MethodsOffer is the client greeting
// +----+----------+----------+
// |VER | NMETHODS | METHODS  |
// +----+----------+----------+
// | 1  |    1     | 1 to 255 |
// +----+----------+----------+
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodsOffer {
    pub methods: Vec<AuthMethod>,
}

impl MethodsOffer {
    pub async fn read_from<R>(reader: &mut R) -> Result<Self, CodecError>
    where
        R: AsyncRead + Unpin,
    {
        read_version(reader, SOCKS5_VERSION).await?;
        let n_methods = reader.read_u8().await?;
        if n_methods == 0 {
            return Err(ProtocolError::EmptyMethodList.into());
        }

        let mut methods = vec![0u8; n_methods as usize];
        reader.read_exact(&mut methods).await?;

        Ok(Self {
            methods: methods.into_iter().map(AuthMethod::from).collect(),
        })
    }

    pub async fn write_to<W>(&self, writer: &mut W) -> Result<(), CodecError>
    where
        W: AsyncWrite + Unpin,
    {
        let n_methods = field_len("method list", self.methods.len())?;
        let mut buf = Vec::with_capacity(2 + self.methods.len());
        buf.push(SOCKS5_VERSION);
        buf.push(n_methods);
        buf.extend(self.methods.iter().map(|m| m.code()));
        send(writer, &buf).await
    }
}

/// MethodSelection is the server's auth method choice
// +----+--------+
// |VER | METHOD |
// +----+--------+
// | 1  |   1    |
// +----+--------+
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodSelection {
    pub method: AuthMethod,
}

impl MethodSelection {
    pub async fn read_from<R>(reader: &mut R) -> Result<Self, CodecError>
    where
        R: AsyncRead + Unpin,
    {
        read_version(reader, SOCKS5_VERSION).await?;
        let method = AuthMethod::from(reader.read_u8().await?);
        Ok(Self { method })
    }

    pub async fn write_to<W>(&self, writer: &mut W) -> Result<(), CodecError>
    where
        W: AsyncWrite + Unpin,
    {
        send(writer, &[SOCKS5_VERSION, self.method.code()]).await
    }
}

/// UserPassRequest is the RFC 1929 credential message. Lengths are not
/// checked on decode so that the validator decides on empty fields
// +----+------+----------+------+----------+
// |VER | ULEN |  UNAME   | PLEN |  PASSWD  |
// +----+------+----------+------+----------+
// | 1  |  1   | 1 to 255 |  1   | 1 to 255 |
// +----+------+----------+------+----------+
#[derive(Clone, PartialEq, Eq)]
pub struct UserPassRequest {
    pub username: Vec<u8>,
    pub password: Vec<u8>,
}

impl std::fmt::Debug for UserPassRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserPassRequest")
            .field("username", &String::from_utf8_lossy(&self.username))
            .finish_non_exhaustive()
    }
}

impl UserPassRequest {
    pub fn new(username: impl Into<Vec<u8>>, password: impl Into<Vec<u8>>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub async fn read_from<R>(reader: &mut R) -> Result<Self, CodecError>
    where
        R: AsyncRead + Unpin,
    {
        read_version(reader, USERPASS_VERSION).await?;
        let username = read_field(reader).await?;
        let password = read_field(reader).await?;
        Ok(Self { username, password })
    }

    pub async fn write_to<W>(&self, writer: &mut W) -> Result<(), CodecError>
    where
        W: AsyncWrite + Unpin,
    {
        let ulen = field_len("username", self.username.len())?;
        let plen = field_len("password", self.password.len())?;

        let mut buf = Vec::with_capacity(3 + self.username.len() + self.password.len());
        buf.push(USERPASS_VERSION);
        buf.push(ulen);
        buf.extend_from_slice(&self.username);
        buf.push(plen);
        buf.extend_from_slice(&self.password);
        send(writer, &buf).await
    }
}

/// UserPassStatus is the server's answer to a UserPassRequest
// +----+--------+
// |VER | STATUS |
// +----+--------+
// | 1  |   1    |
// +----+--------+
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserPassStatus {
    pub status: u8,
}

impl UserPassStatus {
    pub fn is_success(&self) -> bool {
        self.status == 0x00
    }

    pub async fn read_from<R>(reader: &mut R) -> Result<Self, CodecError>
    where
        R: AsyncRead + Unpin,
    {
        read_version(reader, USERPASS_VERSION).await?;
        let status = reader.read_u8().await?;
        Ok(Self { status })
    }

    pub async fn write_to<W>(&self, writer: &mut W) -> Result<(), CodecError>
    where
        W: AsyncWrite + Unpin,
    {
        send(writer, &[USERPASS_VERSION, self.status]).await
    }
}

/// ConnectionRequest is the client command
// +----+-----+-------+------+----------+----------+
// |VER | CMD |  RSV  | ATYP | DST.ADDR | DST.PORT |
// +----+-----+-------+------+----------+----------+
// | 1  |  1  | X'00' |  1   | Variable |    2     |
// +----+-----+-------+------+----------+----------+
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionRequest {
    pub command: Command,
    pub address: Address,
    pub port: u16,
}

impl ConnectionRequest {
    pub async fn read_from<R>(reader: &mut R) -> Result<Self, CodecError>
    where
        R: AsyncRead + Unpin,
    {
        read_version(reader, SOCKS5_VERSION).await?;
        let command = Command::try_from(reader.read_u8().await?)?;
        read_reserved(reader).await?;
        let (address, port) = read_address(reader).await?;
        Ok(Self {
            command,
            address,
            port,
        })
    }

    pub async fn write_to<W>(&self, writer: &mut W) -> Result<(), CodecError>
    where
        W: AsyncWrite + Unpin,
    {
        let mut buf = vec![SOCKS5_VERSION, self.command as u8, RSV];
        put_address(&mut buf, &self.address, self.port)?;
        send(writer, &buf).await
    }
}

/// ConnectionReply is the server's answer to a ConnectionRequest
// +----+-----+-------+------+----------+----------+
// |VER | REP |  RSV  | ATYP | BND.ADDR | BND.PORT |
// +----+-----+-------+------+----------+----------+
// | 1  |  1  | X'00' |  1   | Variable |    2     |
// +----+-----+-------+------+----------+----------+
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionReply {
    pub reply: ReplyCode,
    pub address: Address,
    pub port: u16,
}

impl ConnectionReply {
    pub fn new(reply: ReplyCode, address: Address, port: u16) -> Self {
        Self {
            reply,
            address,
            port,
        }
    }

    /// without_binding builds a reply for when no upstream socket exists:
    /// an empty domain name and port 0
    pub fn without_binding(reply: ReplyCode) -> Self {
        Self::new(reply, Address::empty(), 0)
    }

    pub async fn read_from<R>(reader: &mut R) -> Result<Self, CodecError>
    where
        R: AsyncRead + Unpin,
    {
        read_version(reader, SOCKS5_VERSION).await?;
        let reply = ReplyCode::try_from(reader.read_u8().await?)?;
        read_reserved(reader).await?;
        let (address, port) = read_address(reader).await?;
        Ok(Self {
            reply,
            address,
            port,
        })
    }

    pub async fn write_to<W>(&self, writer: &mut W) -> Result<(), CodecError>
    where
        W: AsyncWrite + Unpin,
    {
        let mut buf = vec![SOCKS5_VERSION, self.reply as u8, RSV];
        put_address(&mut buf, &self.address, self.port)?;
        send(writer, &buf).await
    }
}
