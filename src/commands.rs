use crate::address::{Address, split_socket_addr};
use crate::config::ServerConfig;
use crate::error::{Rejection, SessionError};
use crate::message::{ConnectionReply, ConnectionRequest};
use crate::protocol::{AddressType, Command, ReplyCode};
use std::io;
use std::net::{IpAddr, SocketAddr};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpSocket, TcpStream, lookup_host};
use tracing::{debug, info};

/// handle_socks_request reads the client request and, for CONNECT, opens
/// the upstream connection and reports its local endpoint to the client
pub async fn handle_socks_request<S>(
    stream: &mut S,
    config: &ServerConfig,
) -> Result<TcpStream, SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let request = ConnectionRequest::read_from(stream).await?;
    debug!(
        "request {:?} {}:{}",
        request.command, request.address, request.port
    );

    match request.command {
        Command::Connect => {}
        Command::Bind | Command::UdpAssociate => {
            ConnectionReply::without_binding(ReplyCode::CmdNotSupported)
                .write_to(stream)
                .await?;
            return Err(Rejection::CommandNotSupported(request.command).into());
        }
    }

    match request.address.address_type() {
        AddressType::IPv4 | AddressType::DomainName => {}
        AddressType::IPv6 => {
            ConnectionReply::without_binding(ReplyCode::AddrTypeNotSupported)
                .write_to(stream)
                .await?;
            return Err(Rejection::AddressTypeNotSupported(AddressType::IPv6).into());
        }
    }

    handle_connect_cmd(stream, &request.address, request.port, config.bind_addr).await
}

// ================
// CONNECT COMMAND
// ================

async fn handle_connect_cmd<S>(
    stream: &mut S,
    address: &Address,
    port: u16,
    bind_addr: Option<IpAddr>,
) -> Result<TcpStream, SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let outbound = match connect_upstream(address, port, bind_addr).await {
        Ok(outbound) => outbound,
        Err(e) => return Err(reply_failure(stream, reply_code_for(&e), e).await),
    };

    let local = match outbound.local_addr() {
        Ok(local) => local,
        Err(e) => return Err(reply_failure(stream, ReplyCode::GeneralFailure, e).await),
    };
    let (bound_addr, bound_port) = split_socket_addr(local);
    info!("connected to {address}:{port} via {bound_addr}:{bound_port}");

    // Send OK reply
    ConnectionReply::new(ReplyCode::Succeeded, bound_addr, bound_port)
        .write_to(stream)
        .await?;

    Ok(outbound)
}

/// reply_failure tells the client the connect leg failed and returns the
/// error that ends the session
async fn reply_failure<S>(stream: &mut S, code: ReplyCode, source: io::Error) -> SessionError
where
    S: AsyncWrite + Unpin,
{
    match ConnectionReply::without_binding(code).write_to(stream).await {
        Ok(()) => SessionError::Connect { code, source },
        Err(e) => e.into(),
    }
}

/// connect_upstream resolves the destination and connects to the first
/// reachable IPv4 address, optionally from the given local source address
pub async fn connect_upstream(
    address: &Address,
    port: u16,
    bind_addr: Option<IpAddr>,
) -> io::Result<TcpStream> {
    let candidates: Vec<SocketAddr> = match address {
        Address::Ipv4(ip) => vec![SocketAddr::new(IpAddr::V4(*ip), port)],
        Address::Ipv6(_) => Vec::new(),
        Address::Domain(domain) => lookup_host((domain.as_str(), port))
            .await
            .map_err(|e| {
                io::Error::new(
                    io::ErrorKind::HostUnreachable,
                    format!("failed to resolve {domain}: {e}"),
                )
            })?
            .collect(),
    };

    let mut last_err = io::Error::new(
        io::ErrorKind::HostUnreachable,
        format!("no IPv4 address for {address}"),
    );

    // Upstream connections are IPv4 only
    for target in candidates.into_iter().filter(SocketAddr::is_ipv4) {
        match connect_addr(target, bind_addr).await {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                debug!("connect to {target} failed: {e}");
                last_err = e;
            }
        }
    }

    Err(last_err)
}

async fn connect_addr(target: SocketAddr, bind_addr: Option<IpAddr>) -> io::Result<TcpStream> {
    let socket = TcpSocket::new_v4()?;
    if let Some(ip) = bind_addr {
        socket.bind(SocketAddr::new(ip, 0))?;
    }
    socket.connect(target).await
}

/// reply_code_for maps an upstream connect error onto the closest reply code
pub fn reply_code_for(e: &io::Error) -> ReplyCode {
    match e.kind() {
        io::ErrorKind::ConnectionRefused => ReplyCode::ConnRefused,
        io::ErrorKind::HostUnreachable | io::ErrorKind::TimedOut => ReplyCode::HostUnreachable,
        io::ErrorKind::NetworkUnreachable => ReplyCode::NetUnreachable,
        io::ErrorKind::PermissionDenied => ReplyCode::NotAllowed,
        _ => ReplyCode::GeneralFailure,
    }
}
