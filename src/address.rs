use crate::error::{CodecError, ProtocolError};
use crate::protocol::AddressType;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Address represents a network address or domain carried in a SOCKS5
/// request or reply. The ATYP byte is derived from the variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    Ipv4(Ipv4Addr),
    Domain(String),
    Ipv6(Ipv6Addr),
}

impl Address {
    /// address_type returns the ATYP matching this address
    pub fn address_type(&self) -> AddressType {
        match self {
            Address::Ipv4(_) => AddressType::IPv4,
            Address::Domain(_) => AddressType::DomainName,
            Address::Ipv6(_) => AddressType::IPv6,
        }
    }

    /// empty returns the zero-length domain used when there is no bound
    /// address to report
    pub fn empty() -> Self {
        Address::Domain(String::new())
    }

    /// encoded_len is the number of bytes of ATYP + address
    fn encoded_len(&self) -> usize {
        match self {
            Address::Ipv4(_) => 1 + 4,
            Address::Domain(domain) => 1 + 1 + domain.len(),
            Address::Ipv6(_) => 1 + 16,
        }
    }
}

impl From<IpAddr> for Address {
    fn from(ip: IpAddr) -> Self {
        match ip {
            IpAddr::V4(ip) => Address::Ipv4(ip),
            IpAddr::V6(ip) => Address::Ipv6(ip),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Ipv4(ip) => write!(f, "{ip}"),
            Address::Domain(domain) => f.write_str(domain),
            Address::Ipv6(ip) => write!(f, "[{ip}]"),
        }
    }
}

/// read_address parses ATYP, DST.ADDR and DST.PORT from the stream
pub async fn read_address<R>(reader: &mut R) -> Result<(Address, u16), CodecError>
where
    R: AsyncRead + Unpin,
{
    let address = match AddressType::try_from(reader.read_u8().await?)? {
        AddressType::IPv4 => {
            let mut octets = [0u8; 4];
            reader.read_exact(&mut octets).await?;
            Address::Ipv4(Ipv4Addr::from(octets))
        }
        AddressType::DomainName => {
            // First octet in DomainName contains the number of
            // octets to follow, zero is allowed
            let len = reader.read_u8().await?;
            let mut domain = vec![0u8; len as usize];
            reader.read_exact(&mut domain).await?;
            let domain = String::from_utf8(domain).map_err(|_| ProtocolError::InvalidDomainName)?;
            Address::Domain(domain)
        }
        AddressType::IPv6 => {
            let mut octets = [0u8; 16];
            reader.read_exact(&mut octets).await?;
            Address::Ipv6(Ipv6Addr::from(octets))
        }
    };

    // Port is big endian (network order)
    let port = reader.read_u16().await?;

    Ok((address, port))
}

/// put_address appends ATYP, address and port to the buffer
pub fn put_address(buf: &mut Vec<u8>, address: &Address, port: u16) -> Result<(), CodecError> {
    buf.reserve(address.encoded_len() + 2);
    match address {
        Address::Ipv4(ip) => {
            buf.push(AddressType::IPv4 as u8);
            buf.extend_from_slice(&ip.octets());
        }
        Address::Domain(domain) => {
            let len = u8::try_from(domain.len()).map_err(|_| CodecError::InvalidField {
                field: "domain name",
                len: domain.len(),
            })?;
            buf.push(AddressType::DomainName as u8);
            buf.push(len);
            buf.extend_from_slice(domain.as_bytes());
        }
        Address::Ipv6(ip) => {
            buf.push(AddressType::IPv6 as u8);
            buf.extend_from_slice(&ip.octets());
        }
    }
    buf.extend_from_slice(&port.to_be_bytes());
    Ok(())
}

/// split_socket_addr converts a socket address into an Address and port
pub fn split_socket_addr(addr: SocketAddr) -> (Address, u16) {
    (Address::from(addr.ip()), addr.port())
}
