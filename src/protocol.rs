use crate::error::ProtocolError;
use std::fmt;

/// SOCKS protocol version byte for handshake, request and reply
pub const SOCKS5_VERSION: u8 = 0x05;

/// Username/password subnegotiation version (RFC 1929)
pub const USERPASS_VERSION: u8 = 0x01;

// RSV: Fields marked RESERVED (RSV) must be set to X'00'.
pub const RSV: u8 = 0x00;

/// AuthMethod represents SOCKS5 authentication methods. Unassigned and
/// private method codes are carried through as `Other`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthMethod {
    NoAuth,
    GssApi,
    Password,
    // 0x03 - 0x7f: IANA assigned
    // 0x80 - 0xFE: private methods
    Other(u8),
    NoAcceptable,
}

impl AuthMethod {
    /// code returns the wire byte of the method
    pub fn code(self) -> u8 {
        match self {
            AuthMethod::NoAuth => 0x00,
            AuthMethod::GssApi => 0x01,
            AuthMethod::Password => 0x02,
            AuthMethod::Other(v) => v,
            AuthMethod::NoAcceptable => 0xFF,
        }
    }
}

impl From<u8> for AuthMethod {
    fn from(byte: u8) -> Self {
        match byte {
            0x00 => AuthMethod::NoAuth,
            0x01 => AuthMethod::GssApi,
            0x02 => AuthMethod::Password,
            0xFF => AuthMethod::NoAcceptable,
            v => AuthMethod::Other(v),
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMethod::NoAuth => f.write_str("no-auth"),
            AuthMethod::GssApi => f.write_str("gssapi"),
            AuthMethod::Password => f.write_str("username/password"),
            AuthMethod::Other(v) => write!(f, "method 0x{v:02x}"),
            AuthMethod::NoAcceptable => f.write_str("no-acceptable"),
        }
    }
}

/// Command represents SOCKS5 protocol commands
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Connect = 0x01,
    Bind = 0x02,
    UdpAssociate = 0x03,
}

impl TryFrom<u8> for Command {
    type Error = ProtocolError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0x01 => Ok(Command::Connect),
            0x02 => Ok(Command::Bind),
            0x03 => Ok(Command::UdpAssociate),
            value => Err(ProtocolError::UnknownEnumValue {
                field: "command",
                value,
            }),
        }
    }
}

/// AddressType represents the SOCKS5 address types:
/// IPv4, Domain Name, IPv6
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressType {
    IPv4 = 0x01,
    DomainName = 0x03,
    IPv6 = 0x04,
}

impl TryFrom<u8> for AddressType {
    type Error = ProtocolError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0x01 => Ok(AddressType::IPv4),
            0x03 => Ok(AddressType::DomainName),
            0x04 => Ok(AddressType::IPv6),
            value => Err(ProtocolError::UnknownEnumValue {
                field: "address type",
                value,
            }),
        }
    }
}

/// ReplyCode is the REP field of a SOCKS5 reply
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyCode {
    Succeeded = 0x00,
    GeneralFailure = 0x01,
    NotAllowed = 0x02,
    NetUnreachable = 0x03,
    HostUnreachable = 0x04,
    ConnRefused = 0x05,
    TtlExpired = 0x06,
    CmdNotSupported = 0x07,
    AddrTypeNotSupported = 0x08,
    // 0x09 - 0xFF: unassigned
}

impl TryFrom<u8> for ReplyCode {
    type Error = ProtocolError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0x00 => Ok(ReplyCode::Succeeded),
            0x01 => Ok(ReplyCode::GeneralFailure),
            0x02 => Ok(ReplyCode::NotAllowed),
            0x03 => Ok(ReplyCode::NetUnreachable),
            0x04 => Ok(ReplyCode::HostUnreachable),
            0x05 => Ok(ReplyCode::ConnRefused),
            0x06 => Ok(ReplyCode::TtlExpired),
            0x07 => Ok(ReplyCode::CmdNotSupported),
            0x08 => Ok(ReplyCode::AddrTypeNotSupported),
            value => Err(ProtocolError::UnknownEnumValue {
                field: "reply code",
                value,
            }),
        }
    }
}

/// AuthStatus is the STATUS byte of a username/password response.
/// Any non-zero status is a failure
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    Success = 0x00,
    Failure = 0x01,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_method_covers_every_byte() {
        for byte in 0..=u8::MAX {
            assert_eq!(AuthMethod::from(byte).code(), byte);
        }
        assert_eq!(AuthMethod::from(0x02), AuthMethod::Password);
        assert_eq!(AuthMethod::from(0x80), AuthMethod::Other(0x80));
    }

    #[test]
    fn command_rejects_unknown() {
        assert_eq!(Command::try_from(0x01).unwrap(), Command::Connect);
        assert_eq!(Command::try_from(0x03).unwrap(), Command::UdpAssociate);
        for byte in [0x00, 0x04, 0xFF] {
            assert!(matches!(
                Command::try_from(byte),
                Err(ProtocolError::UnknownEnumValue { value, .. }) if value == byte
            ));
        }
    }

    #[test]
    fn address_type_rejects_unknown() {
        assert_eq!(AddressType::try_from(0x04).unwrap(), AddressType::IPv6);
        for byte in [0x00, 0x02, 0x05] {
            assert!(matches!(
                AddressType::try_from(byte),
                Err(ProtocolError::UnknownEnumValue { .. })
            ));
        }
    }

    #[test]
    fn reply_code_rejects_unknown() {
        for byte in 0x00..=0x08 {
            assert_eq!(ReplyCode::try_from(byte).unwrap() as u8, byte);
        }
        assert!(matches!(
            ReplyCode::try_from(0x09),
            Err(ProtocolError::UnknownEnumValue { value: 0x09, .. })
        ));
    }
}
