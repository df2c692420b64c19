use crate::protocol::{AddressType, Command, ReplyCode};
use std::io;
use thiserror::Error;

/// Malformed or unexpected bytes on the wire. Always fatal to the connection
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("truncated read")]
    TruncatedRead,
    #[error("version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: u8, actual: u8 },
    #[error("unknown {field} value 0x{value:02x}")]
    UnknownEnumValue { field: &'static str, value: u8 },
    #[error("reserved byte not zeroed: 0x{0:02x}")]
    ReservedNotZero(u8),
    #[error("no auth method offered")]
    EmptyMethodList,
    #[error("invalid domain name")]
    InvalidDomainName,
}

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("transport error: {0}")]
    Transport(io::Error),
    #[error("invalid {field} length {len}")]
    InvalidField { field: &'static str, len: usize },
}

impl From<io::Error> for CodecError {
    fn from(e: io::Error) -> Self {
        if matches!(e.kind(), io::ErrorKind::UnexpectedEof) {
            CodecError::Protocol(ProtocolError::TruncatedRead)
        } else {
            CodecError::Transport(e)
        }
    }
}

/// Rejection is an expected refusal that was already reported to the client
/// through the protocol before the connection was closed
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    #[error("no acceptable auth method")]
    NoAcceptableMethod,
    #[error("authentication failed")]
    AuthFailed,
    #[error("command {0:?} not supported")]
    CommandNotSupported(Command),
    #[error("address type {0:?} not supported")]
    AddressTypeNotSupported(AddressType),
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("rejected: {0}")]
    Rejected(#[from] Rejection),
    #[error("upstream connect failed ({code:?}): {source}")]
    Connect {
        code: ReplyCode,
        #[source]
        source: io::Error,
    },
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("connect to proxy failed: {0}")]
    Io(#[from] io::Error),
    #[error("no acceptable auth method")]
    NoAcceptableMethod,
    #[error("auth failed with status 0x{0:02x}")]
    AuthFailed(u8),
    #[error("request failed: {0:?}")]
    RequestFailed(ReplyCode),
}
