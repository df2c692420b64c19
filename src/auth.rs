use crate::config::ServerConfig;
use crate::error::{Rejection, SessionError};
use crate::message::{MethodSelection, MethodsOffer, UserPassRequest, UserPassStatus};
use crate::protocol::{AuthMethod, AuthStatus};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

/// CredentialValidator decides whether a username/password pair is accepted
pub trait CredentialValidator: Send + Sync {
    fn validate(&self, username: &[u8], password: &[u8]) -> bool;
}

impl<F> CredentialValidator for F
where
    F: Fn(&[u8], &[u8]) -> bool + Send + Sync,
{
    fn validate(&self, username: &[u8], password: &[u8]) -> bool {
        self(username, password)
    }
}

/// AcceptNonEmpty accepts any pair where both fields are non-empty
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptNonEmpty;

impl CredentialValidator for AcceptNonEmpty {
    fn validate(&self, username: &[u8], password: &[u8]) -> bool {
        !username.is_empty() && !password.is_empty()
    }
}

/// UserPass holds username/password credentials as dictated
/// server-side
#[derive(Clone)]
pub struct UserPass {
    pub username: String,
    pub password: String,
}

impl CredentialValidator for UserPass {
    fn validate(&self, username: &[u8], password: &[u8]) -> bool {
        username == self.username.as_bytes() && password == self.password.as_bytes()
    }
}

/// greet reads the client's offered methods and answers with the selected
/// one. Nothing acceptable ends in a rejection after the answer is sent
pub async fn greet<S>(stream: &mut S, config: &ServerConfig) -> Result<AuthMethod, SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let offer = MethodsOffer::read_from(stream).await?;
    debug!("client offered methods: {:?}", offer.methods);

    // Retrieve desired method
    let method = select_auth_method(&offer.methods, config.allow_no_auth);

    // Write response to client with selected method
    MethodSelection { method }.write_to(stream).await?;

    match method {
        AuthMethod::NoAuth | AuthMethod::Password => {
            debug!("selected auth method: {method}");
            Ok(method)
        }
        AuthMethod::GssApi | AuthMethod::Other(_) | AuthMethod::NoAcceptable => {
            Err(Rejection::NoAcceptableMethod.into())
        }
    }
}

/// authenticate_userpass handles username/password authentication according to RFC 1929
pub async fn authenticate_userpass<S>(
    stream: &mut S,
    validator: &dyn CredentialValidator,
) -> Result<(), SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let request = UserPassRequest::read_from(stream).await?;

    // Validate credentials
    let status = if validator.validate(&request.username, &request.password) {
        AuthStatus::Success
    } else {
        AuthStatus::Failure
    };

    UserPassStatus {
        status: status as u8,
    }
    .write_to(stream)
    .await?;

    match status {
        AuthStatus::Success => {
            debug!(
                "user {} authenticated",
                String::from_utf8_lossy(&request.username)
            );
            Ok(())
        }
        AuthStatus::Failure => Err(Rejection::AuthFailed.into()),
    }
}

/// select_auth_method picks no-auth when offered and allowed, otherwise
/// username/password when offered, otherwise no-acceptable
pub fn select_auth_method(client_methods: &[AuthMethod], allow_no_auth: bool) -> AuthMethod {
    if allow_no_auth && client_methods.contains(&AuthMethod::NoAuth) {
        AuthMethod::NoAuth
    } else if client_methods.contains(&AuthMethod::Password) {
        AuthMethod::Password
    } else {
        AuthMethod::NoAcceptable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream, duplex};

    async fn greet_and_authenticate(
        stream: &mut DuplexStream,
        config: &ServerConfig,
    ) -> Result<AuthMethod, SessionError> {
        let method = greet(stream, config).await?;
        if method == AuthMethod::Password {
            authenticate_userpass(stream, config.validator.as_ref()).await?;
        }
        Ok(method)
    }

    #[test]
    fn prefers_no_auth() {
        let offered = [AuthMethod::Password, AuthMethod::NoAuth];
        assert_eq!(select_auth_method(&offered, true), AuthMethod::NoAuth);
        assert_eq!(
            select_auth_method(&[AuthMethod::Password], true),
            AuthMethod::Password
        );
        assert_eq!(
            select_auth_method(&[AuthMethod::GssApi], true),
            AuthMethod::NoAcceptable
        );
        assert_eq!(
            select_auth_method(&[AuthMethod::Other(0x80)], true),
            AuthMethod::NoAcceptable
        );
    }

    #[test]
    fn no_auth_can_be_disabled() {
        let offered = [AuthMethod::Password, AuthMethod::NoAuth];
        assert_eq!(select_auth_method(&offered, false), AuthMethod::Password);
        assert_eq!(
            select_auth_method(&[AuthMethod::NoAuth], false),
            AuthMethod::NoAcceptable
        );
    }

    #[test]
    fn validators() {
        assert!(AcceptNonEmpty.validate(b"u", b"p"));
        assert!(!AcceptNonEmpty.validate(b"", b"p"));
        assert!(!AcceptNonEmpty.validate(b"u", b""));

        let creds = UserPass {
            username: "alice".to_string(),
            password: "hunter2".to_string(),
        };
        assert!(creds.validate(b"alice", b"hunter2"));
        assert!(!creds.validate(b"alice", b"hunter3"));

        let only_bob = |u: &[u8], _: &[u8]| u == b"bob";
        assert!(only_bob.validate(b"bob", b"x"));
        assert!(!only_bob.validate(b"eve", b"x"));
    }

    #[tokio::test]
    async fn password_flow() {
        let (mut client, mut server) = duplex(256);
        let config = ServerConfig::default();

        let handle = tokio::spawn(async move { greet_and_authenticate(&mut server, &config).await });

        client.write_all(&[0x05, 0x01, 0x02]).await.unwrap();
        let mut resp = [0u8; 2];
        client.read_exact(&mut resp).await.unwrap();
        assert_eq!(resp, [0x05, 0x02]);

        client
            .write_all(&[0x01, 0x04, b'u', b's', b'e', b'r', 0x02, b'p', b'w'])
            .await
            .unwrap();
        client.read_exact(&mut resp).await.unwrap();
        assert_eq!(resp, [0x01, 0x00]);

        assert_eq!(handle.await.unwrap().unwrap(), AuthMethod::Password);
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let (mut client, mut server) = duplex(256);
        let config = ServerConfig::default().with_validator(Arc::new(UserPass {
            username: "user".to_string(),
            password: "right".to_string(),
        }));

        let handle = tokio::spawn(async move { greet_and_authenticate(&mut server, &config).await });

        client.write_all(&[0x05, 0x01, 0x02]).await.unwrap();
        client
            .write_all(&[0x01, 0x04, b'u', b's', b'e', b'r', 0x05, b'w', b'r', b'o', b'n', b'g'])
            .await
            .unwrap();

        let mut resp = [0u8; 4];
        client.read_exact(&mut resp).await.unwrap();
        assert_eq!(resp, [0x05, 0x02, 0x01, 0x01]);

        assert!(matches!(
            handle.await.unwrap(),
            Err(SessionError::Rejected(Rejection::AuthFailed))
        ));
    }

    #[tokio::test]
    async fn gssapi_only_is_not_acceptable() {
        let (mut client, mut server) = duplex(256);
        let config = ServerConfig::default();

        let handle = tokio::spawn(async move { greet_and_authenticate(&mut server, &config).await });

        client.write_all(&[0x05, 0x01, 0x01]).await.unwrap();
        let mut resp = [0u8; 2];
        client.read_exact(&mut resp).await.unwrap();
        assert_eq!(resp, [0x05, 0xFF]);

        assert!(matches!(
            handle.await.unwrap(),
            Err(SessionError::Rejected(Rejection::NoAcceptableMethod))
        ));
    }
}
