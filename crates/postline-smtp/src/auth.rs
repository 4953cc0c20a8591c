//! SASL mechanisms for the AUTH command (RFC 4954).
//!
//! An [`Authenticator`] produces raw response bytes; the client handles the
//! base64 framing and the `334` challenge loop.

use crate::connection::ServerInfo;
use crate::{Error, Result};

/// Client side of one SASL mechanism.
pub trait Authenticator: Send {
    /// Mechanism name sent after `AUTH`.
    fn mechanism(&self) -> &str;

    /// Returns the initial response sent with the AUTH command, if the
    /// mechanism has one.
    ///
    /// This is also where a mechanism refuses to run on a connection it
    /// considers unsafe.
    ///
    /// # Errors
    ///
    /// Returns an error to abort before anything is sent.
    fn initial_response(&mut self, server: &ServerInfo) -> Result<Option<Vec<u8>>>;

    /// Answers a decoded `334` challenge.
    ///
    /// # Errors
    ///
    /// Returns an error to cancel the exchange.
    fn respond(&mut self, challenge: &[u8]) -> Result<Vec<u8>>;
}

/// Password mechanisms send credentials in the clear, so they only run over
/// TLS or to the local machine.
fn require_protected(server: &ServerInfo) -> Result<()> {
    if server.tls || server.is_localhost() {
        Ok(())
    } else {
        Err(Error::Auth("unencrypted connection".into()))
    }
}

/// PLAIN (RFC 4616).
#[derive(Clone)]
pub struct Plain {
    identity: String,
    username: String,
    password: String,
}

impl Plain {
    /// Authenticates as `username`.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            identity: String::new(),
            username: username.into(),
            password: password.into(),
        }
    }

    /// Sets the authorization identity to act as.
    #[must_use]
    pub fn identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = identity.into();
        self
    }
}

impl std::fmt::Debug for Plain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plain")
            .field("identity", &self.identity)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl Authenticator for Plain {
    fn mechanism(&self) -> &str {
        "PLAIN"
    }

    fn initial_response(&mut self, server: &ServerInfo) -> Result<Option<Vec<u8>>> {
        require_protected(server)?;
        let resp = format!("{}\0{}\0{}", self.identity, self.username, self.password);
        Ok(Some(resp.into_bytes()))
    }

    fn respond(&mut self, _challenge: &[u8]) -> Result<Vec<u8>> {
        Err(Error::Auth("unexpected server challenge".into()))
    }
}

/// LOGIN (draft-murchison-sasl-login).
#[derive(Clone)]
pub struct Login {
    username: String,
    password: String,
    step: u8,
}

impl Login {
    /// Authenticates as `username`.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            step: 0,
        }
    }
}

impl std::fmt::Debug for Login {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Login")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl Authenticator for Login {
    fn mechanism(&self) -> &str {
        "LOGIN"
    }

    fn initial_response(&mut self, server: &ServerInfo) -> Result<Option<Vec<u8>>> {
        require_protected(server)?;
        self.step = 0;
        Ok(None)
    }

    fn respond(&mut self, challenge: &[u8]) -> Result<Vec<u8>> {
        let prompt = String::from_utf8_lossy(challenge).to_ascii_lowercase();
        let answer = if prompt.starts_with("username") {
            &self.username
        } else if prompt.starts_with("password") {
            &self.password
        } else {
            // servers that send other prompts still ask in this order
            match self.step {
                0 => &self.username,
                1 => &self.password,
                _ => return Err(Error::Auth("unexpected server challenge".into())),
            }
        };
        self.step += 1;
        Ok(answer.as_bytes().to_vec())
    }
}

/// XOAUTH2, as used by Google and Microsoft.
#[derive(Clone)]
pub struct XOAuth2 {
    user: String,
    token: String,
}

impl XOAuth2 {
    /// Authenticates `user` with an `OAuth2` access token.
    #[must_use]
    pub fn new(user: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for XOAuth2 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XOAuth2")
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

impl Authenticator for XOAuth2 {
    fn mechanism(&self) -> &str {
        "XOAUTH2"
    }

    fn initial_response(&mut self, _server: &ServerInfo) -> Result<Option<Vec<u8>>> {
        let resp = format!("user={}\x01auth=Bearer {}\x01\x01", self.user, self.token);
        Ok(Some(resp.into_bytes()))
    }

    // A challenge carries a JSON error; the empty answer makes the server
    // send the final 535.
    fn respond(&mut self, challenge: &[u8]) -> Result<Vec<u8>> {
        tracing::debug!(error = %String::from_utf8_lossy(challenge), "XOAUTH2 rejected");
        Ok(Vec::new())
    }
}

/// OAUTHBEARER (RFC 7628).
#[derive(Clone)]
pub struct OAuthBearer {
    user: String,
    token: String,
}

impl OAuthBearer {
    /// Authenticates `user` with an `OAuth2` access token.
    #[must_use]
    pub fn new(user: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for OAuthBearer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthBearer")
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

impl Authenticator for OAuthBearer {
    fn mechanism(&self) -> &str {
        "OAUTHBEARER"
    }

    fn initial_response(&mut self, _server: &ServerInfo) -> Result<Option<Vec<u8>>> {
        let resp = format!("n,a={},\x01auth=Bearer {}\x01\x01", self.user, self.token);
        Ok(Some(resp.into_bytes()))
    }

    // RFC 7628 §3.2.3: acknowledge the error with a single ^A.
    fn respond(&mut self, challenge: &[u8]) -> Result<Vec<u8>> {
        tracing::debug!(error = %String::from_utf8_lossy(challenge), "OAUTHBEARER rejected");
        Ok(vec![0x01])
    }
}
