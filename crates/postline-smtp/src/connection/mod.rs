//! SMTP connection management.

mod client;
mod config;
mod framed;
mod stream;

pub use client::Client;
pub use config::{
    Config, ConfigBuilder, DEFAULT_CONNECT_TIMEOUT, DEFAULT_LOCAL_NAME, DEFAULT_PORT,
    IMPLICIT_TLS_PORT, Security, TlsPolicy,
};
pub use framed::FramedStream;
pub use stream::{SmtpStream, dial};

use crate::types::{AuthMechanism, Extension};
use std::collections::HashSet;

/// What is known about the server of one session.
#[derive(Debug, Clone, Default)]
pub struct ServerInfo {
    /// Name the client connected to.
    pub host: String,
    /// Server name from the greeting banner.
    pub greeting: String,
    /// Whether the connection is TLS-encrypted.
    pub tls: bool,
    /// Extensions from the last EHLO reply.
    pub extensions: HashSet<Extension>,
}

impl ServerInfo {
    /// Checks if an extension keyword was advertised, case-insensitively.
    #[must_use]
    pub fn has_extension(&self, keyword: &str) -> bool {
        self.extension(keyword).is_some()
    }

    /// Returns the advertised extension with this keyword.
    #[must_use]
    pub fn extension(&self, keyword: &str) -> Option<&Extension> {
        self.extensions
            .iter()
            .find(|ext| ext.keyword().eq_ignore_ascii_case(keyword))
    }

    /// Returns the maximum message size, if advertised.
    #[must_use]
    pub fn max_message_size(&self) -> Option<usize> {
        match self.extension("SIZE") {
            Some(Extension::Size(size)) => *size,
            _ => None,
        }
    }

    /// Returns the advertised authentication mechanisms.
    #[must_use]
    pub fn auth_mechanisms(&self) -> &[AuthMechanism] {
        match self.extension("AUTH") {
            Some(Extension::Auth(mechanisms)) => mechanisms.as_slice(),
            _ => &[],
        }
    }

    /// Returns true if the server is this machine.
    #[must_use]
    pub fn is_localhost(&self) -> bool {
        matches!(self.host.as_str(), "localhost" | "127.0.0.1" | "::1")
    }
}
