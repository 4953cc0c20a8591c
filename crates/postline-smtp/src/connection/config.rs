//! Connection configuration types.

use std::net::IpAddr;
use std::time::Duration;

use crate::{Error, Result};

/// Default SMTP port (RFC 5321).
pub const DEFAULT_PORT: u16 = 25;

/// Default port for implicit TLS submission (RFC 8314).
pub const IMPLICIT_TLS_PORT: u16 = 465;

/// Default connect timeout. Some MTAs use shorter ones, and the OS may cut
/// it further.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Name sent in EHLO when none is configured.
pub const DEFAULT_LOCAL_NAME: &str = "localhost";

/// Connection security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    /// Start with plaintext and upgrade with STARTTLS whenever the server
    /// offers it.
    #[default]
    StartTls,
    /// TLS from the start (port 465).
    Implicit,
}

impl Security {
    /// Returns the default port for this security mode.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::StartTls => DEFAULT_PORT,
            Self::Implicit => IMPLICIT_TLS_PORT,
        }
    }

    /// Returns true for implicit TLS.
    #[must_use]
    pub const fn is_implicit(self) -> bool {
        matches!(self, Self::Implicit)
    }
}

/// How the server certificate is checked when TLS is started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TlsPolicy {
    /// Verify the certificate chain and that it is valid for this name.
    Verify(String),
    /// Accept any certificate.
    ///
    /// The session is encrypted but not authenticated, so an active
    /// attacker can intercept it. Only use this when the caller has decided
    /// that opportunistic encryption is better than none, e.g. for MX
    /// delivery where most peers have no valid certificate.
    InsecureSkipVerify,
}

impl TlsPolicy {
    /// Verifies the certificate against `server_name`.
    #[must_use]
    pub fn verify(server_name: impl Into<String>) -> Self {
        Self::Verify(server_name.into())
    }
}

/// SMTP connection configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server hostname or IP address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Security mode.
    pub security: Security,
    /// Certificate verification policy.
    pub tls: TlsPolicy,
    /// Local IP address to connect from.
    pub local_addr: Option<IpAddr>,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Name announced in EHLO/HELO.
    pub local_name: String,
}

impl Config {
    /// Creates a configuration for `host` on port 25, verifying TLS against
    /// `host`.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        ConfigBuilder::new(host).build()
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(host: impl Into<String>) -> ConfigBuilder {
        ConfigBuilder::new(host)
    }

    /// Creates a configuration from `host`, `host:port`, `[ipv6]` or
    /// `[ipv6]:port`. Without a port, 25 is used.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the host is empty or the port invalid.
    pub fn from_address(addr: &str) -> Result<Self> {
        let (host, port) = split_host_port(addr)?;
        let mut builder = ConfigBuilder::new(host);
        if let Some(port) = port {
            builder = builder.port(port);
        }
        Ok(builder.build())
    }
}

fn split_host_port(addr: &str) -> Result<(&str, Option<u16>)> {
    let (host, port) = if let Some(rest) = addr.strip_prefix('[') {
        let (host, rest) = rest
            .split_once(']')
            .ok_or_else(|| Error::Config(format!("missing ']' in {addr:?}")))?;
        match rest {
            "" => (host, None),
            _ => {
                let port = rest.strip_prefix(':').ok_or_else(|| {
                    Error::Config(format!("unexpected text after ']' in {addr:?}"))
                })?;
                (host, Some(port))
            }
        }
    } else {
        match addr.rsplit_once(':') {
            // a bare IPv6 address has several colons and no port
            Some((host, _)) if host.contains(':') => (addr, None),
            Some((host, port)) => (host, Some(port)),
            None => (addr, None),
        }
    };

    if host.is_empty() {
        return Err(Error::Config(format!("missing host in {addr:?}")));
    }
    let port = port
        .map(|port| {
            port.parse::<u16>()
                .map_err(|_| Error::Config(format!("invalid port {port:?}")))
        })
        .transpose()?;
    Ok((host, port))
}

/// Builder for connection configuration.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    host: String,
    port: Option<u16>,
    security: Security,
    tls: Option<TlsPolicy>,
    local_addr: Option<IpAddr>,
    connect_timeout: Duration,
    local_name: String,
}

impl ConfigBuilder {
    /// Creates a new builder with the given hostname.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            security: Security::default(),
            tls: None,
            local_addr: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            local_name: DEFAULT_LOCAL_NAME.to_string(),
        }
    }

    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the security mode.
    #[must_use]
    pub const fn security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }

    /// Sets the certificate verification policy.
    ///
    /// Defaults to verifying against the configured host.
    #[must_use]
    pub fn tls(mut self, policy: TlsPolicy) -> Self {
        self.tls = Some(policy);
        self
    }

    /// Sets the local IP address to connect from.
    #[must_use]
    pub const fn local_addr(mut self, addr: IpAddr) -> Self {
        self.local_addr = Some(addr);
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the name announced in EHLO/HELO.
    #[must_use]
    pub fn local_name(mut self, name: impl Into<String>) -> Self {
        self.local_name = name.into();
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> Config {
        let tls = self
            .tls
            .unwrap_or_else(|| TlsPolicy::Verify(self.host.clone()));
        Config {
            port: self.port.unwrap_or_else(|| self.security.default_port()),
            host: self.host,
            security: self.security,
            tls,
            local_addr: self.local_addr,
            connect_timeout: self.connect_timeout,
            local_name: self.local_name,
        }
    }
}
