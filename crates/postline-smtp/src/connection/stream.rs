//! Transport streams: plain TCP, TLS, and the dial step.

#![allow(clippy::missing_errors_doc)]

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{TcpSocket, TcpStream};
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;

use super::config::{Config, TlsPolicy};
use crate::{Error, Result};

/// A stream that is either plaintext or TLS-encrypted.
#[derive(Debug)]
pub enum SmtpStream<S> {
    /// Plaintext stream.
    Plain(S),
    /// TLS-encrypted stream (boxed to reduce enum size).
    Tls(Box<TlsStream<S>>),
}

impl<S> SmtpStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Returns true if the stream is TLS-encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }

    /// Performs the client TLS handshake over a plaintext stream.
    ///
    /// `host` is used for SNI, and for certificate verification unless the
    /// policy disables it.
    pub async fn upgrade_to_tls(self, host: &str, policy: &TlsPolicy) -> Result<Self> {
        let Self::Plain(stream) = self else {
            return Err(Error::InvalidState("stream is already TLS".into()));
        };

        let (connector, server_name) = match policy {
            TlsPolicy::Verify(name) => (
                TlsConnector::from(Arc::new(verifying_config())),
                ServerName::try_from(name.clone())?,
            ),
            TlsPolicy::InsecureSkipVerify => (
                TlsConnector::from(Arc::new(insecure_config())),
                ServerName::try_from(host.to_string())
                    .unwrap_or_else(|_| ServerName::from(IpAddr::V4(Ipv4Addr::LOCALHOST))),
            ),
        };

        let tls = connector.connect(server_name, stream).await?;
        Ok(Self::Tls(Box::new(tls)))
    }
}

impl<S> AsyncRead for SmtpStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl<S> AsyncWrite for SmtpStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_flush(cx),
            Self::Tls(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Tls(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

/// Opens the TCP connection described by `config`.
///
/// Tries every resolved address in turn, binding to the configured local
/// address if any, and gives up after `config.connect_timeout`. With
/// implicit TLS the handshake happens before this returns.
pub async fn dial(config: &Config) -> Result<SmtpStream<TcpStream>> {
    let tcp = tokio::time::timeout(config.connect_timeout, connect_tcp(config))
        .await
        .map_err(|_| {
            Error::Io(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("connecting to {}:{} timed out", config.host, config.port),
            ))
        })??;

    let stream = SmtpStream::Plain(tcp);
    if config.security.is_implicit() {
        tracing::debug!(host = %config.host, "starting implicit TLS");
        stream.upgrade_to_tls(&config.host, &config.tls).await
    } else {
        Ok(stream)
    }
}

async fn connect_tcp(config: &Config) -> Result<TcpStream> {
    let mut last_err = None;
    for addr in tokio::net::lookup_host((config.host.as_str(), config.port)).await? {
        match connect_addr(addr, config.local_addr).await {
            Ok(stream) => {
                tracing::debug!(%addr, "connected");
                return Ok(stream);
            }
            Err(e) => {
                tracing::debug!(%addr, error = %e, "connect attempt failed");
                last_err = Some(e);
            }
        }
    }
    Err(last_err.map_or_else(
        || {
            Error::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no addresses found for {}", config.host),
            ))
        },
        Error::Io,
    ))
}

async fn connect_addr(addr: SocketAddr, local: Option<IpAddr>) -> io::Result<TcpStream> {
    let Some(local) = local else {
        return TcpStream::connect(addr).await;
    };
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.bind(SocketAddr::new(local, 0))?;
    socket.connect(addr).await
}

/// TLS configuration verifying against the bundled Mozilla roots.
fn verifying_config() -> ClientConfig {
    let root_store = RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth()
}

/// TLS configuration that accepts any server certificate.
fn insecure_config() -> ClientConfig {
    let provider = CryptoProvider::get_default()
        .cloned()
        .unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()));

    ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate(provider)))
        .with_no_client_auth()
}

/// Certificate verifier for [`TlsPolicy::InsecureSkipVerify`].
///
/// Handshake signatures are still checked; only the certificate chain and
/// name are not.
#[derive(Debug)]
struct AcceptAnyCertificate(Arc<CryptoProvider>);

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}
