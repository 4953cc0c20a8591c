//! SMTP client connection.
//!
//! [`Client`] owns one session with one server. It keeps the extension set
//! from the last EHLO reply and offers the individual commands; the
//! multi-step flows live in [`crate::session`] and [`crate::transaction`].

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use super::config::{Config, DEFAULT_LOCAL_NAME, TlsPolicy};
use super::framed::FramedStream;
use super::stream::{SmtpStream, dial};
use super::ServerInfo;
use crate::auth::Authenticator;
use crate::body::BodyWriter;
use crate::command::Command;
use crate::types::{Address, Expect, Extension, Reply, ReplyCode};
use crate::{Error, Result};

/// SMTP client connection.
pub struct Client<S> {
    pub(crate) framed: FramedStream<SmtpStream<S>>,
    server_info: ServerInfo,
    local_name: String,
    did_hello: bool,
}

// Manual Debug implementation since FramedStream doesn't implement Debug
impl<S> fmt::Debug for Client<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("server_info", &self.server_info)
            .field("local_name", &self.local_name)
            .field("did_hello", &self.did_hello)
            .finish_non_exhaustive()
    }
}

impl Client<TcpStream> {
    /// Dials the server described by `config` and reads its greeting.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails or the server does not
    /// greet with `220`.
    pub async fn connect(config: &Config) -> Result<Self> {
        let stream = dial(config).await?;
        Self::from_stream(stream, config.host.clone()).await
    }
}

impl<S> Client<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps an established plaintext stream and reads the greeting.
    ///
    /// `host` is the name of the server, used by authentication mechanisms
    /// to decide whether the connection is local.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the greeting fails or it is not `220`.
    pub async fn new(stream: S, host: impl Into<String>) -> Result<Self> {
        Self::from_stream(SmtpStream::Plain(stream), host).await
    }

    /// Wraps an established stream and reads the greeting.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the greeting fails or it is not `220`.
    pub async fn from_stream(stream: SmtpStream<S>, host: impl Into<String>) -> Result<Self> {
        let tls = stream.is_tls();
        let mut framed = FramedStream::new(stream);
        let greeting = framed
            .read_response(Expect::Code(ReplyCode::SERVICE_READY))
            .await?;

        let greeting = greeting
            .message
            .first()
            .and_then(|msg| msg.split_whitespace().next())
            .unwrap_or_default()
            .to_string();
        tracing::debug!(%greeting, tls, "connected to SMTP server");

        Ok(Self {
            framed,
            server_info: ServerInfo {
                host: host.into(),
                greeting,
                tls,
                extensions: Default::default(),
            },
            local_name: DEFAULT_LOCAL_NAME.to_string(),
            did_hello: false,
        })
    }

    /// Returns the server information.
    #[must_use]
    pub const fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    /// Checks if the server advertised an extension in its EHLO reply.
    #[must_use]
    pub fn has_extension(&self, keyword: &str) -> bool {
        self.server_info.has_extension(keyword)
    }

    /// Returns true if the connection is TLS-encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        self.server_info.tls
    }

    /// Greets the server with EHLO, falling back to HELO if the server does
    /// not understand EHLO (`500` or `502`).
    ///
    /// May only be called once, before any other command.
    ///
    /// # Errors
    ///
    /// Returns an error if `local_name` is invalid, the greeting was already
    /// sent, or the server rejects it.
    pub async fn hello(&mut self, local_name: &str) -> Result<()> {
        if self.did_hello {
            return Err(Error::InvalidState("hello already sent".into()));
        }
        if local_name.is_empty() || local_name.contains(['\r', '\n', ' ']) {
            return Err(Error::Config(format!("invalid local name {local_name:?}")));
        }
        self.local_name = local_name.to_string();
        self.did_hello = true;

        match self.ehlo().await {
            Err(Error::Reply { code, .. })
                if code == ReplyCode::SYNTAX_ERROR || code == ReplyCode::NOT_IMPLEMENTED =>
            {
                tracing::debug!(%code, "EHLO not supported, falling back to HELO");
                self.helo().await
            }
            result => result,
        }
    }

    /// Sends `EHLO localhost` unless a greeting was already sent.
    pub(crate) async fn ensure_hello(&mut self) -> Result<()> {
        if self.did_hello {
            return Ok(());
        }
        self.hello(DEFAULT_LOCAL_NAME).await
    }

    async fn ehlo(&mut self) -> Result<()> {
        let cmd = Command::Ehlo {
            hostname: self.local_name.clone(),
        };
        let reply = self.framed.command(&cmd, Expect::Code(ReplyCode::OK)).await?;

        // the first line is the server's greeting, extensions follow
        self.server_info.extensions = reply
            .message
            .iter()
            .skip(1)
            .map(|line| Extension::parse(line))
            .collect();
        tracing::debug!(extensions = ?self.server_info.extensions, "EHLO accepted");
        Ok(())
    }

    async fn helo(&mut self) -> Result<()> {
        let cmd = Command::Helo {
            hostname: self.local_name.clone(),
        };
        self.framed.command(&cmd, Expect::Code(ReplyCode::OK)).await?;
        self.server_info.extensions.clear();
        Ok(())
    }

    /// Upgrades the connection to TLS using STARTTLS, then greets the server
    /// again as RFC 3207 requires.
    ///
    /// # Errors
    ///
    /// Returns an error if the server refuses STARTTLS (e.g. `454`), the
    /// handshake fails, or the second EHLO fails. The connection is unusable
    /// afterwards.
    pub async fn starttls(mut self, policy: &TlsPolicy) -> Result<Self> {
        self.ensure_hello().await?;
        self.framed
            .command(&Command::StartTls, Expect::Code(ReplyCode::SERVICE_READY))
            .await?;

        let Self {
            framed,
            mut server_info,
            local_name,
            did_hello,
        } = self;
        let stream = framed
            .into_inner()
            .upgrade_to_tls(&server_info.host, policy)
            .await?;
        tracing::debug!(host = %server_info.host, "TLS established");
        server_info.tls = true;

        let mut client = Self {
            framed: FramedStream::new(stream),
            server_info,
            local_name,
            did_hello,
        };
        client.ehlo().await?;
        Ok(client)
    }

    /// Runs an AUTH exchange driven by `auth`.
    ///
    /// A mechanism failure in the middle of the exchange cancels it with
    /// `*` before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the mechanism fails or the server rejects the
    /// credentials.
    pub async fn auth(&mut self, auth: &mut dyn Authenticator) -> Result<()> {
        self.ensure_hello().await?;

        let mechanism = auth.mechanism().to_string();
        if !self
            .server_info
            .auth_mechanisms()
            .iter()
            .any(|m| m.as_str() == mechanism)
        {
            tracing::debug!(%mechanism, "mechanism not advertised, trying anyway");
        }
        let initial_response = auth
            .initial_response(&self.server_info)?
            .map(|resp| encode_sasl(&resp));
        tracing::debug!(%mechanism, "authenticating");

        let cmd = Command::Auth {
            mechanism,
            initial_response,
        };
        self.framed.write_command(&cmd).await?;

        loop {
            let reply = self.framed.read_reply().await?;
            match reply.code {
                ReplyCode::AUTH_SUCCEEDED => return Ok(()),
                ReplyCode::AUTH_CONTINUE => {
                    let response = STANDARD
                        .decode(reply.message_text().trim())
                        .map_err(|e| Error::Protocol(format!("invalid AUTH challenge: {e}")))
                        .and_then(|challenge| auth.respond(&challenge));
                    match response {
                        Ok(response) => {
                            let line = Command::AuthResponse(STANDARD.encode(response));
                            self.framed.write_command(&line).await?;
                        }
                        Err(e) => {
                            self.cancel_auth().await;
                            return Err(e);
                        }
                    }
                }
                code => return Err(Error::reply(code, reply.message_text())),
            }
        }
    }

    async fn cancel_auth(&mut self) {
        let cancel = Command::AuthResponse("*".to_string());
        match self.framed.command(&cancel, Expect::Code(ReplyCode::PARAMETER_ERROR)).await {
            Ok(_) => tracing::debug!("AUTH exchange cancelled"),
            Err(e) => tracing::warn!(error = %e, "cancelling AUTH exchange failed"),
        }
    }

    /// Builds the MAIL command for a transaction, adding `BODY=8BITMIME`
    /// and `SMTPUTF8` when the server supports them.
    pub(crate) fn mail_command(&self, from: &Address, to: &[Address]) -> Command {
        let eight_bit_mime = self.has_extension("8BITMIME");
        let smtputf8 = self.has_extension("SMTPUTF8")
            && (from.requires_smtputf8() || to.iter().any(Address::requires_smtputf8));
        Command::MailFrom {
            from: from.clone(),
            eight_bit_mime,
            smtputf8,
        }
    }

    /// Sends MAIL FROM.
    ///
    /// # Errors
    ///
    /// Returns an error if the server does not reply `250`.
    pub async fn mail(&mut self, from: &Address) -> Result<()> {
        self.ensure_hello().await?;
        let cmd = self.mail_command(from, &[]);
        self.framed.command(&cmd, Expect::Code(ReplyCode::OK)).await?;
        Ok(())
    }

    /// Sends RCPT TO.
    ///
    /// # Errors
    ///
    /// Returns an error if the server does not reply `25x`.
    pub async fn rcpt(&mut self, to: &Address) -> Result<()> {
        let cmd = Command::RcptTo { to: to.clone() };
        self.framed.command(&cmd, Expect::Family(25)).await?;
        Ok(())
    }

    /// Sends DATA and returns the writer for the message body.
    ///
    /// # Errors
    ///
    /// Returns an error if the server does not reply `354`.
    pub async fn data(&mut self) -> Result<BodyWriter<'_, S>> {
        self.framed
            .command(&Command::Data, Expect::Code(ReplyCode::START_DATA))
            .await?;
        Ok(BodyWriter::new(&mut self.framed))
    }

    /// Aborts the current transaction with RSET.
    ///
    /// # Errors
    ///
    /// Returns an error if the server does not reply `250`.
    pub async fn reset(&mut self) -> Result<()> {
        self.ensure_hello().await?;
        self.framed
            .command(&Command::Rset, Expect::Code(ReplyCode::OK))
            .await?;
        Ok(())
    }

    /// Sends NOOP, e.g. to check that the connection is alive.
    ///
    /// # Errors
    ///
    /// Returns an error if the server does not reply `250`.
    pub async fn noop(&mut self) -> Result<()> {
        self.ensure_hello().await?;
        self.framed
            .command(&Command::Noop, Expect::Code(ReplyCode::OK))
            .await?;
        Ok(())
    }

    /// Asks the server to verify an address with VRFY.
    ///
    /// # Errors
    ///
    /// Returns an error if `address` contains line breaks or the server
    /// does not reply `25x`.
    pub async fn verify(&mut self, address: &str) -> Result<Reply> {
        if address.contains(['\r', '\n']) {
            return Err(Error::InvalidAddress(format!("{address:?} contains a line break")));
        }
        self.ensure_hello().await?;
        let cmd = Command::Vrfy {
            address: address.to_string(),
        };
        self.framed.command(&cmd, Expect::Family(25)).await
    }

    /// Sends QUIT and closes the connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the QUIT command fails.
    pub async fn quit(mut self) -> Result<()> {
        self.framed
            .command(&Command::Quit, Expect::Code(ReplyCode::CLOSING))
            .await?;
        tracing::debug!(host = %self.server_info.host, "session closed");
        Ok(())
    }
}

/// Base64 for AUTH lines, with `=` standing for an empty response
/// (RFC 4954 §4).
fn encode_sasl(data: &[u8]) -> String {
    if data.is_empty() {
        "=".to_string()
    } else {
        STANDARD.encode(data)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::auth::{Login, Plain};
    use tokio_test::io::Builder;

    const GREETING: &[u8] = b"220 mx.example.com ESMTP ready\r\n";

    #[test]
    fn sasl_encoding() {
        assert_eq!(encode_sasl(b""), "=");
        assert_eq!(encode_sasl(b"\0u\0p"), "AHUAcA==");
    }

    #[tokio::test]
    async fn greeting_sets_server_name() {
        let mock = Builder::new().read(GREETING).build();
        let client = Client::new(mock, "mx.example.com").await.unwrap();
        assert_eq!(client.server_info().greeting, "mx.example.com");
        assert!(!client.is_tls());
    }

    #[tokio::test]
    async fn rejected_greeting() {
        let mock = Builder::new().read(b"554 go away\r\n").build();
        let err = Client::new(mock, "mx.example.com").await.unwrap_err();
        assert_eq!(err.reply_code(), Some(ReplyCode::TRANSACTION_FAILED));
    }

    #[tokio::test]
    async fn ehlo_collects_extensions() {
        let mock = Builder::new()
            .read(GREETING)
            .write(b"EHLO client.example.org\r\n")
            .read(b"250-mx.example.com\r\n250-PIPELINING\r\n250 AUTH PLAIN\r\n")
            .build();
        let mut client = Client::new(mock, "mx.example.com").await.unwrap();
        client.hello("client.example.org").await.unwrap();
        assert!(client.has_extension("PIPELINING"));
        assert!(client.has_extension("AUTH"));
        assert!(!client.has_extension("mx.example.com"));
    }

    #[tokio::test]
    async fn helo_fallback_on_502() {
        let mock = Builder::new()
            .read(GREETING)
            .write(b"EHLO client\r\n")
            .read(b"502 command not implemented\r\n")
            .write(b"HELO client\r\n")
            .read(b"250 mx.example.com\r\n")
            .build();
        let mut client = Client::new(mock, "mx.example.com").await.unwrap();
        client.hello("client").await.unwrap();
        assert!(client.server_info().extensions.is_empty());
    }

    #[tokio::test]
    async fn no_helo_fallback_on_other_errors() {
        let mock = Builder::new()
            .read(GREETING)
            .write(b"EHLO client\r\n")
            .read(b"421 shutting down\r\n")
            .build();
        let mut client = Client::new(mock, "mx.example.com").await.unwrap();
        let err = client.hello("client").await.unwrap_err();
        assert_eq!(err.reply_code(), Some(ReplyCode::SERVICE_UNAVAILABLE));
    }

    #[tokio::test]
    async fn hello_only_once() {
        let mock = Builder::new()
            .read(GREETING)
            .write(b"EHLO client\r\n")
            .read(b"250 mx.example.com\r\n")
            .build();
        let mut client = Client::new(mock, "mx.example.com").await.unwrap();
        client.hello("client").await.unwrap();
        assert!(matches!(
            client.hello("client").await,
            Err(Error::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn rejects_injected_local_name() {
        let mock = Builder::new().read(GREETING).build();
        let mut client = Client::new(mock, "mx.example.com").await.unwrap();
        assert!(matches!(
            client.hello("evil\r\nRCPT TO:<x@y>").await,
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn mail_sends_implicit_hello() {
        let mock = Builder::new()
            .read(GREETING)
            .write(b"EHLO localhost\r\n")
            .read(b"250-mx.example.com\r\n250 8BITMIME\r\n")
            .write(b"MAIL FROM:<a@example.org> BODY=8BITMIME\r\n")
            .read(b"250 OK\r\n")
            .build();
        let mut client = Client::new(mock, "mx.example.com").await.unwrap();
        client
            .mail(&Address::new("a@example.org").unwrap())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn starttls_refused() {
        let mock = Builder::new()
            .read(GREETING)
            .write(b"EHLO client\r\n")
            .read(b"250-mx.example.com\r\n250 STARTTLS\r\n")
            .write(b"STARTTLS\r\n")
            .read(b"454 TLS not available due to temporary reason\r\n")
            .build();
        let mut client = Client::new(mock, "mx.example.com").await.unwrap();
        client.hello("client").await.unwrap();
        let err = client
            .starttls(&TlsPolicy::verify("mx.example.com"))
            .await
            .unwrap_err();
        assert_eq!(err.reply_code(), Some(ReplyCode::TLS_UNAVAILABLE));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn auth_plain_with_initial_response() {
        let mock = Builder::new()
            .read(GREETING)
            .write(b"EHLO client\r\n")
            .read(b"250-localhost\r\n250 AUTH PLAIN\r\n")
            .write(b"AUTH PLAIN AHVzZXIAcGFzcw==\r\n")
            .read(b"235 2.7.0 Authentication successful\r\n")
            .build();
        let mut client = Client::new(mock, "localhost").await.unwrap();
        client.hello("client").await.unwrap();
        client.auth(&mut Plain::new("user", "pass")).await.unwrap();
    }

    #[tokio::test]
    async fn auth_login_challenges() {
        let mock = Builder::new()
            .read(GREETING)
            .write(b"EHLO client\r\n")
            .read(b"250-localhost\r\n250 AUTH LOGIN\r\n")
            .write(b"AUTH LOGIN\r\n")
            .read(b"334 VXNlcm5hbWU6\r\n")
            .write(b"dXNlcg==\r\n")
            .read(b"334 UGFzc3dvcmQ6\r\n")
            .write(b"cGFzcw==\r\n")
            .read(b"235 ok\r\n")
            .build();
        let mut client = Client::new(mock, "localhost").await.unwrap();
        client.hello("client").await.unwrap();
        client.auth(&mut Login::new("user", "pass")).await.unwrap();
    }

    #[tokio::test]
    async fn auth_rejected() {
        let mock = Builder::new()
            .read(GREETING)
            .write(b"EHLO client\r\n")
            .read(b"250-localhost\r\n250 AUTH PLAIN\r\n")
            .write(b"AUTH PLAIN AHVzZXIAd3Jvbmc=\r\n")
            .read(b"535 5.7.8 Authentication credentials invalid\r\n")
            .build();
        let mut client = Client::new(mock, "localhost").await.unwrap();
        client.hello("client").await.unwrap();
        let err = client
            .auth(&mut Plain::new("user", "wrong"))
            .await
            .unwrap_err();
        assert_eq!(err.reply_code(), Some(ReplyCode::AUTH_FAILED));
    }

    #[tokio::test]
    async fn bad_challenge_cancels_exchange() {
        let mock = Builder::new()
            .read(GREETING)
            .write(b"EHLO client\r\n")
            .read(b"250-localhost\r\n250 AUTH LOGIN\r\n")
            .write(b"AUTH LOGIN\r\n")
            .read(b"334 !!!not base64!!!\r\n")
            .write(b"*\r\n")
            .read(b"501 5.7.0 Authentication aborted\r\n")
            .build();
        let mut client = Client::new(mock, "localhost").await.unwrap();
        client.hello("client").await.unwrap();
        let err = client
            .auth(&mut Login::new("user", "pass"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[tokio::test]
    async fn quit_expects_221() {
        let mock = Builder::new()
            .read(GREETING)
            .write(b"QUIT\r\n")
            .read(b"221 bye\r\n")
            .build();
        let client = Client::new(mock, "mx.example.com").await.unwrap();
        client.quit().await.unwrap();
    }

    #[tokio::test]
    async fn verify_and_reset() {
        let mock = Builder::new()
            .read(GREETING)
            .write(b"EHLO localhost\r\n")
            .read(b"250 mx.example.com\r\n")
            .write(b"VRFY postmaster\r\n")
            .read(b"252 cannot verify, will attempt delivery\r\n")
            .write(b"RSET\r\n")
            .read(b"250 OK\r\n")
            .write(b"NOOP\r\n")
            .read(b"250 OK\r\n")
            .build();
        let mut client = Client::new(mock, "mx.example.com").await.unwrap();
        let reply = client.verify("postmaster").await.unwrap();
        assert_eq!(reply.code.as_u16(), 252);
        client.reset().await.unwrap();
        client.noop().await.unwrap();
    }
}
