//! Session setup: greeting, TLS upgrade and authentication.

use tokio::io::{AsyncRead, AsyncWrite};

use crate::auth::Authenticator;
use crate::connection::{Client, TlsPolicy};
use crate::error::Stage;
use crate::{Error, Result};

/// Prepares a freshly connected client for mail transactions.
///
/// Greets the server as `local_name`, upgrades to TLS with `tls` whenever the
/// server offers STARTTLS on a plaintext connection, and authenticates with
/// `auth` if given. The client is consumed because the TLS upgrade replaces
/// the underlying stream.
///
/// # Errors
///
/// - A [`Stage::Hello`] error if the greeting fails.
/// - A [`Stage::StartTls`] error if the upgrade fails, including a `454`
///   refusal. The session is not continued in plaintext.
/// - [`Error::AuthNotSupported`] if `auth` is given but the server does not
///   offer AUTH.
/// - A [`Stage::Auth`] error if authentication fails.
pub async fn negotiate_session<S>(
    mut client: Client<S>,
    local_name: &str,
    tls: &TlsPolicy,
    auth: Option<&mut dyn Authenticator>,
) -> Result<Client<S>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    client
        .hello(local_name)
        .await
        .map_err(|e| e.at(Stage::Hello))?;

    if client.has_extension("STARTTLS") && !client.is_tls() {
        client = client
            .starttls(tls)
            .await
            .map_err(|e| e.at(Stage::StartTls))?;
    }

    if let Some(auth) = auth {
        if !client.has_extension("AUTH") {
            return Err(Error::AuthNotSupported);
        }
        client.auth(auth).await.map_err(|e| e.at(Stage::Auth))?;
        tracing::debug!("authenticated");
    }

    Ok(client)
}
