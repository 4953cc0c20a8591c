//! One-shot delivery helper.

use crate::auth::Authenticator;
use crate::connection::{Client, Config};
use crate::session::negotiate_session;
use crate::types::Address;
use crate::Result;

/// Connects to the server in `config`, delivers `message` from `from` to
/// every address in `to`, and quits.
///
/// `message` is the complete RFC 5322 message; dot-stuffing is applied
/// while sending.
///
/// # Errors
///
/// Returns the first failure of the session. If only some recipients were
/// rejected the message is still delivered to the others and an
/// [`Error::Multi`](crate::Error::Multi) reports the rejected ones.
pub async fn send_mail(
    config: &Config,
    auth: Option<&mut dyn Authenticator>,
    from: &Address,
    to: &[Address],
    message: &[u8],
) -> Result<()> {
    let client = Client::connect(config).await?;
    let mut client = negotiate_session(client, &config.local_name, &config.tls, auth).await?;

    let outcome = client
        .begin_transaction(from, to)
        .await?
        .send(message)
        .await;

    if let Err(e) = client.quit().await {
        tracing::debug!(error = %e, "QUIT failed");
    }
    outcome
}
