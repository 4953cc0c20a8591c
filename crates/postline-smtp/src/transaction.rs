//! Mail transactions: MAIL, RCPT and DATA, lockstep or pipelined.
//!
//! A transaction can partially fail. As long as MAIL and at least one RCPT
//! succeed, the body is sent and the per-recipient failures are reported
//! next to the outcome of the message itself.

use tokio::io::{AsyncRead, AsyncWrite};

use crate::body::BodyWriter;
use crate::command::Command;
use crate::connection::Client;
use crate::error::Stage;
use crate::multi::{MultiError, combine, merge_error};
use crate::types::{Address, Expect, ReplyCode};
use crate::{Error, Result};

/// A transaction whose DATA command was accepted.
///
/// Write the body, then call [`finish`](Self::finish). Recipients that were
/// rejected while setting up the transaction are kept as a deferred error.
pub struct Transaction<'a, S> {
    body: BodyWriter<'a, S>,
    deferred: Option<Error>,
}

impl<S> std::fmt::Debug for Transaction<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("deferred", &self.deferred)
            .finish_non_exhaustive()
    }
}

impl<'a, S> Transaction<'a, S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Returns the error recorded before the body was sent, if any.
    #[must_use]
    pub const fn deferred_error(&self) -> Option<&Error> {
        self.deferred.as_ref()
    }

    /// Returns the per-recipient failures, one slot per recipient.
    #[must_use]
    pub fn recipient_errors(&self) -> Option<&MultiError> {
        self.deferred.as_ref().and_then(Error::as_multi)
    }

    /// Writes a chunk of the message body.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if sending fails.
    pub async fn write(&mut self, data: &[u8]) -> Result<()> {
        self.body.write(data).await
    }

    /// Ends the body and returns the combined outcome.
    ///
    /// A clean result means every recipient accepted the message. If some
    /// recipients were rejected the [`MultiError`] is returned, with the
    /// body's own failure filled into the remaining slots.
    ///
    /// # Errors
    ///
    /// See above.
    pub async fn finish(self) -> Result<()> {
        let closed = self.body.close().await.err();
        merge_error(self.deferred, closed).map_or(Ok(()), Err)
    }

    /// Writes the whole message and finishes the transaction.
    ///
    /// # Errors
    ///
    /// Same as [`finish`](Self::finish); a write failure takes the place of
    /// the body's outcome.
    pub async fn send(mut self, message: &[u8]) -> Result<()> {
        if let Err(e) = self.body.write(message).await {
            return Err(combine(self.deferred, e));
        }
        self.finish().await
    }

    /// Splits into the body writer and the deferred error, for callers that
    /// combine the results themselves with [`merge_error`].
    #[must_use]
    pub fn into_parts(self) -> (BodyWriter<'a, S>, Option<Error>) {
        (self.body, self.deferred)
    }
}

/// Errors that leave the session usable are reply errors; anything else
/// (I/O, malformed replies) ends a lockstep transaction on the spot.
fn recoverable(err: Error) -> Result<Error> {
    if err.reply_code().is_some() {
        Ok(err)
    } else {
        Err(err)
    }
}

impl<S> Client<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Starts a transaction from `from` to every address in `to`.
    ///
    /// Uses RFC 2920 pipelining when the server advertises it, sending MAIL,
    /// every RCPT and DATA in a single write.
    ///
    /// # Errors
    ///
    /// - [`Error::NoRecipients`] if `to` is empty.
    /// - The MAIL failure if the sender was rejected.
    /// - The recipient failure if every recipient was rejected: the single
    ///   error for one recipient, an [`Error::Multi`] otherwise.
    /// - The DATA failure, merged with any recipient failures.
    pub async fn begin_transaction(
        &mut self,
        from: &Address,
        to: &[Address],
    ) -> Result<Transaction<'_, S>> {
        if to.is_empty() {
            return Err(Error::NoRecipients);
        }
        self.ensure_hello().await?;

        if self.has_extension("PIPELINING") {
            tracing::debug!(recipients = to.len(), "starting pipelined transaction");
            self.pipelined(from, to).await
        } else {
            tracing::debug!(recipients = to.len(), "starting transaction");
            self.lockstep(from, to).await
        }
    }

    async fn lockstep(&mut self, from: &Address, to: &[Address]) -> Result<Transaction<'_, S>> {
        let mail = self.mail_command(from, to);
        self.framed
            .command(&mail, Expect::Code(ReplyCode::OK))
            .await
            .map_err(|e| e.at(Stage::Mail))?;

        let mut rcpt_errors = MultiError::new(to.len());
        for (i, addr) in to.iter().enumerate() {
            if let Err(e) = self.rcpt(addr).await {
                let e = recoverable(e)?;
                tracing::debug!(recipient = %addr, error = %e, "recipient rejected");
                rcpt_errors.set(i, e.at(Stage::Rcpt));
            }
        }

        if rcpt_errors.all_failed() {
            return Err(rcpt_errors.into_failure());
        }

        if let Err(e) = self
            .framed
            .command(&Command::Data, Expect::Code(ReplyCode::START_DATA))
            .await
        {
            return Err(rcpt_errors.absorb(e.at(Stage::Data)));
        }

        Ok(Transaction {
            body: BodyWriter::new(&mut self.framed),
            deferred: rcpt_errors.merge(None),
        })
    }

    async fn pipelined(&mut self, from: &Address, to: &[Address]) -> Result<Transaction<'_, S>> {
        let mail = self.mail_command(from, to);
        self.framed.queue_command(&mail);
        for addr in to {
            self.framed.queue_command(&Command::RcptTo { to: addr.clone() });
        }
        self.framed.queue_command(&Command::Data);
        self.framed.flush().await?;

        // Every reply of the batch is read, even after a failure, so each
        // command keeps its own verdict. Once the connection is gone the
        // remaining reads fail with the same I/O error.
        let mail_err = self
            .framed
            .read_response(Expect::Code(ReplyCode::OK))
            .await
            .err()
            .map(|e| e.at(Stage::Mail));

        let mut rcpt_errors = MultiError::new(to.len());
        for (i, addr) in to.iter().enumerate() {
            if let Err(e) = self.framed.read_response(Expect::Family(25)).await {
                tracing::debug!(recipient = %addr, error = %e, "recipient rejected");
                rcpt_errors.set(i, e.at(Stage::Rcpt));
            }
        }

        let data_err = self
            .framed
            .read_response(Expect::Code(ReplyCode::START_DATA))
            .await
            .err()
            .map(|e| e.at(Stage::Data));

        if let Some(mail_err) = mail_err {
            if data_err.is_none() {
                self.abandon_data().await;
            }
            return Err(mail_err);
        }

        if rcpt_errors.all_failed() {
            // RFC 2920 §3.1: DATA may still have been accepted, and an empty
            // body is how the client gets out of it.
            if data_err.is_none() {
                self.abandon_data().await;
            }
            return Err(rcpt_errors.into_failure());
        }

        if let Some(data_err) = data_err {
            return Err(rcpt_errors.absorb(data_err));
        }

        Ok(Transaction {
            body: BodyWriter::new(&mut self.framed),
            deferred: rcpt_errors.merge(None),
        })
    }

    /// Sends an empty body after an unwanted `354` and discards the reply.
    async fn abandon_data(&mut self) {
        match BodyWriter::new(&mut self.framed).close().await {
            Ok(()) => tracing::debug!("empty message sent to leave DATA"),
            Err(e @ Error::Command { .. }) => {
                tracing::debug!(error = %e, "empty message rejected");
            }
            Err(e) => tracing::warn!(error = %e, "leaving DATA failed, session out of sync"),
        }
    }
}
