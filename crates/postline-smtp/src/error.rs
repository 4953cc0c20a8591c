//! Error types for SMTP operations.

use std::fmt;
use std::io;

use crate::multi::MultiError;
use crate::types::ReplyCode;

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Protocol step an [`Error::Command`] failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// EHLO/HELO exchange.
    Hello,
    /// STARTTLS command or TLS handshake.
    StartTls,
    /// AUTH exchange.
    Auth,
    /// MAIL FROM.
    Mail,
    /// RCPT TO.
    Rcpt,
    /// DATA command.
    Data,
    /// Final acceptance of the message body.
    Message,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Hello => "EHLO command failed",
            Self::StartTls => "tls connection failed",
            Self::Auth => "authentication failed",
            Self::Mail => "MAIL command failed",
            Self::Rcpt => "RCPT command failed",
            Self::Data => "DATA command failed",
            Self::Message => "message rejected",
        })
    }
}

/// SMTP error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TLS error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Invalid DNS name for TLS verification.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// Server replied with an unexpected code.
    #[error("SMTP error {code}: {message}")]
    Reply {
        /// Reply code (e.g., 550).
        code: ReplyCode,
        /// Reply text from server.
        message: String,
    },

    /// A protocol step failed.
    #[error("{stage}: {source}")]
    Command {
        /// The step that failed.
        stage: Stage,
        /// Underlying failure.
        source: Box<Error>,
    },

    /// Per-recipient failures of one transaction.
    #[error("{0}")]
    Multi(MultiError),

    /// Authentication was requested but the server does not offer AUTH.
    #[error("authentication requested but not supported")]
    AuthNotSupported,

    /// The authentication mechanism refused to continue.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Protocol error (malformed or unexpected response).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Transaction started with an empty recipient list.
    #[error("no recipients given")]
    NoRecipients,

    /// Invalid state for operation.
    #[error("Invalid state for operation: {0}")]
    InvalidState(String),

    /// Invalid client configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Creates a reply error from a code and message.
    #[must_use]
    pub fn reply(code: ReplyCode, message: impl Into<String>) -> Self {
        Self::Reply {
            code,
            message: message.into(),
        }
    }

    /// Wraps this error with the protocol step that produced it.
    #[must_use]
    pub fn at(self, stage: Stage) -> Self {
        Self::Command {
            stage,
            source: Box::new(self),
        }
    }

    /// Returns the reply code carried by this error, looking through
    /// [`Error::Command`] wrappers.
    #[must_use]
    pub fn reply_code(&self) -> Option<ReplyCode> {
        match self {
            Self::Reply { code, .. } => Some(*code),
            Self::Command { source, .. } => source.reply_code(),
            _ => None,
        }
    }

    /// Returns the protocol step of a [`Error::Command`] failure.
    #[must_use]
    pub const fn stage(&self) -> Option<Stage> {
        match self {
            Self::Command { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Returns the per-recipient failures if this is a batch error.
    #[must_use]
    pub const fn as_multi(&self) -> Option<&MultiError> {
        match self {
            Self::Multi(multi) => Some(multi),
            _ => None,
        }
    }

    /// Returns true if this is a permanent error (5xx).
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        self.reply_code().is_some_and(ReplyCode::is_permanent)
    }

    /// Returns true if this is a transient error (4xx).
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.reply_code().is_some_and(ReplyCode::is_transient)
    }
}

/// Returns true if `err` carries a 5xx reply code.
///
/// Errors without a reply code (I/O, configuration, batches) are never
/// considered permanent.
#[must_use]
pub fn is_permanent(err: &Error) -> bool {
    err.is_permanent()
}

/// Returns true if `err` carries a 4xx reply code.
#[must_use]
pub fn is_transient(err: &Error) -> bool {
    err.is_transient()
}
