//! # postline-smtp
//!
//! An asynchronous SMTP client (RFC 5321) built for delivering one message
//! to many recipients, where some recipients may be rejected while the
//! others still get the mail.
//!
//! ## Features
//!
//! - **Transactions**: MAIL, RCPT and DATA with per-recipient error reporting
//! - **Pipelining**: RFC 2920 command batching when the server offers it
//! - **TLS**: STARTTLS and implicit TLS via rustls
//! - **Authentication**: PLAIN, LOGIN, XOAUTH2, OAUTHBEARER
//! - **Extensions**: 8BITMIME, SMTPUTF8, SIZE reporting
//!
//! ## Quick Start
//!
//! ```ignore
//! use postline_smtp::{Address, Client, Config, Plain, negotiate_session};
//!
//! #[tokio::main]
//! async fn main() -> postline_smtp::Result<()> {
//!     let config = Config::from_address("smtp.example.com:587")?;
//!     let client = Client::connect(&config).await?;
//!
//!     let mut auth = Plain::new("user@example.com", "password");
//!     let mut client =
//!         negotiate_session(client, "client.example.com", &config.tls, Some(&mut auth)).await?;
//!
//!     let from = Address::new("sender@example.com")?;
//!     let to = [
//!         Address::new("alice@example.org")?,
//!         Address::new("bob@example.net")?,
//!     ];
//!
//!     let tx = client.begin_transaction(&from, &to).await?;
//!     if let Some(rejected) = tx.recipient_errors() {
//!         eprintln!("{} recipients rejected", rejected.failed());
//!     }
//!     let result = tx.send(b"Subject: Test\r\n\r\nHello, World!\r\n").await;
//!
//!     client.quit().await?;
//!     result
//! }
//! ```
//!
//! ## Partial failure
//!
//! Recipient failures are collected in a [`MultiError`] with one slot per
//! recipient, in the order given. The transaction continues as long as at
//! least one recipient was accepted; the failures are reported once the
//! message has been sent, merged with the outcome of the message itself
//! (see [`merge_error`]). Use [`is_permanent`] to tell a 5xx rejection from
//! a failure worth retrying.
//!
//! ## Modules
//!
//! - [`auth`]: SASL mechanisms
//! - [`command`]: SMTP command encoding
//! - [`connection`]: Transport, configuration and the client
//! - [`parser`]: Reply parser
//! - [`types`]: Addresses, extensions and replies

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod auth;
mod body;
pub mod command;
pub mod connection;
mod error;
mod multi;
pub mod parser;
mod send;
mod session;
mod transaction;
pub mod types;

pub use auth::{Authenticator, Login, OAuthBearer, Plain, XOAuth2};
pub use body::BodyWriter;
pub use connection::{Client, Config, ConfigBuilder, Security, ServerInfo, TlsPolicy};
pub use error::{Error, Result, Stage, is_permanent, is_transient};
pub use multi::{MultiError, merge_error};
pub use send::send_mail;
pub use session::negotiate_session;
pub use transaction::Transaction;
pub use types::{Address, AuthMechanism, Extension, Reply, ReplyCode};
