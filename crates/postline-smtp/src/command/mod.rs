//! SMTP command builder.

use bytes::{BufMut, BytesMut};

use crate::types::Address;

/// SMTP command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// HELO - legacy greeting
    Helo {
        /// Client hostname
        hostname: String,
    },
    /// EHLO - extended greeting
    Ehlo {
        /// Client hostname
        hostname: String,
    },
    /// STARTTLS - upgrade to TLS
    StartTls,
    /// AUTH - begin SASL exchange
    Auth {
        /// Mechanism name
        mechanism: String,
        /// Base64 initial response (`=` for an empty one)
        initial_response: Option<String>,
    },
    /// Base64 line answering a `334` challenge, or `*` to cancel
    AuthResponse(String),
    /// MAIL FROM - start mail transaction
    MailFrom {
        /// Reverse path
        from: Address,
        /// Declare `BODY=8BITMIME` (RFC 6152)
        eight_bit_mime: bool,
        /// Request SMTPUTF8 handling
        smtputf8: bool,
    },
    /// RCPT TO - add recipient
    RcptTo {
        /// Forward path
        to: Address,
    },
    /// DATA - begin message body
    Data,
    /// RSET - abort transaction
    Rset,
    /// VRFY - verify address
    Vrfy {
        /// Address or name to verify
        address: String,
    },
    /// NOOP
    Noop,
    /// QUIT
    Quit,
}

impl Command {
    /// Returns the command verb, for logging.
    #[must_use]
    pub const fn verb(&self) -> &'static str {
        match self {
            Self::Helo { .. } => "HELO",
            Self::Ehlo { .. } => "EHLO",
            Self::StartTls => "STARTTLS",
            Self::Auth { .. } => "AUTH",
            Self::AuthResponse(_) => "AUTH-RESPONSE",
            Self::MailFrom { .. } => "MAIL",
            Self::RcptTo { .. } => "RCPT",
            Self::Data => "DATA",
            Self::Rset => "RSET",
            Self::Vrfy { .. } => "VRFY",
            Self::Noop => "NOOP",
            Self::Quit => "QUIT",
        }
    }

    /// Appends the CRLF-terminated command line to `buf`.
    pub fn encode(&self, buf: &mut BytesMut) {
        match self {
            Self::Helo { hostname } => {
                buf.put_slice(b"HELO ");
                buf.put_slice(hostname.as_bytes());
            }
            Self::Ehlo { hostname } => {
                buf.put_slice(b"EHLO ");
                buf.put_slice(hostname.as_bytes());
            }
            Self::StartTls => buf.put_slice(b"STARTTLS"),
            Self::Auth {
                mechanism,
                initial_response,
            } => {
                buf.put_slice(b"AUTH ");
                buf.put_slice(mechanism.as_bytes());
                if let Some(resp) = initial_response {
                    buf.put_u8(b' ');
                    buf.put_slice(resp.as_bytes());
                }
            }
            Self::AuthResponse(line) => buf.put_slice(line.as_bytes()),
            Self::MailFrom {
                from,
                eight_bit_mime,
                smtputf8,
            } => {
                buf.put_slice(b"MAIL FROM:<");
                buf.put_slice(from.as_str().as_bytes());
                buf.put_u8(b'>');
                if *eight_bit_mime {
                    buf.put_slice(b" BODY=8BITMIME");
                }
                if *smtputf8 {
                    buf.put_slice(b" SMTPUTF8");
                }
            }
            Self::RcptTo { to } => {
                buf.put_slice(b"RCPT TO:<");
                buf.put_slice(to.as_str().as_bytes());
                buf.put_u8(b'>');
            }
            Self::Data => buf.put_slice(b"DATA"),
            Self::Rset => buf.put_slice(b"RSET"),
            Self::Vrfy { address } => {
                buf.put_slice(b"VRFY ");
                buf.put_slice(address.as_bytes());
            }
            Self::Noop => buf.put_slice(b"NOOP"),
            Self::Quit => buf.put_slice(b"QUIT"),
        }
        buf.put_slice(b"\r\n");
    }

    /// Serializes the command to bytes.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);
        buf.to_vec()
    }
}
