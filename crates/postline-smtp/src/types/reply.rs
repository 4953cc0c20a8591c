//! SMTP reply types.

use crate::error::{Error, Result};

/// Reply code a command is expected to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    /// Exactly this code, e.g. `354` after DATA.
    Code(ReplyCode),
    /// Any code starting with these two digits, e.g. `25` for `250`/`251`.
    Family(u16),
    /// Any code of this class, e.g. `2` for any `2xx`.
    Class(u16),
}

/// SMTP reply from server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Reply code (e.g., 250).
    pub code: ReplyCode,
    /// Reply message lines.
    pub message: Vec<String>,
}

impl Reply {
    /// Creates a new reply.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // Vec is not const-compatible
    pub fn new(code: ReplyCode, message: Vec<String>) -> Self {
        Self { code, message }
    }

    /// Returns the full message as a single string.
    #[must_use]
    pub fn message_text(&self) -> String {
        self.message.join("\n")
    }

    /// Checks the reply against `expect`, turning a mismatch into an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Reply`] if the code does not satisfy `expect`.
    pub fn expect(self, expect: Expect) -> Result<Self> {
        if self.code.matches(expect) {
            Ok(self)
        } else {
            Err(Error::reply(self.code, self.message_text()))
        }
    }
}

/// SMTP reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReplyCode(u16);

impl ReplyCode {
    /// Creates a new reply code.
    #[must_use]
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Returns the numeric code.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Returns true if this is a success code (2xx).
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 >= 200 && self.0 < 300
    }

    /// Returns true if this is a transient error (4xx).
    #[must_use]
    pub const fn is_transient(self) -> bool {
        self.0 >= 400 && self.0 < 500
    }

    /// Returns true if this is a permanent error (5xx).
    #[must_use]
    pub const fn is_permanent(self) -> bool {
        self.0 >= 500 && self.0 < 600
    }

    /// Returns true if this is an intermediate reply (3xx).
    #[must_use]
    pub const fn is_intermediate(self) -> bool {
        self.0 >= 300 && self.0 < 400
    }

    /// Returns true if this code satisfies `expect`.
    #[must_use]
    pub const fn matches(self, expect: Expect) -> bool {
        match expect {
            Expect::Code(code) => self.0 == code.0,
            Expect::Family(prefix) => self.0 / 10 == prefix,
            Expect::Class(class) => self.0 / 100 == class,
        }
    }
}

impl std::fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Common reply codes
impl ReplyCode {
    /// 220 Service ready
    pub const SERVICE_READY: Self = Self(220);
    /// 221 Service closing transmission channel
    pub const CLOSING: Self = Self(221);
    /// 250 Requested mail action okay, completed
    pub const OK: Self = Self(250);
    /// 251 User not local; will forward
    pub const FORWARD: Self = Self(251);
    /// 235 Authentication succeeded
    pub const AUTH_SUCCEEDED: Self = Self(235);
    /// 334 Continue with authentication
    pub const AUTH_CONTINUE: Self = Self(334);
    /// 354 Start mail input
    pub const START_DATA: Self = Self(354);
    /// 421 Service not available, closing transmission channel
    pub const SERVICE_UNAVAILABLE: Self = Self(421);
    /// 450 Mailbox unavailable (busy)
    pub const MAILBOX_BUSY: Self = Self(450);
    /// 451 Local error in processing
    pub const LOCAL_ERROR: Self = Self(451);
    /// 452 Insufficient system storage
    pub const INSUFFICIENT_STORAGE: Self = Self(452);
    /// 454 TLS not available due to temporary reason
    pub const TLS_UNAVAILABLE: Self = Self(454);
    /// 500 Syntax error, command unrecognized
    pub const SYNTAX_ERROR: Self = Self(500);
    /// 501 Syntax error in parameters or arguments
    pub const PARAMETER_ERROR: Self = Self(501);
    /// 502 Command not implemented
    pub const NOT_IMPLEMENTED: Self = Self(502);
    /// 503 Bad sequence of commands
    pub const BAD_SEQUENCE: Self = Self(503);
    /// 504 Command parameter not implemented
    pub const PARAMETER_NOT_IMPLEMENTED: Self = Self(504);
    /// 535 Authentication credentials invalid
    pub const AUTH_FAILED: Self = Self(535);
    /// 550 Mailbox unavailable (not found, access denied)
    pub const MAILBOX_UNAVAILABLE: Self = Self(550);
    /// 551 User not local
    pub const USER_NOT_LOCAL: Self = Self(551);
    /// 552 Exceeded storage allocation
    pub const EXCEEDED_STORAGE: Self = Self(552);
    /// 553 Mailbox name not allowed
    pub const MAILBOX_NAME_INVALID: Self = Self(553);
    /// 554 Transaction failed
    pub const TRANSACTION_FAILED: Self = Self(554);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn classes() {
        assert!(ReplyCode::CLOSING.is_success());
        assert!(ReplyCode::START_DATA.is_intermediate());
        assert!(ReplyCode::INSUFFICIENT_STORAGE.is_transient());
        assert!(ReplyCode::TLS_UNAVAILABLE.is_transient());
        assert!(ReplyCode::MAILBOX_UNAVAILABLE.is_permanent());
        assert!(!ReplyCode::OK.is_permanent());
    }

    #[test]
    fn expectations() {
        assert!(ReplyCode::START_DATA.matches(Expect::Code(ReplyCode::START_DATA)));
        assert!(!ReplyCode::OK.matches(Expect::Code(ReplyCode::START_DATA)));

        assert!(ReplyCode::FORWARD.matches(Expect::Family(25)));
        assert!(ReplyCode::new(252).matches(Expect::Family(25)));
        assert!(!ReplyCode::SERVICE_READY.matches(Expect::Family(25)));

        assert!(ReplyCode::CLOSING.matches(Expect::Class(2)));
        assert!(!ReplyCode::START_DATA.matches(Expect::Class(2)));
    }

    #[test]
    fn mismatch_keeps_code_and_text() {
        let reply = Reply::new(
            ReplyCode::INSUFFICIENT_STORAGE,
            vec!["4.5.3 Too many recipients".to_string()],
        );
        let err = reply.expect(Expect::Family(25)).unwrap_err();
        assert_eq!(err.reply_code(), Some(ReplyCode::INSUFFICIENT_STORAGE));
        assert_eq!(err.to_string(), "SMTP error 452: 4.5.3 Too many recipients");
    }

    #[test]
    fn multi_line_text() {
        let reply = Reply::new(
            ReplyCode::OK,
            vec!["mx.example.com".to_string(), "PIPELINING".to_string()],
        );
        assert_eq!(reply.message_text(), "mx.example.com\nPIPELINING");
        assert_eq!(reply.expect(Expect::Class(2)).unwrap().code, ReplyCode::OK);
    }
}
