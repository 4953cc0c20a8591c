//! Envelope address type.

use std::fmt;

use crate::error::{Error, Result};

/// Mailbox address used in `MAIL FROM` and `RCPT TO`.
///
/// Holds the bare address without angle brackets. The empty address is the
/// null reverse-path (`MAIL FROM:<>`) used for bounces.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address(String);

impl Address {
    /// Creates a new address from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is not of the form `local@domain` or
    /// contains characters that would break the command line.
    pub fn new(addr: impl Into<String>) -> Result<Self> {
        let addr = addr.into();
        Self::validate(&addr)?;
        Ok(Self(addr))
    }

    /// The null reverse-path `<>`.
    #[must_use]
    pub const fn null() -> Self {
        Self(String::new())
    }

    /// Returns true for the null reverse-path.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the address needs SMTPUTF8 (RFC 6531).
    #[must_use]
    pub fn requires_smtputf8(&self) -> bool {
        !self.0.is_ascii()
    }

    fn validate(addr: &str) -> Result<()> {
        if addr.contains(['\r', '\n', '<', '>']) || addr.chars().any(char::is_whitespace) {
            return Err(Error::InvalidAddress(format!(
                "{addr:?} contains forbidden characters"
            )));
        }

        match addr.rsplit_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
            _ => Err(Error::InvalidAddress(format!(
                "{addr:?} is not of the form local@domain"
            ))),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.0)
    }
}

impl std::str::FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}
