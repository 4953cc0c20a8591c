//! EHLO extension keywords.

/// A service extension announced in the EHLO reply (RFC 5321 §4.1.1.1).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Extension {
    /// STARTTLS (RFC 3207)
    StartTls,
    /// AUTH (RFC 4954) with the advertised mechanisms we know about
    Auth(Vec<AuthMechanism>),
    /// SIZE (RFC 1870) with the optional fixed limit
    Size(Option<usize>),
    /// 8BITMIME (RFC 6152)
    EightBitMime,
    /// PIPELINING (RFC 2920)
    Pipelining,
    /// CHUNKING (RFC 3030)
    Chunking,
    /// SMTPUTF8 (RFC 6531)
    SmtpUtf8,
    /// DSN (RFC 3461)
    Dsn,
    /// BINARYMIME (RFC 3030)
    BinaryMime,
    /// Any other keyword, upper-cased, with its raw parameters
    Other {
        /// Extension keyword.
        keyword: String,
        /// Everything after the keyword.
        params: String,
    },
}

impl Extension {
    /// Parses one EHLO reply line (without the reply code).
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let (keyword, params) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(keyword, params)| (keyword, params.trim_start()));
        let keyword = keyword.to_ascii_uppercase();

        match keyword.as_str() {
            "STARTTLS" => Self::StartTls,
            "AUTH" => Self::Auth(
                params
                    .split_whitespace()
                    .filter_map(AuthMechanism::parse)
                    .collect(),
            ),
            "SIZE" => Self::Size(params.parse().ok().filter(|size| *size > 0)),
            "8BITMIME" => Self::EightBitMime,
            "PIPELINING" => Self::Pipelining,
            "CHUNKING" => Self::Chunking,
            "SMTPUTF8" => Self::SmtpUtf8,
            "DSN" => Self::Dsn,
            "BINARYMIME" => Self::BinaryMime,
            _ => Self::Other {
                keyword,
                params: params.to_string(),
            },
        }
    }

    /// Returns the EHLO keyword, e.g. `PIPELINING`.
    #[must_use]
    pub fn keyword(&self) -> &str {
        match self {
            Self::StartTls => "STARTTLS",
            Self::Auth(_) => "AUTH",
            Self::Size(_) => "SIZE",
            Self::EightBitMime => "8BITMIME",
            Self::Pipelining => "PIPELINING",
            Self::Chunking => "CHUNKING",
            Self::SmtpUtf8 => "SMTPUTF8",
            Self::Dsn => "DSN",
            Self::BinaryMime => "BINARYMIME",
            Self::Other { keyword, .. } => keyword,
        }
    }
}

/// SASL authentication mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthMechanism {
    /// PLAIN (RFC 4616)
    Plain,
    /// LOGIN (legacy)
    Login,
    /// CRAM-MD5 (RFC 2195)
    CramMd5,
    /// `XOAUTH2` (Google/Microsoft)
    XOAuth2,
    /// `OAUTHBEARER` (RFC 7628)
    OAuthBearer,
}

impl AuthMechanism {
    /// Parses a mechanism name, case-insensitively.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "PLAIN" => Some(Self::Plain),
            "LOGIN" => Some(Self::Login),
            "CRAM-MD5" => Some(Self::CramMd5),
            "XOAUTH2" => Some(Self::XOAuth2),
            "OAUTHBEARER" => Some(Self::OAuthBearer),
            _ => None,
        }
    }

    /// Returns the mechanism name as sent in `AUTH`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::Login => "LOGIN",
            Self::CramMd5 => "CRAM-MD5",
            Self::XOAuth2 => "XOAUTH2",
            Self::OAuthBearer => "OAUTHBEARER",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn keywords_are_case_insensitive() {
        assert_eq!(Extension::parse("starttls"), Extension::StartTls);
        assert_eq!(Extension::parse("Pipelining"), Extension::Pipelining);
        assert_eq!(Extension::parse("8bitmime"), Extension::EightBitMime);
    }

    #[test]
    fn auth_keeps_known_mechanisms() {
        assert_eq!(
            Extension::parse("AUTH PLAIN GSSAPI login"),
            Extension::Auth(vec![AuthMechanism::Plain, AuthMechanism::Login])
        );
        assert_eq!(Extension::parse("AUTH"), Extension::Auth(Vec::new()));
    }

    #[test]
    fn size_limit() {
        assert_eq!(
            Extension::parse("SIZE 35882577"),
            Extension::Size(Some(35_882_577))
        );
        assert_eq!(Extension::parse("SIZE"), Extension::Size(None));
        assert_eq!(Extension::parse("SIZE 0"), Extension::Size(None));
    }

    #[test]
    fn other_keeps_keyword_and_params() {
        let ext = Extension::parse("x-exps  GSSAPI NTLM");
        assert_eq!(
            ext,
            Extension::Other {
                keyword: "X-EXPS".to_string(),
                params: "GSSAPI NTLM".to_string(),
            }
        );
        assert_eq!(ext.keyword(), "X-EXPS");
    }

    #[test]
    fn keyword_of_known_extensions() {
        assert_eq!(Extension::parse("AUTH PLAIN").keyword(), "AUTH");
        assert_eq!(Extension::parse("SIZE 10").keyword(), "SIZE");
        assert_eq!(Extension::parse("dsn").keyword(), "DSN");
    }

    #[test]
    fn mechanism_names() {
        for mechanism in [
            AuthMechanism::Plain,
            AuthMechanism::Login,
            AuthMechanism::CramMd5,
            AuthMechanism::XOAuth2,
            AuthMechanism::OAuthBearer,
        ] {
            assert_eq!(AuthMechanism::parse(mechanism.as_str()), Some(mechanism));
        }
        assert_eq!(AuthMechanism::parse("cram-md5"), Some(AuthMechanism::CramMd5));
        assert_eq!(AuthMechanism::parse("NTLM"), None);
    }
}
