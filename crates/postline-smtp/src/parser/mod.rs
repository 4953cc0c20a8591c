//! SMTP reply parser.

use crate::error::{Error, Result};
use crate::types::{Reply, ReplyCode};

/// Parses an SMTP reply from its lines (CRLF already stripped).
///
/// Replies are single-line (`250 OK`) or multi-line, where every line but
/// the last uses `-` after the code:
///
/// ```text
/// 250-mx.example.com greets you
/// 250-PIPELINING
/// 250 8BITMIME
/// ```
///
/// All lines of one reply must carry the same code.
///
/// # Errors
///
/// Returns [`Error::Protocol`] if the reply is malformed.
pub fn parse_reply(lines: &[String]) -> Result<Reply> {
    let Some(first) = lines.first() else {
        return Err(Error::Protocol("empty reply".into()));
    };
    let code = parse_code(first)?;

    let mut message = Vec::with_capacity(lines.len());
    for line in lines {
        if parse_code(line)? != code {
            return Err(Error::Protocol(format!(
                "reply code changed within multi-line reply: {line:?}"
            )));
        }
        match line.as_bytes().get(3) {
            None => message.push(String::new()),
            Some(b' ' | b'-') => message.push(line[4..].to_string()),
            Some(_) => {
                return Err(Error::Protocol(format!("malformed reply line: {line:?}")));
            }
        }
    }

    Ok(Reply::new(code, message))
}

/// Checks if a line is the last line of a reply.
///
/// A bare code (`250`) is treated as final, like `250 `.
#[must_use]
pub fn is_last_reply_line(line: &str) -> bool {
    line.as_bytes().get(3) != Some(&b'-')
}

fn parse_code(line: &str) -> Result<ReplyCode> {
    let digits = line
        .get(..3)
        .filter(|code| code.bytes().all(|b| b.is_ascii_digit()))
        .ok_or_else(|| Error::Protocol(format!("invalid reply code: {line:?}")))?;
    let code: u16 = digits
        .parse()
        .map_err(|_| Error::Protocol(format!("invalid reply code: {line:?}")))?;
    if !(200..600).contains(&code) {
        return Err(Error::Protocol(format!("reply code out of range: {code}")));
    }
    Ok(ReplyCode::new(code))
}
