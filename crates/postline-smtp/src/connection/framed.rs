//! Framed I/O for the SMTP text protocol.
//!
//! Reads CRLF-terminated reply lines and assembles them into [`Reply`]
//! values. Writes go through a buffer that is only sent on [`flush`], so a
//! batch of pipelined commands leaves in a single write.
//!
//! [`flush`]: FramedStream::flush

#![allow(clippy::missing_errors_doc)]

use std::io;

use bytes::BytesMut;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use crate::command::Command;
use crate::parser::{is_last_reply_line, parse_reply};
use crate::types::{Expect, Reply};
use crate::{Error, Result};

/// Default buffer size for reading and writing.
const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Maximum reply line length. RFC 5321 allows 512 octets; servers exceed it
/// in practice, so be generous but bounded.
const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Maximum number of lines in one reply.
const MAX_REPLY_LINES: usize = 1024;

/// Buffered, line-framed SMTP connection.
pub struct FramedStream<S> {
    reader: BufReader<S>,
    write_buffer: BytesMut,
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new framed stream.
    pub fn new(stream: S) -> Self {
        Self {
            reader: BufReader::with_capacity(DEFAULT_BUFFER_SIZE, stream),
            write_buffer: BytesMut::with_capacity(DEFAULT_BUFFER_SIZE),
        }
    }

    /// Reads one line, without its line ending.
    async fn read_line(&mut self) -> Result<String> {
        let mut line = Vec::new();

        loop {
            let buf = self.reader.fill_buf().await?;
            if buf.is_empty() {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed",
                )));
            }

            if let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                line.extend_from_slice(&buf[..pos]);
                self.reader.consume(pos + 1);
                break;
            }

            let len = buf.len();
            line.extend_from_slice(buf);
            self.reader.consume(len);

            if line.len() > MAX_LINE_LENGTH {
                return Err(Error::Protocol("reply line too long".into()));
            }
        }

        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Ok(String::from_utf8_lossy(&line).into_owned())
    }

    /// Reads one complete, possibly multi-line, reply.
    pub async fn read_reply(&mut self) -> Result<Reply> {
        let mut lines = Vec::new();
        loop {
            let line = self.read_line().await?;
            tracing::trace!(line = %line, "S:");
            let is_last = is_last_reply_line(&line);
            lines.push(line);

            if is_last {
                break;
            }
            if lines.len() >= MAX_REPLY_LINES {
                return Err(Error::Protocol("reply has too many lines".into()));
            }
        }

        parse_reply(&lines)
    }

    /// Reads a reply and checks its code against `expect`.
    ///
    /// A reply with an unexpected code becomes [`Error::Reply`].
    pub async fn read_response(&mut self, expect: Expect) -> Result<Reply> {
        self.read_reply().await?.expect(expect)
    }

    /// Appends a command to the write buffer without sending it.
    pub fn queue_command(&mut self, cmd: &Command) {
        if matches!(cmd, Command::Auth { .. } | Command::AuthResponse(_)) {
            tracing::trace!(verb = cmd.verb(), "C: <credentials>");
        } else {
            tracing::trace!(command = ?cmd, "C:");
        }
        cmd.encode(&mut self.write_buffer);
    }

    /// Appends raw bytes to the write buffer without sending them.
    pub fn write_raw(&mut self, data: &[u8]) {
        self.write_buffer.extend_from_slice(data);
    }

    /// Returns the number of bytes waiting in the write buffer.
    pub fn buffered(&self) -> usize {
        self.write_buffer.len()
    }

    /// Sends everything buffered so far.
    pub async fn flush(&mut self) -> Result<()> {
        let stream = self.reader.get_mut();
        stream.write_all(&self.write_buffer).await?;
        stream.flush().await?;
        self.write_buffer.clear();
        Ok(())
    }

    /// Sends a single command immediately.
    pub async fn write_command(&mut self, cmd: &Command) -> Result<()> {
        self.queue_command(cmd);
        self.flush().await
    }

    /// Sends a command and reads its reply.
    pub async fn command(&mut self, cmd: &Command, expect: Expect) -> Result<Reply> {
        self.write_command(cmd).await?;
        self.read_response(expect).await
    }

    /// Consumes the framed stream and returns the inner stream.
    ///
    /// Unread input is discarded, which is what STARTTLS requires: anything
    /// the server sent before the handshake must not be trusted afterwards.
    pub fn into_inner(self) -> S {
        self.reader.into_inner()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::ReplyCode;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn reads_multi_line_reply() {
        let mock = Builder::new()
            .read(b"250-mx.example.com\r\n250-PIPE")
            .read(b"LINING\r\n250 SIZE 1000\r\n")
            .build();
        let mut framed = FramedStream::new(mock);

        let reply = framed.read_reply().await.unwrap();
        assert_eq!(reply.code, ReplyCode::OK);
        assert_eq!(reply.message, vec!["mx.example.com", "PIPELINING", "SIZE 1000"]);
    }

    #[tokio::test]
    async fn accepts_bare_newlines() {
        let mock = Builder::new().read(b"220 ready\n").build();
        let mut framed = FramedStream::new(mock);
        let reply = framed.read_reply().await.unwrap();
        assert_eq!(reply.message_text(), "ready");
    }

    #[tokio::test]
    async fn eof_is_io_error() {
        let mock = Builder::new().read(b"250-partial\r\n").build();
        let mut framed = FramedStream::new(mock);
        let err = framed.read_reply().await.unwrap_err();
        assert!(matches!(err, Error::Io(ref e) if e.kind() == io::ErrorKind::UnexpectedEof));
    }

    #[tokio::test]
    async fn unexpected_code_is_reply_error() {
        let mock = Builder::new().read(b"451 try again\r\n").build();
        let mut framed = FramedStream::new(mock);
        let err = framed
            .read_response(Expect::Code(ReplyCode::OK))
            .await
            .unwrap_err();
        assert_eq!(err.reply_code(), Some(ReplyCode::LOCAL_ERROR));
    }

    #[tokio::test]
    async fn queued_commands_leave_in_one_write() {
        let mock = Builder::new().write(b"RSET\r\nNOOP\r\n").build();
        let mut framed = FramedStream::new(mock);
        framed.queue_command(&Command::Rset);
        framed.queue_command(&Command::Noop);
        assert_eq!(framed.buffered(), 12);
        framed.flush().await.unwrap();
        assert_eq!(framed.buffered(), 0);
    }
}
