//! Message body framing for DATA (RFC 5321 §4.5.2).
//!
//! Lines starting with `.` get an extra `.`, bare LF becomes CRLF, and the
//! body ends with a line holding a single `.`.

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::connection::{FramedStream, SmtpStream};
use crate::error::Stage;
use crate::types::{Expect, ReplyCode};
use crate::Result;

/// Flush threshold for buffered body data.
const FLUSH_THRESHOLD: usize = 8192;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineState {
    /// Nothing written yet.
    Begin,
    /// At the start of a line.
    LineStart,
    /// Inside a line.
    Data,
    /// After a CR.
    Cr,
}

/// Incremental dot-stuffing encoder.
#[derive(Debug, Clone)]
pub(crate) struct DotStuffer {
    state: LineState,
}

impl DotStuffer {
    pub(crate) const fn new() -> Self {
        Self {
            state: LineState::Begin,
        }
    }

    /// Encodes `data` into `out`. Input may be split at any byte.
    pub(crate) fn encode(&mut self, data: &[u8], out: &mut BytesMut) {
        out.reserve(data.len());
        for &b in data {
            match self.state {
                LineState::Begin | LineState::LineStart => {
                    if b == b'.' {
                        out.put_u8(b'.');
                    }
                    self.state = Self::after_data(b, out);
                }
                LineState::Data => self.state = Self::after_data(b, out),
                LineState::Cr => {
                    self.state = match b {
                        b'\n' => LineState::LineStart,
                        b'\r' => LineState::Cr,
                        _ => LineState::Data,
                    };
                }
            }
            out.put_u8(b);
        }
    }

    fn after_data(b: u8, out: &mut BytesMut) -> LineState {
        match b {
            b'\r' => LineState::Cr,
            b'\n' => {
                out.put_u8(b'\r');
                LineState::LineStart
            }
            _ => LineState::Data,
        }
    }

    /// Completes the last line and writes the terminator.
    pub(crate) fn finish(&mut self, out: &mut BytesMut) {
        match self.state {
            LineState::Begin | LineState::LineStart => {}
            LineState::Cr => out.put_u8(b'\n'),
            LineState::Data => out.put_slice(b"\r\n"),
        }
        out.put_slice(b".\r\n");
        self.state = LineState::LineStart;
    }
}

/// Writer for the message body after a `354` reply.
///
/// Nothing reaches the server until enough data is buffered or
/// [`close`](Self::close) is called. Dropping the writer without closing it
/// leaves the session in the middle of DATA.
pub struct BodyWriter<'a, S> {
    framed: &'a mut FramedStream<SmtpStream<S>>,
    stuffer: DotStuffer,
    chunk: BytesMut,
}

impl<S> std::fmt::Debug for BodyWriter<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BodyWriter")
            .field("stuffer", &self.stuffer)
            .finish_non_exhaustive()
    }
}

impl<'a, S> BodyWriter<'a, S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub(crate) fn new(framed: &'a mut FramedStream<SmtpStream<S>>) -> Self {
        Self {
            framed,
            stuffer: DotStuffer::new(),
            chunk: BytesMut::new(),
        }
    }

    /// Writes a chunk of the message.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if flushing to the server fails.
    pub async fn write(&mut self, data: &[u8]) -> Result<()> {
        self.stuffer.encode(data, &mut self.chunk);
        self.framed.write_raw(&self.chunk);
        self.chunk.clear();
        if self.framed.buffered() >= FLUSH_THRESHOLD {
            self.framed.flush().await?;
        }
        Ok(())
    }

    /// Terminates the body and reads the server's verdict.
    ///
    /// # Errors
    ///
    /// Returns the I/O error, or a [`Stage::Message`] error if the server
    /// does not accept the message with `250`.
    pub async fn close(mut self) -> Result<()> {
        self.stuffer.finish(&mut self.chunk);
        self.framed.write_raw(&self.chunk);
        self.framed.flush().await?;
        self.framed
            .read_response(Expect::Code(ReplyCode::OK))
            .await
            .map_err(|e| match e {
                e @ crate::Error::Reply { .. } => e.at(Stage::Message),
                e => e,
            })?;
        tracing::debug!("message accepted");
        Ok(())
    }
}
