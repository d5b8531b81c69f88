//! Remote shell wire protocol
//!
//! Requests and responses are framed by a single terminator byte each.
//!
//! ```text
//! client -> server:  ┌──────────────────────┬──────┐
//!                    │ command line (UTF-8) │ 0x00 │
//!                    └──────────────────────┴──────┘
//! server -> client:  ┌──────────────────────┬──────┐
//!                    │ output bytes         │ 0x04 │
//!                    └──────────────────────┴──────┘
//! ```
//!
//! The output is whatever the command wrote to the socket, so a command
//! that itself prints `0x04` ends its response early on the client side.
//! The framing has no escaping.

use std::io::{self, BufRead, Read, Write};

/// Terminates every response
pub const SENTINEL: u8 = 0x04;

/// Terminates every request
pub const REQUEST_TERMINATOR: u8 = 0x00;

const READ_CHUNK: usize = 4096;

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("rdsh-error: request exceeds {max} bytes")]
    RequestTooLarge { max: usize },

    #[error("rdsh-error: communication error: {0}")]
    Io(#[from] io::Error),
}

/// Reads NUL-terminated requests from a stream.
///
/// A single `read` may return part of a request or several requests at
/// once; bytes after the first terminator are kept for the next call.
pub struct RequestReader<R> {
    inner: R,
    pending: Vec<u8>,
    max_len: usize,
}

impl<R: Read> RequestReader<R> {
    pub fn new(inner: R, max_len: usize) -> Self {
        Self {
            inner,
            pending: Vec::new(),
            max_len,
        }
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Bytes received but not yet returned as a request.
    pub fn buffered(&self) -> &[u8] {
        &self.pending
    }

    /// Next request without its terminator, or `None` once the peer has
    /// closed with nothing pending. A partial request at close is returned
    /// as if it had been terminated.
    pub fn read_request(&mut self) -> Result<Option<String>, ProtocolError> {
        let mut scanned = 0;
        loop {
            if let Some(pos) = self.pending[scanned..]
                .iter()
                .position(|&b| b == REQUEST_TERMINATOR)
            {
                let end = scanned + pos;
                // The terminator counts toward the limit
                if end + 1 > self.max_len {
                    return Err(ProtocolError::RequestTooLarge { max: self.max_len });
                }
                let request = decode(&self.pending[..end]);
                self.pending.drain(..=end);
                return Ok(Some(request));
            }
            scanned = self.pending.len();

            if self.pending.len() >= self.max_len {
                return Err(ProtocolError::RequestTooLarge { max: self.max_len });
            }

            let mut chunk = [0u8; READ_CHUNK];
            let n = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };

            if n == 0 {
                if self.pending.is_empty() {
                    return Ok(None);
                }
                let request = decode(&self.pending);
                self.pending.clear();
                return Ok(Some(request));
            }
            self.pending.extend_from_slice(&chunk[..n]);
        }
    }
}

fn decode(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Drops one trailing `\n` (and a `\r` before it).
pub fn strip_newline(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

/// Ends the current response.
pub fn send_sentinel<W: Write>(writer: &mut W) -> io::Result<()> {
    writer.write_all(&[SENTINEL])?;
    writer.flush()
}

/// Writes `message` and ends the response.
pub fn write_response<W: Write>(writer: &mut W, message: &str) -> io::Result<()> {
    writer.write_all(message.as_bytes())?;
    send_sentinel(writer)
}

/// Sends one request.
pub fn write_request<W: Write>(writer: &mut W, line: &str) -> io::Result<()> {
    writer.write_all(line.as_bytes())?;
    writer.write_all(&[REQUEST_TERMINATOR])?;
    writer.flush()
}

/// Copies response bytes to `out` until the sentinel. Returns `false` if the
/// server closed the connection first.
///
/// Output is forwarded as it arrives. Bytes after the sentinel stay in
/// `reader` for the next response.
pub fn read_response<R: BufRead, W: Write>(reader: &mut R, out: &mut W) -> io::Result<bool> {
    loop {
        let (used, done) = {
            let buf = match reader.fill_buf() {
                Ok(buf) => buf,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            if buf.is_empty() {
                out.flush()?;
                return Ok(false);
            }
            match buf.iter().position(|&b| b == SENTINEL) {
                Some(pos) => {
                    out.write_all(&buf[..pos])?;
                    (pos + 1, true)
                }
                None => {
                    out.write_all(buf)?;
                    (buf.len(), false)
                }
            }
        };
        reader.consume(used);
        out.flush()?;
        if done {
            return Ok(true);
        }
    }
}
