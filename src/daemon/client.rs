//! Remote shell client
//!
//! Sends one line per request and copies the response to a writer until the
//! sentinel arrives.

use crate::daemon::protocol;
use anyhow::{anyhow, Context, Result};
use std::io::{BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};

pub struct RemoteClient {
    stream: TcpStream,
    responses: BufReader<TcpStream>,
}

impl RemoteClient {
    pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let stream = TcpStream::connect(addr).context("failed to connect to server")?;
        let responses = BufReader::new(stream.try_clone()?);
        Ok(Self { stream, responses })
    }

    /// Sends `line` and writes the response to `out`.
    ///
    /// Fails if the server closes the connection before the sentinel.
    pub fn execute<W: Write>(&mut self, line: &str, out: &mut W) -> Result<()> {
        protocol::write_request(&mut self.stream, line)
            .map_err(|e| anyhow!("failed to send request: {}", e))?;

        let complete = protocol::read_response(&mut self.responses, out)
            .map_err(|e| anyhow!("failed to read response: {}", e))?;
        if !complete {
            return Err(anyhow!("server closed the connection"));
        }
        Ok(())
    }

    /// Convenience wrapper returning the response as text.
    pub fn execute_to_string(&mut self, line: &str) -> Result<String> {
        let mut out = Vec::new();
        self.execute(line, &mut out)?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }
}
