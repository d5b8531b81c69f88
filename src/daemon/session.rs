//! One client connection
//!
//! Each request moves through receive, parse, dispatch, execute, respond.
//! Whatever happens, the response is closed with exactly one sentinel so the
//! client knows when to prompt again.

use crate::builtins::{ControlAction, Dispatch, EXIT_CMD, STOP_SERVER_CMD};
use crate::daemon::protocol::{self, ProtocolError, RequestReader};
use crate::executor::{Endpoints, Executor, LineOutcome};
use crate::runtime::{Runtime, StateScope};
use std::io::{self, Write};
use std::net::TcpStream;

pub const EXIT_SESSION_MSG: &str = "Exiting client session\n";
pub const STOP_SERVER_MSG: &str = "Stopping server\n";

/// How a connection ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The peer closed the socket
    Disconnected,
    /// The client sent `exit`
    ExitSession,
    /// The client sent `stop-server`
    StopServer,
    /// The socket failed or the client broke the protocol
    Failed,
}

impl From<ControlAction> for SessionEnd {
    fn from(action: ControlAction) -> Self {
        match action {
            ControlAction::ExitSession => SessionEnd::ExitSession,
            ControlAction::StopServer => SessionEnd::StopServer,
        }
    }
}

/// Result of one request
enum Step {
    Continue,
    End(SessionEnd),
}

pub struct Session<'a> {
    stream: &'a TcpStream,
    executor: &'a Executor,
    runtime: Runtime,
    max_request_len: usize,
}

impl<'a> Session<'a> {
    pub fn new(
        stream: &'a TcpStream,
        executor: &'a Executor,
        scope: StateScope,
        max_request_len: usize,
    ) -> Self {
        Self {
            stream,
            executor,
            runtime: Runtime::new(scope),
            max_request_len,
        }
    }

    /// Serves requests until the client leaves or asks the server to stop.
    pub fn run(mut self) -> SessionEnd {
        let peer = self
            .stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        tracing::info!(peer = %peer, "client connected");

        let mut requests = RequestReader::new(self.stream, self.max_request_len);
        let end = loop {
            let request = match requests.read_request() {
                Ok(Some(request)) => request,
                Ok(None) => break SessionEnd::Disconnected,
                Err(ProtocolError::RequestTooLarge { max }) => {
                    tracing::warn!(peer = %peer, max, "request too large, closing connection");
                    let message = format!("{}\n", ProtocolError::RequestTooLarge { max });
                    if let Err(e) = protocol::write_response(&mut self.writer(), &message) {
                        tracing::debug!(error = %e, "could not report oversize request");
                    }
                    break SessionEnd::Failed;
                }
                Err(e) => {
                    tracing::warn!(peer = %peer, error = %e, "receive failed");
                    break SessionEnd::Failed;
                }
            };

            match self.handle_request(&request) {
                Ok(Step::Continue) => {}
                Ok(Step::End(end)) => break end,
                Err(e) => {
                    tracing::warn!(peer = %peer, error = %e, "send failed");
                    break SessionEnd::Failed;
                }
            }
        };

        tracing::info!(peer = %peer, reason = ?end, "client disconnected");
        end
    }

    fn writer(&self) -> &'a TcpStream {
        self.stream
    }

    fn handle_request(&mut self, request: &str) -> io::Result<Step> {
        let line = protocol::strip_newline(request);
        tracing::info!("rdsh-exec: {}", line);

        // Control words are honoured before parsing
        match line.trim() {
            EXIT_CMD => return self.end_session(ControlAction::ExitSession),
            STOP_SERVER_CMD => return self.end_session(ControlAction::StopServer),
            _ => {}
        }

        let endpoints = Endpoints::stream(self.stream);
        let outcome = self
            .executor
            .execute_line(line, &mut self.runtime, &endpoints)?;

        let mut writer = self.writer();
        match outcome {
            LineOutcome::Rejected(rejection) => {
                tracing::debug!(error = %rejection, "request rejected");
                writeln!(writer, "{}", rejection)?;
            }
            LineOutcome::Builtin(Dispatch::Control(action)) => {
                return self.end_session(action);
            }
            LineOutcome::Builtin(_) => {}
            LineOutcome::Pipeline(result) => {
                tracing::info!("rdsh-exec: rc = {}", result.exit_code);
                if result.is_shutdown_status() {
                    tracing::warn!(stages = ?result.stage_codes, "pipeline reported shutdown status");
                }
            }
        }

        protocol::send_sentinel(&mut writer)?;
        Ok(Step::Continue)
    }

    fn end_session(&mut self, action: ControlAction) -> io::Result<Step> {
        let message = match action {
            ControlAction::ExitSession => EXIT_SESSION_MSG,
            ControlAction::StopServer => STOP_SERVER_MSG,
        };
        protocol::write_response(&mut self.writer(), message)?;
        Ok(Step::End(action.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::Builtins;
    use crate::config::Limits;
    use crate::parser::Parser;
    use std::io::Read;
    use std::net::TcpListener;
    use std::thread;

    /// Runs one session on a loopback socket and returns what the client
    /// received plus how the session ended.
    fn converse(payload: &'static [u8], max_request_len: usize) -> (Vec<u8>, SessionEnd) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let client = thread::spawn(move || {
            let mut stream = TcpStream::connect(addr).unwrap();
            stream.write_all(payload).unwrap();
            stream.shutdown(std::net::Shutdown::Write).unwrap();
            let mut received = Vec::new();
            stream.read_to_end(&mut received).unwrap();
            received
        });

        let (stream, _) = listener.accept().unwrap();
        let executor = Executor::new(Parser::new(Limits::default()), Builtins::remote());
        let end = Session::new(&stream, &executor, StateScope::Connection, max_request_len).run();
        drop(stream);

        (client.join().unwrap(), end)
    }

    #[test]
    fn test_exit_literal() {
        let (received, end) = converse(b"exit\0", 1024);
        assert_eq!(received, b"Exiting client session\n\x04");
        assert_eq!(end, SessionEnd::ExitSession);
    }

    #[test]
    fn test_stop_server_literal_with_newline() {
        let (received, end) = converse(b"stop-server\n\0", 1024);
        assert_eq!(received, b"Stopping server\n\x04");
        assert_eq!(end, SessionEnd::StopServer);
    }

    #[test]
    fn test_empty_request_warns() {
        let (received, end) = converse(b"\0", 1024);
        assert_eq!(received, b"warning: no commands provided\n\x04");
        assert_eq!(end, SessionEnd::Disconnected);
    }

    #[test]
    fn test_pipeline_then_disconnect() {
        let (received, end) = converse(b"echo A | cat\0", 1024);
        assert_eq!(received, b"A\n\x04");
        assert_eq!(end, SessionEnd::Disconnected);
    }

    #[test]
    fn test_pipelined_requests_answered_in_order() {
        let (received, _) = converse(b"echo one\0echo two\0", 1024);
        assert_eq!(received, b"one\n\x04two\n\x04");
    }

    #[test]
    fn test_rc_after_failed_command() {
        let (received, _) = converse(b"false\0rc\0", 1024);
        assert_eq!(received, b"\x041\n\x04");
    }

    #[test]
    fn test_oversize_request_closes_connection() {
        let (received, end) = converse(&[b'x'; 200], 64);
        assert_eq!(end, SessionEnd::Failed);
        assert_eq!(received.last(), Some(&protocol::SENTINEL));
        assert!(String::from_utf8_lossy(&received).contains("exceeds 64 bytes"));
    }

    #[test]
    fn test_spawn_failure_reaches_client() {
        let (received, _) = converse(b"no-such-program-rdsh\0", 1024);
        let text = String::from_utf8_lossy(&received);
        assert!(text.contains("rdsh: no-such-program-rdsh: command not found"), "got {text:?}");
        assert!(text.ends_with('\x04'));
    }
}
