//! Interactive loops for the `rdsh` binary
//!
//! Local mode runs every line in this process with the terminal as the
//! pipeline's endpoints. Remote mode forwards every line to a server.

use crate::builtins::{Builtins, ControlAction, Dispatch, EXIT_CMD, STOP_SERVER_CMD};
use crate::config::Limits;
use crate::daemon::RemoteClient;
use crate::executor::{Endpoints, Executor, LineOutcome};
use crate::parser::Parser;
use crate::runtime::Runtime;
use anyhow::Result;
use std::io::{self, BufRead, Write};

pub const LOCAL_PROMPT: &str = "dsh4> ";
pub const REMOTE_PROMPT: &str = "rdsh> ";

pub struct LocalShell {
    executor: Executor,
    runtime: Runtime,
}

impl LocalShell {
    pub fn new(limits: Limits) -> Self {
        Self::with_runtime(limits, Runtime::default())
    }

    pub fn with_runtime(limits: Limits, runtime: Runtime) -> Self {
        Self {
            executor: Executor::new(Parser::new(limits), Builtins::local()),
            runtime,
        }
    }

    /// Reads lines from `input` until EOF or `exit`, prompting on `prompt`.
    /// Returns the last pipeline status.
    pub fn run<R: BufRead, W: Write>(
        &mut self,
        input: R,
        prompt: &mut W,
        endpoints: &Endpoints<'_>,
    ) -> Result<i32> {
        let mut lines = input.lines();
        loop {
            write!(prompt, "{}", LOCAL_PROMPT)?;
            prompt.flush()?;

            let line = match lines.next() {
                Some(Ok(line)) => line,
                Some(Err(e)) if e.kind() == io::ErrorKind::Interrupted => continue,
                Some(Err(e)) => return Err(e.into()),
                None => {
                    writeln!(prompt)?;
                    break;
                }
            };

            let outcome = self
                .executor
                .execute_line(&line, &mut self.runtime, endpoints)?;
            match outcome {
                LineOutcome::Rejected(rejection) => {
                    let reported = endpoints
                        .error
                        .writer(true)
                        .and_then(|mut err| writeln!(err, "{}", rejection));
                    if let Err(e) = reported {
                        tracing::warn!(error = %e, rejection = %rejection, "could not report rejection");
                    }
                }
                LineOutcome::Builtin(Dispatch::Control(ControlAction::ExitSession)) => break,
                LineOutcome::Builtin(_) => {}
                LineOutcome::Pipeline(result) => {
                    tracing::debug!(rc = result.exit_code, "pipeline finished");
                }
            }
        }

        Ok(self.runtime.get_last_exit_code())
    }
}

/// Forwards lines to `client` until EOF, `exit`, or `stop-server`.
pub fn run_remote<R: BufRead, W: Write>(
    client: &mut RemoteClient,
    input: R,
    out: &mut W,
) -> Result<()> {
    let mut lines = input.lines();
    loop {
        write!(out, "{}", REMOTE_PROMPT)?;
        out.flush()?;

        let line = match lines.next() {
            Some(Ok(line)) => line,
            Some(Err(e)) if e.kind() == io::ErrorKind::Interrupted => continue,
            Some(Err(e)) => return Err(e.into()),
            None => {
                writeln!(out)?;
                return Ok(());
            }
        };

        client.execute(&line, out)?;

        let word = line.trim();
        if word == EXIT_CMD || word == STOP_SERVER_CMD {
            return Ok(());
        }
    }
}
