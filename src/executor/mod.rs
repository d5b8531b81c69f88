pub mod pipeline;

use crate::builtins::{BuiltinError, Builtins, Dispatch};
use crate::parser::{ParseError, Parser};
use crate::runtime::Runtime;
use std::fs::File;
use std::io::{self, Write};
use std::os::fd::{AsFd, BorrowedFd};
use std::process::Stdio;

pub use pipeline::execute_pipeline;

/// A stage exiting with this status overrides the pipeline's aggregate
/// status, so a shutdown request survives being piped.
pub const SHUTDOWN_STATUS: i32 = 99;

/// One outer end of a pipeline.
#[derive(Debug, Clone, Copy)]
pub enum Endpoint<'a> {
    /// The shell's own stdin/stdout/stderr
    Inherit,
    /// `/dev/null`
    Null,
    /// Any open descriptor, typically the client socket
    Fd(BorrowedFd<'a>),
}

impl Endpoint<'_> {
    /// A fresh `Stdio` for one child. Each call duplicates the descriptor,
    /// the duplicate is closed once the child has been spawned.
    pub fn to_stdio(&self) -> io::Result<Stdio> {
        match self {
            Endpoint::Inherit => Ok(Stdio::inherit()),
            Endpoint::Null => Ok(Stdio::null()),
            Endpoint::Fd(fd) => Ok(Stdio::from(fd.try_clone_to_owned()?)),
        }
    }

    /// A writer for text the shell itself produces (built-in output and
    /// error messages).
    pub fn writer(&self, stderr: bool) -> io::Result<Box<dyn Write>> {
        match self {
            Endpoint::Inherit if stderr => Ok(Box::new(io::stderr())),
            Endpoint::Inherit => Ok(Box::new(io::stdout())),
            Endpoint::Null => Ok(Box::new(io::sink())),
            Endpoint::Fd(fd) => Ok(Box::new(File::from(fd.try_clone_to_owned()?))),
        }
    }
}

/// The external source and sinks a pipeline is wired to.
#[derive(Debug, Clone, Copy)]
pub struct Endpoints<'a> {
    pub input: Endpoint<'a>,
    pub output: Endpoint<'a>,
    pub error: Endpoint<'a>,
}

impl Endpoints<'static> {
    /// Local mode: the terminal on all three streams.
    pub fn terminal() -> Self {
        Self {
            input: Endpoint::Inherit,
            output: Endpoint::Inherit,
            error: Endpoint::Inherit,
        }
    }
}

impl<'a> Endpoints<'a> {
    /// Server mode: the client socket on all three streams.
    pub fn stream<S: AsFd>(stream: &'a S) -> Self {
        let fd = stream.as_fd();
        Self {
            input: Endpoint::Fd(fd),
            output: Endpoint::Fd(fd),
            error: Endpoint::Fd(fd),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Aggregate status of the pipeline
    pub exit_code: i32,
    /// Status of every stage, in pipeline order
    pub stage_codes: Vec<i32>,
}

impl ExecutionResult {
    pub fn from_stages(stage_codes: Vec<i32>) -> Self {
        let exit_code = if stage_codes.contains(&SHUTDOWN_STATUS) {
            SHUTDOWN_STATUS
        } else {
            stage_codes.last().copied().unwrap_or(0)
        };
        Self {
            exit_code,
            stage_codes,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn is_shutdown_status(&self) -> bool {
        self.exit_code == SHUTDOWN_STATUS
    }
}

/// Why a line produced no execution
#[derive(Debug, thiserror::Error)]
pub enum Rejection {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Builtin(#[from] BuiltinError),

    /// Pipes or descriptors could not be set up; only this line is lost
    #[error("error: cannot run command: {0}")]
    Resource(io::Error),
}

impl Rejection {
    pub fn is_warning(&self) -> bool {
        matches!(self, Rejection::Parse(e) if e.is_warning())
    }
}

#[derive(Debug)]
pub enum LineOutcome {
    /// The line was not executed; the message belongs to the caller
    Rejected(Rejection),
    /// A built-in ran in-process or asks for a control action
    Builtin(Dispatch),
    /// An external pipeline ran
    Pipeline(ExecutionResult),
}

/// Parse, dispatch, execute: the path every line takes, locally or remotely.
pub struct Executor {
    parser: Parser,
    builtins: Builtins,
}

impl Executor {
    pub fn new(parser: Parser, builtins: Builtins) -> Self {
        Self { parser, builtins }
    }

    /// Runs one line.
    ///
    /// Failing to set up pipes or duplicate a descriptor rejects the line
    /// and leaves the caller's loop running. `Err` is reserved for a failed
    /// write of built-in output, i.e. the output endpoint itself is broken.
    pub fn execute_line(
        &self,
        line: &str,
        runtime: &mut Runtime,
        endpoints: &Endpoints<'_>,
    ) -> io::Result<LineOutcome> {
        let pipeline = match self.parser.parse(line) {
            Ok(pipeline) => pipeline,
            Err(e) => return Ok(LineOutcome::Rejected(e.into())),
        };

        {
            let mut out = match endpoints.output.writer(false) {
                Ok(out) => out,
                Err(e) => return Ok(LineOutcome::Rejected(Rejection::Resource(e))),
            };
            match self.builtins.dispatch(&pipeline, runtime, &mut *out) {
                Ok(Dispatch::NotBuiltin) => {}
                Ok(dispatch) => return Ok(LineOutcome::Builtin(dispatch)),
                Err(BuiltinError::Io(e)) => return Err(e),
                Err(e) => return Ok(LineOutcome::Rejected(e.into())),
            }
        }

        match execute_pipeline(&pipeline, runtime, endpoints) {
            Ok(result) => Ok(LineOutcome::Pipeline(result)),
            Err(e) => {
                tracing::warn!(error = %e, "pipeline setup failed");
                Ok(LineOutcome::Rejected(Rejection::Resource(e)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::ControlAction;
    use std::fs;
    use tempfile::TempDir;

    fn executor() -> Executor {
        Executor::new(Parser::default(), Builtins::remote())
    }

    #[test]
    fn test_aggregate_is_last_stage() {
        let result = ExecutionResult::from_stages(vec![1, 0, 3]);
        assert_eq!(result.exit_code, 3);
        assert!(!result.success());
    }

    #[test]
    fn test_shutdown_status_overrides_aggregate() {
        let result = ExecutionResult::from_stages(vec![SHUTDOWN_STATUS, 0]);
        assert_eq!(result.exit_code, SHUTDOWN_STATUS);
        assert!(result.is_shutdown_status());
    }

    #[test]
    fn test_execute_line_rejects_empty() {
        let mut runtime = Runtime::with_cwd("/");
        let outcome = executor()
            .execute_line("   ", &mut runtime, &Endpoints::terminal())
            .unwrap();
        match outcome {
            LineOutcome::Rejected(rejection) => assert!(rejection.is_warning()),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_execute_line_control_action() {
        let mut runtime = Runtime::with_cwd("/");
        let outcome = executor()
            .execute_line("stop-server", &mut runtime, &Endpoints::terminal())
            .unwrap();
        assert!(matches!(
            outcome,
            LineOutcome::Builtin(Dispatch::Control(ControlAction::StopServer))
        ));
    }

    #[test]
    fn test_execute_line_builtin_output_to_endpoint() {
        let temp = TempDir::new().unwrap();
        let sink_path = temp.path().join("sink");
        let sink = fs::File::create(&sink_path).unwrap();
        let endpoints = Endpoints {
            input: Endpoint::Null,
            output: Endpoint::Fd(sink.as_fd()),
            error: Endpoint::Fd(sink.as_fd()),
        };

        let mut runtime = Runtime::with_cwd(temp.path());
        runtime.set_last_exit_code(7);
        let outcome = executor().execute_line("rc", &mut runtime, &endpoints).unwrap();

        assert!(matches!(outcome, LineOutcome::Builtin(Dispatch::Executed)));
        assert_eq!(fs::read_to_string(&sink_path).unwrap(), "7\n");
    }

    #[test]
    fn test_execute_line_redirected_builtin_rejected() {
        let mut runtime = Runtime::with_cwd("/");
        let outcome = executor()
            .execute_line("cd /tmp > out", &mut runtime, &Endpoints::terminal())
            .unwrap();
        match outcome {
            LineOutcome::Rejected(rejection) => assert!(!rejection.is_warning()),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_resource_rejection_is_an_error() {
        let rejection = Rejection::Resource(io::Error::from_raw_os_error(24));
        assert!(!rejection.is_warning());
        assert!(rejection.to_string().starts_with("error: cannot run command:"));
    }
}
