use super::{Endpoints, ExecutionResult};
use crate::parser::ast::*;
use crate::runtime::Runtime;
use nix::errno::Errno;
use nix::sys::signal::Signal;
use os_pipe::{PipeReader, PipeWriter};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::process::{Child, Command as StdCommand, ExitStatus, Stdio};

/// Mode for files created by `>` and `>>`
const OUTPUT_FILE_MODE: u32 = 0o644;

/// A stage that could not be started
#[derive(Debug, thiserror::Error)]
enum StageError {
    #[error("rdsh: {path}: {source}")]
    Redirect { path: String, source: io::Error },

    #[error("rdsh: {program}: {}", describe_spawn_error(.source))]
    Spawn { program: String, source: io::Error },

    #[error("rdsh: cannot bind standard streams: {0}")]
    Streams(#[from] io::Error),
}

impl StageError {
    /// Status recorded for the stage. A failed spawn carries the OS errno.
    fn exit_code(&self) -> i32 {
        match self {
            StageError::Spawn { source, .. } => source.raw_os_error().unwrap_or(1),
            _ => 1,
        }
    }
}

fn describe_spawn_error(error: &io::Error) -> String {
    match error.raw_os_error().map(Errno::from_raw) {
        Some(Errno::ENOENT) => "command not found".to_string(),
        Some(Errno::EACCES) => "permission denied".to_string(),
        Some(errno) => errno.desc().to_string(),
        None => error.to_string(),
    }
}

enum Stage {
    Running { program: String, child: Child },
    Finished(i32),
}

/// Execute a pipeline as one process per command.
///
/// Stage `i` reads from pipe `i - 1` and writes to pipe `i`; the first stage
/// reads from `endpoints.input` and the last writes to `endpoints.output`.
/// A file redirect replaces whichever end it names for that stage only.
/// Every stage's stderr goes to `endpoints.error`.
///
/// The pipe ends belonging to a stage are moved into its `Command` and
/// closed in this process as soon as that stage has been spawned, so no
/// descriptor outlives the call and readers see end-of-input once their
/// writer exits. Pipes are created close-on-exec, so a child only ever holds
/// the ends bound to its own standard streams.
///
/// A stage that cannot start does not abort the pipeline: its failure is
/// written to the error endpoint and it is recorded with the errno (or 1)
/// as its status, while its neighbours run on and see a closed pipe.
pub fn execute_pipeline(
    pipeline: &Pipeline,
    runtime: &mut Runtime,
    endpoints: &Endpoints<'_>,
) -> io::Result<ExecutionResult> {
    let count = pipeline.commands.len();
    if count == 0 {
        return Ok(ExecutionResult::default());
    }

    let mut readers: Vec<Option<PipeReader>> = Vec::with_capacity(count - 1);
    let mut writers: Vec<Option<PipeWriter>> = Vec::with_capacity(count - 1);
    for _ in 1..count {
        let (reader, writer) = os_pipe::pipe()?;
        readers.push(Some(reader));
        writers.push(Some(writer));
    }

    let cwd = runtime.get_cwd();
    let mut stages = Vec::with_capacity(count);

    for (i, command) in pipeline.commands.iter().enumerate() {
        let upstream = if i > 0 { readers[i - 1].take() } else { None };
        let downstream = if i + 1 < count { writers[i].take() } else { None };

        let stage = match spawn_stage(command, &cwd, endpoints, upstream, downstream) {
            Ok(child) => {
                tracing::debug!(stage = i, program = %command.name, pid = child.id(), "spawned");
                Stage::Running {
                    program: command.name.clone(),
                    child,
                }
            }
            Err(e) => {
                tracing::debug!(stage = i, program = %command.name, error = %e, "stage failed to start");
                report_stage_error(endpoints, &e);
                Stage::Finished(e.exit_code())
            }
        };
        stages.push(stage);
    }

    let stage_codes: Vec<i32> = stages.into_iter().map(wait_stage).collect();
    let result = ExecutionResult::from_stages(stage_codes);
    runtime.set_last_exit_code(result.exit_code);

    Ok(result)
}

fn spawn_stage(
    command: &Command,
    cwd: &Path,
    endpoints: &Endpoints<'_>,
    upstream: Option<PipeReader>,
    downstream: Option<PipeWriter>,
) -> Result<Child, StageError> {
    let stdin: Stdio = match (&command.input, upstream) {
        (Some(path), _) => open_input(cwd, path)?.into(),
        (None, Some(reader)) => reader.into(),
        (None, None) => endpoints.input.to_stdio()?,
    };

    let stdout: Stdio = match (&command.output, downstream) {
        (Some(redirect), _) => open_output(cwd, redirect)?.into(),
        (None, Some(writer)) => writer.into(),
        (None, None) => endpoints.output.to_stdio()?,
    };

    let stderr = endpoints.error.to_stdio()?;

    StdCommand::new(&command.name)
        .args(&command.args)
        .current_dir(cwd)
        .stdin(stdin)
        .stdout(stdout)
        .stderr(stderr)
        .spawn()
        .map_err(|source| StageError::Spawn {
            program: command.name.clone(),
            source,
        })
}

fn open_input(cwd: &Path, path: &str) -> Result<File, StageError> {
    File::open(cwd.join(path)).map_err(|source| StageError::Redirect {
        path: path.to_string(),
        source,
    })
}

fn open_output(cwd: &Path, redirect: &OutputRedirect) -> Result<File, StageError> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).mode(OUTPUT_FILE_MODE);
    match redirect.mode {
        RedirectMode::Truncate => options.truncate(true),
        RedirectMode::Append => options.append(true),
    };

    options
        .open(cwd.join(&redirect.path))
        .map_err(|source| StageError::Redirect {
            path: redirect.path.clone(),
            source,
        })
}

fn report_stage_error(endpoints: &Endpoints<'_>, error: &StageError) {
    let written = endpoints
        .error
        .writer(true)
        .and_then(|mut w| writeln!(w, "{}", error).and_then(|_| w.flush()));
    if let Err(e) = written {
        tracing::warn!(error = %e, "could not report stage failure");
    }
}

fn wait_stage(stage: Stage) -> i32 {
    match stage {
        Stage::Finished(code) => code,
        Stage::Running { program, mut child } => match child.wait() {
            Ok(status) => {
                if let Some(signo) = status.signal() {
                    tracing::debug!(program = %program, signal = ?Signal::try_from(signo), "stage killed");
                }
                status_code(status)
            }
            Err(e) => {
                tracing::warn!(program = %program, error = %e, "failed to wait for stage");
                1
            }
        },
    }
}

/// Exit code of a finished process; death by signal reports `128 + signo`.
fn status_code(status: ExitStatus) -> i32 {
    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(1)
}
