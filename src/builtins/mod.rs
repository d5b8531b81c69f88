use crate::parser::ast::{Command, Pipeline};
use crate::runtime::Runtime;
use std::collections::HashMap;
use std::io::{self, Write};

mod dragon;

/// Ends the current client session (or the local shell)
pub const EXIT_CMD: &str = "exit";

/// Stops the whole server; only recognised remotely
pub const STOP_SERVER_CMD: &str = "stop-server";

/// Action the caller must take after a built-in ran
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    ExitSession,
    StopServer,
}

/// Outcome of consulting the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Fall through to the pipeline executor
    NotBuiltin,
    /// Handled entirely in-process
    Executed,
    /// The connection or server must act
    Control(ControlAction),
}

#[derive(Debug, thiserror::Error)]
pub enum BuiltinError {
    #[error("error: redirection not supported for built-in commands")]
    Redirection,

    #[error("error: failed to write built-in output: {0}")]
    Io(#[from] io::Error),
}

type BuiltinFn = fn(&Command, &mut Runtime, &mut dyn Write) -> io::Result<Dispatch>;

#[derive(Clone)]
pub struct Builtins {
    commands: HashMap<&'static str, BuiltinFn>,
}

impl Default for Builtins {
    fn default() -> Self {
        Self::local()
    }
}

impl Builtins {
    /// Built-ins available to the local shell.
    pub fn local() -> Self {
        let mut commands: HashMap<&'static str, BuiltinFn> = HashMap::new();

        commands.insert(EXIT_CMD, builtin_exit);
        commands.insert("cd", builtin_cd);
        commands.insert("dragon", dragon::builtin_dragon);
        commands.insert("rc", builtin_rc);

        Self { commands }
    }

    /// Built-ins available to remote clients: the local set plus `stop-server`.
    pub fn remote() -> Self {
        let mut builtins = Self::local();
        builtins.commands.insert(STOP_SERVER_CMD, builtin_stop_server);
        builtins
    }

    pub fn is_builtin(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    pub fn builtin_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.commands.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Runs `pipeline` in-process if it is a single built-in command.
    ///
    /// Built-ins are only recognised when the pipeline has exactly one
    /// command; a built-in name inside a longer pipeline is spawned like
    /// any other program. Output, including `cd` failures, goes to `out`.
    pub fn dispatch(
        &self,
        pipeline: &Pipeline,
        runtime: &mut Runtime,
        out: &mut dyn Write,
    ) -> Result<Dispatch, BuiltinError> {
        let Some(command) = pipeline.single() else {
            return Ok(Dispatch::NotBuiltin);
        };
        let Some(func) = self.commands.get(command.name.as_str()) else {
            return Ok(Dispatch::NotBuiltin);
        };
        if command.has_redirects() {
            return Err(BuiltinError::Redirection);
        }

        let dispatch = func(command, runtime, out)?;
        out.flush()?;
        Ok(dispatch)
    }
}

fn builtin_exit(_cmd: &Command, _runtime: &mut Runtime, _out: &mut dyn Write) -> io::Result<Dispatch> {
    Ok(Dispatch::Control(ControlAction::ExitSession))
}

fn builtin_stop_server(
    _cmd: &Command,
    _runtime: &mut Runtime,
    _out: &mut dyn Write,
) -> io::Result<Dispatch> {
    Ok(Dispatch::Control(ControlAction::StopServer))
}

fn builtin_cd(cmd: &Command, runtime: &mut Runtime, out: &mut dyn Write) -> io::Result<Dispatch> {
    // No operand: nothing to do
    let Some(target) = cmd.args.first() else {
        return Ok(Dispatch::Executed);
    };

    if let Err(e) = runtime.change_dir(target) {
        tracing::debug!(target = %target, error = %e, "cd failed");
        writeln!(out, "cd: {}: {}", target, e)?;
    }
    Ok(Dispatch::Executed)
}

fn builtin_rc(_cmd: &Command, runtime: &mut Runtime, out: &mut dyn Write) -> io::Result<Dispatch> {
    writeln!(out, "{}", runtime.get_last_exit_code())?;
    Ok(Dispatch::Executed)
}
