//! Session state shared by the built-ins and the pipeline executor
//!
//! Two commands need to see what earlier commands did: `cd` moves the
//! working directory that later pipelines start in, and `rc` reports the
//! status of the previous external pipeline.
//!
//! [`StateScope::Connection`] keeps both values inside the [`Runtime`], so
//! every client connection has its own directory and status. This is a
//! deliberate semantic change from a shell where `cd` moves the whole
//! process.
//!
//! [`StateScope::Process`] restores the process-wide behaviour: `cd` calls
//! `chdir` for the server process and the last status lives in one static
//! shared by every connection. With concurrent clients this state is raced
//! without coordination; one client's `cd` changes where another client's
//! next pipeline runs.

use std::env;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI32, Ordering};

/// Last pipeline status when [`StateScope::Process`] is selected
static PROCESS_LAST_STATUS: AtomicI32 = AtomicI32::new(0);

/// Where `cd` and `rc` keep their state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StateScope {
    /// Each connection (or local shell) owns its state
    #[default]
    Connection,
    /// State is process-wide and shared by all connections
    Process,
}

impl StateScope {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "connection" | "session" => Some(StateScope::Connection),
            "process" | "global" => Some(StateScope::Process),
            _ => None,
        }
    }
}

/// Per-session view of the working directory and last exit status
#[derive(Debug, Clone)]
pub struct Runtime {
    scope: StateScope,
    cwd: PathBuf,
    last_exit_code: i32,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(StateScope::default())
    }
}

impl Runtime {
    pub fn new(scope: StateScope) -> Self {
        let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
        Self {
            scope,
            cwd,
            last_exit_code: 0,
        }
    }

    /// A connection-scoped runtime starting in `cwd`.
    pub fn with_cwd(cwd: impl Into<PathBuf>) -> Self {
        Self {
            scope: StateScope::Connection,
            cwd: cwd.into(),
            last_exit_code: 0,
        }
    }

    pub fn get_cwd(&self) -> PathBuf {
        match self.scope {
            StateScope::Connection => self.cwd.clone(),
            StateScope::Process => env::current_dir().unwrap_or_else(|_| self.cwd.clone()),
        }
    }

    /// Resolves `path` against the session's working directory.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.get_cwd().join(path)
        }
    }

    /// Changes the working directory. On failure the directory is unchanged.
    pub fn change_dir(&mut self, target: impl AsRef<Path>) -> io::Result<()> {
        let absolute = self.resolve(target);
        match self.scope {
            StateScope::Connection => {
                let canonical = absolute.canonicalize()?;
                if !canonical.is_dir() {
                    return Err(io::Error::new(io::ErrorKind::Other, "Not a directory"));
                }
                self.cwd = canonical;
            }
            StateScope::Process => {
                env::set_current_dir(&absolute)?;
                self.cwd = env::current_dir()?;
            }
        }
        Ok(())
    }

    pub fn set_last_exit_code(&mut self, code: i32) {
        match self.scope {
            StateScope::Connection => self.last_exit_code = code,
            StateScope::Process => PROCESS_LAST_STATUS.store(code, Ordering::SeqCst),
        }
    }

    pub fn get_last_exit_code(&self) -> i32 {
        match self.scope {
            StateScope::Connection => self.last_exit_code,
            StateScope::Process => PROCESS_LAST_STATUS.load(Ordering::SeqCst),
        }
    }
}
