use anyhow::Result;
use signal_hook::consts::{SIGINT, SIGTERM};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Turns SIGINT/SIGTERM into a flag the accept loop polls.
#[derive(Clone, Debug)]
pub struct StopSignal {
    flag: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::from_flag(Arc::new(AtomicBool::new(false)))
    }

    /// Wraps an existing flag, e.g. one a [`ServerHandle`](crate::daemon::ServerHandle) also sets.
    pub fn from_flag(flag: Arc<AtomicBool>) -> Self {
        Self { flag }
    }

    /// Registers SIGINT and SIGTERM. Once registered, the default action
    /// (terminate) no longer runs for those signals in this process.
    pub fn setup(&self) -> Result<()> {
        for signal in [SIGINT, SIGTERM] {
            signal_hook::flag::register(signal, Arc::clone(&self.flag))?;
        }
        Ok(())
    }

    pub fn should_stop(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub fn request_stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}
