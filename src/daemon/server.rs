use crate::builtins::Builtins;
use crate::daemon::config::{ConcurrencyMode, ServerConfig};
use crate::daemon::session::{Session, SessionEnd};
use crate::executor::Executor;
use crate::parser::Parser;
use crate::signal::StopSignal;
use anyhow::{anyhow, Context, Result};
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::process;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// How long the accept loop sleeps when no connection is pending
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Remote shell server
pub struct Server {
    listener: TcpListener,
    config: ServerConfig,
    executor: Arc<Executor>,
    stop: StopSignal,
}

/// Stops a running [`Server`] from another thread.
#[derive(Clone, Debug)]
pub struct ServerHandle {
    stop: StopSignal,
}

impl ServerHandle {
    /// The accept loop notices within one poll interval. Connections being
    /// served are not interrupted.
    pub fn stop(&self) {
        self.stop.request_stop();
    }
}

impl Server {
    /// Binds the listening socket.
    pub fn bind(config: ServerConfig) -> Result<Self> {
        let addr = config.addr();
        let listener =
            TcpListener::bind(addr).with_context(|| format!("failed to bind {}", addr))?;

        let executor = Executor::new(Parser::new(config.limits), Builtins::remote());

        Ok(Self {
            listener,
            config,
            executor: Arc::new(executor),
            stop: StopSignal::new(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            stop: self.stop.clone(),
        }
    }

    /// SIGINT and SIGTERM stop the accept loop.
    ///
    /// The handlers only raise the stop flag, and the flag is read between
    /// accepts. In single-threaded mode a session blocked reading from its
    /// client does not see the signal until that client disconnects; the
    /// accept loop then exits before taking the next connection. Worker
    /// threads in multi-threaded mode never check the flag.
    pub fn register_signals(&self) -> Result<()> {
        self.stop.setup()
    }

    /// Accepts connections until a client sends `stop-server` (single-threaded
    /// mode) or the stop flag is raised.
    ///
    /// In multi-threaded mode a `stop-server` request terminates the process
    /// from the worker that received it; other connections are cut off.
    pub fn run(self) -> Result<()> {
        self.listener.set_nonblocking(true)?;
        tracing::info!(
            addr = %self.local_addr()?,
            mode = ?self.config.mode,
            scope = ?self.config.state_scope,
            "server listening"
        );

        while !self.stop.should_stop() {
            let stream = match self.listener.accept() {
                Ok((stream, _addr)) => stream,
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                    continue;
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(anyhow!("accept failed: {}", e)),
            };
            stream.set_nonblocking(false)?;

            match self.config.mode {
                ConcurrencyMode::SingleThreaded => {
                    if self.serve(&stream) == SessionEnd::StopServer {
                        break;
                    }
                }
                ConcurrencyMode::MultiThreaded => self.spawn_worker(stream),
            }
        }

        tracing::info!("server stopped");
        Ok(())
    }

    fn serve(&self, stream: &TcpStream) -> SessionEnd {
        Session::new(
            stream,
            &self.executor,
            self.config.state_scope,
            self.config.limits.max_request_len,
        )
        .run()
    }

    fn spawn_worker(&self, stream: TcpStream) {
        let executor = Arc::clone(&self.executor);
        let scope = self.config.state_scope;
        let max_request_len = self.config.limits.max_request_len;

        // Workers are detached; nothing joins them.
        let spawned = thread::Builder::new()
            .name("rdsh-conn".to_string())
            .spawn(move || {
                let end = Session::new(&stream, &executor, scope, max_request_len).run();
                if end == SessionEnd::StopServer {
                    tracing::info!("stop requested by client, exiting");
                    process::exit(0);
                }
            });

        if let Err(e) = spawned {
            tracing::error!(error = %e, "failed to spawn connection worker");
        }
    }
}
