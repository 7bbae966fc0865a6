//! Driver process management - spawning and stopping the Node host
//!
//! The host runs in its own process group so Chromium children go down
//! with it.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, info, warn};

use crate::error::{EngineError, EngineResult};

const STDERR_TAIL_LINES: usize = 20;

/// Handle to a running driver host
pub struct DriverProcess {
    child: Child,
    pid: Option<u32>,
    stderr_tail: Arc<Mutex<VecDeque<String>>>,
    stopped: bool,
}

impl DriverProcess {
    /// Spawn `cmd` with piped stdio, returning the handle and the protocol pipes
    pub fn spawn(mut cmd: Command) -> EngineResult<(Self, ChildStdin, ChildStdout)> {
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd
            .spawn()
            .map_err(|e| EngineError::DriverUnavailable(format!("failed to spawn driver: {}", e)))?;

        let pid = child.id();
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| EngineError::Driver("driver stdin not captured".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::Driver("driver stdout not captured".into()))?;

        let stderr_tail = Arc::new(Mutex::new(VecDeque::with_capacity(STDERR_TAIL_LINES)));
        if let Some(stderr) = child.stderr.take() {
            let tail = Arc::clone(&stderr_tail);
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "mailproof::driver", "{}", line);
                    let mut tail = tail.lock();
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
            });
        }

        debug!("Spawned driver host (pid: {:?})", pid);

        Ok((
            Self {
                child,
                pid,
                stderr_tail,
                stopped: false,
            },
            stdin,
            stdout,
        ))
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Last lines the host wrote to stderr
    pub fn stderr_tail(&self) -> String {
        self.stderr_tail
            .lock()
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Ask the host to exit, escalating to SIGKILL after `grace`
    pub async fn shutdown(&mut self, grace: Duration) {
        if self.stopped {
            return;
        }
        info!("Stopping driver host (pid: {:?})", self.pid);

        // Try graceful shutdown first
        self.signal(Signal::Term);
        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => debug!("Driver host exited: {}", status),
            Ok(Err(e)) => warn!("Failed to wait for driver host: {}", e),
            Err(_) => warn!("Driver host ignored SIGTERM for {:?}", grace),
        }

        self.terminate();
    }

    /// Kill the host and its process group without waiting
    pub fn terminate(&mut self) {
        if self.stopped {
            return;
        }
        self.signal(Signal::Kill);
        let _ = self.child.start_kill();
        self.stopped = true;
    }

    fn signal(&self, signal: Signal) {
        #[cfg(unix)]
        if let Some(pid) = self.pid {
            use nix::sys::signal::{killpg, Signal as NixSignal};
            use nix::unistd::Pid;

            let sig = match signal {
                Signal::Term => NixSignal::SIGTERM,
                Signal::Kill => NixSignal::SIGKILL,
            };
            let _ = killpg(Pid::from_raw(pid as i32), sig);
        }
        #[cfg(not(unix))]
        let _ = signal;
    }
}

#[derive(Debug, Clone, Copy)]
enum Signal {
    Term,
    Kill,
}

impl Drop for DriverProcess {
    fn drop(&mut self) {
        self.terminate();
    }
}
