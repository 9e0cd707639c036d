//! Helper process bridge - the wired-node transport.
//!
//! Wired controllers are reached through one long-lived local helper process
//! that embeds its own command loop and owns the physical protocol to the
//! hardware. The bridge spawns it exactly once, writes newline-delimited
//! command records to its stdin, and watches stdout/stderr:
//!
//! - a stdout line equal to the readiness token flips the bridge to `Ready`
//! - any other stdout line is a loose acknowledgement (`OK ...` /
//!   `ERROR ...`, no correlation ids) and is logged as received
//! - stderr lines are logged as errors
//! - process exit flips the bridge to `Terminated` and is absorbing; the
//!   bridge never respawns the helper
//!
//! Sends do not wait for readiness: lines written before the helper announces
//! itself are not queued here and may be dropped by the pipe. That matches
//! the delivery guarantee everywhere else in this crate - best effort, buffer
//! is the source of truth.

use crate::command::Command;
use crate::config::HelperConfig;
use anyhow::{Context, Result};
use serde::Serialize;
use std::process::Stdio;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Reserved stdout line signaling the helper finished hardware init.
pub const READY_TOKEN: &str = "READY";

/// Bridge lifecycle. `Terminated` is absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BridgeState {
    Starting,
    Ready,
    Terminated,
}

const STATE_STARTING: u8 = 0;
const STATE_READY: u8 = 1;
const STATE_TERMINATED: u8 = 2;

struct Inner {
    stdin: Mutex<Option<ChildStdin>>,
    state: AtomicU8,
}

impl Inner {
    fn state(&self) -> BridgeState {
        match self.state.load(Ordering::SeqCst) {
            STATE_READY => BridgeState::Ready,
            STATE_TERMINATED => BridgeState::Terminated,
            _ => BridgeState::Starting,
        }
    }

    fn mark_ready(&self) {
        // Only valid from Starting; a late readiness token after exit stays
        // Terminated.
        let _ = self.state.compare_exchange(
            STATE_STARTING,
            STATE_READY,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    fn mark_terminated(&self) {
        self.state.store(STATE_TERMINATED, Ordering::SeqCst);
    }
}

/// Owns the helper process for the service lifetime.
pub struct HelperBridge {
    inner: Arc<Inner>,
}

impl HelperBridge {
    /// Spawn the helper process and the background tasks watching it.
    ///
    /// Called once at service construction. If the process later exits it is
    /// not restarted; the bridge reports `Terminated` and drops further
    /// sends.
    pub fn spawn(config: &HelperConfig, shutdown: CancellationToken) -> Result<Arc<Self>> {
        let mut child = tokio::process::Command::new(&config.command)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawning helper process `{}`", config.command))?;

        info!(command = %config.command, "helper process spawned");

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let inner = Arc::new(Inner {
            stdin: Mutex::new(stdin),
            state: AtomicU8::new(STATE_STARTING),
        });

        if let Some(stdout) = stdout {
            let inner = inner.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    let line = line.trim();
                    if line == READY_TOKEN {
                        inner.mark_ready();
                        info!("helper process ready");
                    } else if !line.is_empty() {
                        // Loose ack lines ("OK set 30 255", "ERROR ...").
                        // One-way logging channel, nothing to correlate.
                        info!(line, "helper output");
                    }
                }
            });
        }

        if let Some(stderr) = stderr {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    error!(line = %line.trim(), "helper stderr");
                }
            });
        }

        {
            let inner = inner.clone();
            tokio::spawn(async move {
                Self::watch_exit(child, inner, shutdown).await;
            });
        }

        Ok(Arc::new(Self { inner }))
    }

    async fn watch_exit(mut child: Child, inner: Arc<Inner>, shutdown: CancellationToken) {
        tokio::select! {
            status = child.wait() => {
                inner.mark_terminated();
                match status {
                    Ok(status) => warn!(%status, "helper process exited, wired dispatch disabled"),
                    Err(e) => warn!(error = %e, "failed to reap helper process"),
                }
            }
            _ = shutdown.cancelled() => {
                inner.mark_terminated();
                if let Err(e) = child.start_kill() {
                    warn!(error = %e, "failed to kill helper process on shutdown");
                }
                let _ = child.wait().await;
                info!("helper process stopped on shutdown");
            }
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> BridgeState {
        self.inner.state()
    }

    /// Whether the helper has announced readiness and is still running.
    pub fn is_ready(&self) -> bool {
        self.inner.state() == BridgeState::Ready
    }

    /// Write one command line to the helper's stdin. Best effort: serialize
    /// and pipe failures are logged here and go no further.
    pub async fn send(&self, command: &Command) {
        if self.inner.state() == BridgeState::Terminated {
            warn!("helper process has exited, dropping command");
            return;
        }

        let line = match command.to_wire() {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "failed to serialize command for helper");
                return;
            }
        };

        let mut guard = self.inner.stdin.lock().await;
        let Some(stdin) = guard.as_mut() else {
            warn!("helper stdin unavailable, dropping command");
            return;
        };

        let framed = format!("{line}\n");
        if let Err(e) = stdin.write_all(framed.as_bytes()).await {
            warn!(error = %e, "helper stdin write failed");
            return;
        }
        if let Err(e) = stdin.flush().await {
            warn!(error = %e, "helper stdin flush failed");
            return;
        }

        debug!(kind = command_kind(command), "command written to helper");
    }
}

fn command_kind(command: &Command) -> &'static str {
    match command {
        Command::Set { .. } => "set",
        Command::Blackout => "blackout",
        Command::Effect { .. } => "effect",
    }
}
