//! Single-instance supervision of the monitor process.
//!
//! The [`Supervisor`] is a cloneable handle to an actor task that exclusively
//! owns the child handle. Handlers send it `start` / `stop` / `status`
//! messages; the per-child exit watcher sends it an exit notification on the
//! same channel. Because every transition happens on the actor task, a start
//! racing an exit, or a stop racing an exit, can never leave a dangling
//! handle or clear it twice.
//!
//! ## Lifecycle
//!
//! ```text
//!   Idle --start--> Running --(exit watcher: Exiting)--> Idle
//!                      |
//!                    stop (termination requested; state unchanged)
//! ```
//!
//! The watcher reports `Exiting` as soon as the child is reaped, then drains
//! the output pipes (bounded) and records the exit line before `Exited`. A
//! grandchild holding the pipes open therefore never keeps a dead pid in
//! `status`, and [`Supervisor::wait_for_exit`] waits for both steps.
//!
//! ## Module Structure
//!
//! - [`log_ring`]: bounded output buffer shared with the HTTP layer
//! - [`lines`]: chunk-to-line reassembly for the output consumers
//! - [`launch`]: launch request validation and command construction

mod launch;
mod lines;
mod log_ring;


pub use launch::{LaunchRequest, MonitorCommand, resolve_interpreter};
pub use lines::{LineAssembler, capture_stream};
pub use log_ring::{LogEntry, LogRing, LogSource, SharedLogRing};

use std::collections::BTreeSet;
use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use serde::Serialize;
use tokio::process::Child;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::constants::OUTPUT_DRAIN_TIMEOUT_MILLIS;
use crate::error::{Error, Result};
use crate::metrics;

/// Reply channel for a termination request forwarded to the exit watcher.
type KillReply = oneshot::Sender<io::Result<()>>;

/// Current supervisor state as seen by `GET /status`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MonitorStatus {
    pub running: bool,
    pub pid: Option<u32>,
}

enum Command {
    Start {
        /// Validation already ran; a running monitor still takes precedence
        /// over an invalid request.
        args: Result<Vec<String>>,
        reply: oneshot::Sender<Result<u32>>,
    },
    Stop {
        reply: oneshot::Sender<Result<u32>>,
    },
    Status {
        reply: oneshot::Sender<MonitorStatus>,
    },
    /// Idle with every exited child's output drained.
    Settled {
        reply: oneshot::Sender<bool>,
    },
    /// The child is gone; its output may still be draining.
    Exiting {
        generation: u64,
        pid: u32,
    },
    /// Output drained and the exit line recorded.
    Exited {
        generation: u64,
        pid: u32,
    },
}

/// The live child, as known to the actor. The OS child object itself is
/// owned by the exit watcher.
struct ChildHandle {
    pid: u32,
    generation: u64,
    kill_tx: mpsc::UnboundedSender<KillReply>,
}

/// Handle to the supervisor actor.
#[derive(Clone)]
pub struct Supervisor {
    tx: mpsc::UnboundedSender<Command>,
    logs: SharedLogRing,
}

impl Supervisor {
    /// Spawns the actor on the current tokio runtime.
    pub fn spawn(command: MonitorCommand, logs: SharedLogRing) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let actor = SupervisorActor {
            command,
            logs: logs.clone(),
            current: None,
            generation: 0,
            draining: BTreeSet::new(),
            notify: tx.downgrade(),
        };
        tokio::spawn(actor.run(rx));
        Self { tx, logs }
    }

    /// Validates `request` and launches the monitor.
    ///
    /// Returns the new pid, or [`Error::AlreadyRunning`] when a monitor is
    /// active (even if `request` is invalid). Returns as soon as the spawn
    /// call completes.
    pub async fn start(&self, request: &LaunchRequest) -> Result<u32> {
        let args = request.to_args();
        self.request(|reply| Command::Start { args, reply }).await?
    }

    /// Launches the monitor with a prepared argument list.
    pub async fn start_with_args(&self, args: Vec<String>) -> Result<u32> {
        self.request(|reply| Command::Start {
            args: Ok(args),
            reply,
        })
        .await?
    }

    /// Requests termination of the active monitor and returns its pid.
    ///
    /// Success means the signal was sent. The state returns to idle only
    /// once the exit watcher observes the exit.
    pub async fn stop(&self) -> Result<u32> {
        self.request(|reply| Command::Stop { reply }).await?
    }

    /// Current state. Never fails: an unavailable actor reads as idle.
    pub async fn status(&self) -> MonitorStatus {
        self.request(|reply| Command::Status { reply })
            .await
            .unwrap_or_default()
    }

    /// Polls until the monitor is idle and its exit has been logged, or
    /// `timeout` elapses. Returns whether that point was reached.
    pub async fn wait_for_exit(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self
                .request(|reply| Command::Settled { reply })
                .await
                .unwrap_or(true)
            {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }

    /// Stops the monitor (if any) and waits briefly for it to exit.
    pub async fn shutdown(&self, timeout: Duration) {
        match self.stop().await {
            Ok(pid) => {
                if self.wait_for_exit(timeout).await {
                    tracing::info!(pid, "Monitor stopped during shutdown");
                } else {
                    tracing::warn!(pid, "Monitor still running after shutdown timeout");
                }
            },
            Err(Error::NotRunning | Error::Unavailable) => {},
            Err(e) => tracing::warn!(error = %e, "Failed to stop monitor during shutdown"),
        }
    }

    /// Shared output buffer.
    pub fn logs(&self) -> &SharedLogRing {
        &self.logs
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(make(reply)).map_err(|_| Error::Unavailable)?;
        rx.await.map_err(|_| Error::Unavailable)
    }
}

// =============================================================================
// Actor
// =============================================================================

struct SupervisorActor {
    command: MonitorCommand,
    logs: SharedLogRing,
    current: Option<ChildHandle>,
    generation: u64,
    /// Generations that exited but are still draining output.
    draining: BTreeSet<u64>,
    /// Weak so the actor exits once every [`Supervisor`] handle is gone.
    notify: mpsc::WeakUnboundedSender<Command>,
}

impl SupervisorActor {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = rx.recv().await {
            match command {
                Command::Start { args, reply } => {
                    let _ = reply.send(self.start(args));
                },
                Command::Stop { reply } => {
                    let result = self.stop().await;
                    let _ = reply.send(result);
                },
                Command::Status { reply } => {
                    let _ = reply.send(self.status());
                },
                Command::Settled { reply } => {
                    let _ = reply.send(self.current.is_none() && self.draining.is_empty());
                },
                Command::Exiting { generation, pid } => self.exiting(generation, pid),
                Command::Exited { generation, pid } => {
                    self.draining.remove(&generation);
                    tracing::debug!(pid, generation, "Monitor output drained");
                },
            }
        }
        tracing::debug!("Supervisor actor stopped");
    }

    fn status(&self) -> MonitorStatus {
        MonitorStatus {
            running: self.current.is_some(),
            pid: self.current.as_ref().map(|c| c.pid),
        }
    }

    fn start(&mut self, args: Result<Vec<String>>) -> Result<u32> {
        if let Some(current) = &self.current {
            return Err(Error::AlreadyRunning { pid: current.pid });
        }
        let args = args?;
        let notify = self.notify.upgrade().ok_or(Error::Unavailable)?;
        let program = self.command.program().to_string_lossy().into_owned();

        let mut child = match self.command.build(&args).spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::error!(program = %program, error = %e, "Failed to spawn monitor");
                metrics::record_monitor_event("spawn_error");
                return Err(Error::spawn_failed(program, e));
            },
        };
        let pid = child.id().ok_or_else(|| {
            Error::spawn_failed(
                program.clone(),
                io::Error::other("process exited before its pid was read"),
            )
        })?;

        self.generation += 1;
        let generation = self.generation;

        // Recorded before the consumers start so it precedes any output.
        self.logs.record(
            LogSource::Sys,
            format!("Started monitor process (pid {pid}) with args [{}]", args.join(" ")),
        );

        let readers: Vec<JoinHandle<()>> = [
            child
                .stdout
                .take()
                .map(|out| tokio::spawn(capture_stream(out, LogSource::Out, self.logs.clone()))),
            child
                .stderr
                .take()
                .map(|err| tokio::spawn(capture_stream(err, LogSource::Err, self.logs.clone()))),
        ]
        .into_iter()
        .flatten()
        .collect();

        let (kill_tx, kill_rx) = mpsc::unbounded_channel();
        tokio::spawn(watch_child(ExitWatch {
            child,
            pid,
            generation,
            kill_rx,
            readers,
            logs: self.logs.clone(),
            notify,
        }));

        self.current = Some(ChildHandle {
            pid,
            generation,
            kill_tx,
        });

        tracing::info!(pid, generation, program = %program, ?args, "Started monitor process");
        metrics::record_monitor_event("start");
        metrics::set_monitor_running(true);
        Ok(pid)
    }

    async fn stop(&mut self) -> Result<u32> {
        let Some(current) = &self.current else {
            return Err(Error::NotRunning);
        };
        let pid = current.pid;

        let (reply_tx, reply_rx) = oneshot::channel();
        if current.kill_tx.send(reply_tx).is_err() {
            // The watcher already saw the exit; its notification is queued.
            return Err(Error::NotRunning);
        }

        match reply_rx.await {
            Ok(Ok(())) => {
                tracing::info!(pid, "Requested monitor termination");
                metrics::record_monitor_event("stop");
                Ok(pid)
            },
            Ok(Err(source)) => {
                tracing::warn!(pid, error = %source, "Failed to signal monitor");
                Err(Error::KillFailed { pid, source })
            },
            Err(_) => Err(Error::NotRunning),
        }
    }

    /// Returns to idle as soon as the child is reaped, before its output is
    /// drained, so status never reports a dead pid.
    fn exiting(&mut self, generation: u64, pid: u32) {
        self.draining.insert(generation);
        match &self.current {
            Some(current) if current.generation == generation => {
                self.current = None;
                metrics::set_monitor_running(false);
                tracing::debug!(pid, generation, "Supervisor returned to idle");
            },
            _ => {
                tracing::debug!(pid, generation, "Ignoring exit notification for a replaced process");
            },
        }
    }
}

// =============================================================================
// Exit Watcher
// =============================================================================

struct ExitWatch {
    child: Child,
    pid: u32,
    generation: u64,
    kill_rx: mpsc::UnboundedReceiver<KillReply>,
    readers: Vec<JoinHandle<()>>,
    logs: SharedLogRing,
    notify: mpsc::UnboundedSender<Command>,
}

/// Owns the child until it exits, serving termination requests meanwhile.
async fn watch_child(watch: ExitWatch) {
    let ExitWatch {
        mut child,
        pid,
        generation,
        mut kill_rx,
        readers,
        logs,
        notify,
    } = watch;

    let status = loop {
        tokio::select! {
            status = child.wait() => break status,
            Some(reply) = kill_rx.recv() => {
                let result = terminate(&mut child, pid);
                if result.is_ok() {
                    logs.record(
                        LogSource::Sys,
                        format!("Sent termination signal to monitor process (pid {pid})"),
                    );
                }
                let _ = reply.send(result);
            },
        }
    };

    let _ = notify.send(Command::Exiting { generation, pid });
    // Pending stop requests now resolve as NotRunning.
    drop(kill_rx);

    drain_readers(readers).await;

    let message = describe_exit(pid, &status);
    logs.record(LogSource::Sys, message.as_str());
    tracing::info!(pid, generation, "{message}");
    metrics::record_monitor_event("exit");

    let _ = notify.send(Command::Exited { generation, pid });
}

/// Waits for the output consumers to hit EOF, bounded so a grandchild
/// holding the pipes open cannot delay the exit transition.
async fn drain_readers(readers: Vec<JoinHandle<()>>) {
    let drain = async {
        for reader in readers {
            let _ = reader.await;
        }
    };
    if tokio::time::timeout(Duration::from_millis(OUTPUT_DRAIN_TIMEOUT_MILLIS), drain)
        .await
        .is_err()
    {
        tracing::debug!("Monitor output still open after exit");
    }
}

#[cfg(unix)]
fn terminate(_child: &mut Child, pid: u32) -> io::Result<()> {
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    // The child is not reaped until `wait` completes, so the pid is still ours.
    let raw = i32::try_from(pid).map_err(io::Error::other)?;
    signal::kill(Pid::from_raw(raw), Signal::SIGTERM).map_err(io::Error::from)
}

#[cfg(not(unix))]
fn terminate(child: &mut Child, _pid: u32) -> io::Result<()> {
    child.start_kill()
}

fn describe_exit(pid: u32, status: &io::Result<ExitStatus>) -> String {
    match status {
        Ok(status) => {
            if let Some(code) = status.code() {
                return format!("Monitor process {pid} exited with code {code}");
            }
            #[cfg(unix)]
            {
                use std::os::unix::process::ExitStatusExt;
                if let Some(signal) = status.signal() {
                    return format!("Monitor process {pid} terminated by signal {signal}");
                }
            }
            format!("Monitor process {pid} exited ({status})")
        },
        Err(e) => format!("Lost track of monitor process {pid}: {e}"),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    const EXIT_TIMEOUT: Duration = Duration::from_secs(5);

    fn shell(script: &str) -> Supervisor {
        Supervisor::spawn(
            MonitorCommand::new("sh", ["-c", script, "monitor"]),
            SharedLogRing::default(),
        )
    }

    fn texts(logs: &SharedLogRing, source: LogSource) -> Vec<String> {
        logs.tail(usize::MAX)
            .into_iter()
            .filter(|e| e.source == source)
            .map(|e| e.text)
            .collect()
    }

    #[tokio::test]
    async fn test_initially_idle() {
        let supervisor = shell("true");
        assert_eq!(supervisor.status().await, MonitorStatus::default());
    }

    #[tokio::test]
    async fn test_stop_when_idle_is_not_running() {
        let supervisor = shell("true");
        assert!(matches!(supervisor.stop().await, Err(Error::NotRunning)));
        assert!(supervisor.logs().is_empty());
        assert!(!supervisor.status().await.running);
    }

    #[tokio::test]
    async fn test_spawn_failure_stays_idle() {
        let supervisor = Supervisor::spawn(
            MonitorCommand::new("/nonexistent/snapwatch-monitor", Vec::<String>::new()),
            SharedLogRing::default(),
        );

        let result = supervisor.start(&LaunchRequest::default()).await;
        assert!(matches!(result, Err(Error::SpawnFailed { .. })));
        assert_eq!(supervisor.status().await, MonitorStatus::default());
    }

    #[tokio::test]
    async fn test_invalid_request_never_spawns() {
        let supervisor = shell("true");
        let request = LaunchRequest {
            interval: Some(-1.0),
            ..Default::default()
        };
        assert!(matches!(
            supervisor.start(&request).await,
            Err(Error::InvalidRequest(_))
        ));
        assert!(supervisor.logs().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_starts_yield_one_conflict() {
        let supervisor = shell("exec sleep 5");

        let (first, second) = tokio::join!(
            supervisor.start_with_args(vec![]),
            supervisor.start_with_args(vec![])
        );

        let (pid, conflict) = match (first, second) {
            (Ok(pid), Err(e)) | (Err(e), Ok(pid)) => (pid, e),
            other => panic!("expected one success and one conflict, got {other:?}"),
        };
        assert!(matches!(conflict, Error::AlreadyRunning { pid: p } if p == pid));
        assert_eq!(
            supervisor.status().await,
            MonitorStatus {
                running: true,
                pid: Some(pid)
            }
        );

        assert_eq!(supervisor.stop().await.unwrap(), pid);
        assert!(supervisor.wait_for_exit(EXIT_TIMEOUT).await);
        assert!(
            texts(supervisor.logs(), LogSource::Sys)
                .iter()
                .any(|t| t.contains("terminated by signal"))
        );
    }

    #[tokio::test]
    async fn test_exit_code_and_output_captured() {
        let supervisor = shell("echo hello; echo oops >&2; exit 1");
        supervisor.start_with_args(vec![]).await.unwrap();
        assert!(supervisor.wait_for_exit(EXIT_TIMEOUT).await);

        let logs = supervisor.logs();
        assert_eq!(texts(logs, LogSource::Out), vec!["hello"]);
        assert_eq!(texts(logs, LogSource::Err), vec!["oops"]);

        let sys = texts(logs, LogSource::Sys);
        assert!(sys[0].starts_with("Started monitor process"));
        assert!(sys.last().unwrap().contains("exited with code 1"));
        assert_eq!(supervisor.status().await, MonitorStatus::default());
    }

    #[tokio::test]
    async fn test_launch_args_reach_the_monitor() {
        let supervisor = shell(r#"printf '%s\n' "$*""#);
        let request: LaunchRequest =
            serde_json::from_str(r#"{"continuous": true, "interval": 5}"#).unwrap();

        supervisor.start(&request).await.unwrap();
        assert!(supervisor.wait_for_exit(EXIT_TIMEOUT).await);

        assert_eq!(texts(supervisor.logs(), LogSource::Out), vec!["-c -i 5"]);
    }

    #[tokio::test]
    async fn test_restart_after_exit() {
        let supervisor = shell("exit 0");
        let first = supervisor.start_with_args(vec![]).await.unwrap();
        assert!(supervisor.wait_for_exit(EXIT_TIMEOUT).await);

        let second = supervisor.start_with_args(vec![]).await.unwrap();
        assert_ne!(first, second);
        assert!(supervisor.wait_for_exit(EXIT_TIMEOUT).await);
    }

    #[tokio::test]
    async fn test_stop_after_exit_is_not_running() {
        let supervisor = shell("exit 3");
        supervisor.start_with_args(vec![]).await.unwrap();
        assert!(supervisor.wait_for_exit(EXIT_TIMEOUT).await);

        assert!(matches!(supervisor.stop().await, Err(Error::NotRunning)));
    }

    #[tokio::test]
    async fn test_repeated_stop_while_exiting() {
        let supervisor = shell("trap '' TERM; sleep 1");
        let pid = supervisor.start_with_args(vec![]).await.unwrap();

        assert_eq!(supervisor.stop().await.unwrap(), pid);
        // The shell ignores TERM, so a second request still finds it running.
        assert_eq!(supervisor.stop().await.unwrap(), pid);
        assert!(supervisor.wait_for_exit(EXIT_TIMEOUT).await);
    }

    #[tokio::test]
    async fn test_idle_as_soon_as_child_exits_with_open_pipes() {
        // The background sleep keeps stdout open after the shell exits.
        let supervisor = shell("sleep 3 & exit 1");
        let first = supervisor.start_with_args(vec![]).await.unwrap();

        let deadline = tokio::time::Instant::now() + Duration::from_millis(200);
        while supervisor.status().await.running {
            assert!(
                tokio::time::Instant::now() < deadline,
                "exited pid still reported as running"
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(supervisor.status().await, MonitorStatus::default());
        assert!(matches!(supervisor.stop().await, Err(Error::NotRunning)));

        let second = supervisor.start_with_args(vec![]).await.unwrap();
        assert_ne!(first, second);

        assert!(supervisor.wait_for_exit(EXIT_TIMEOUT).await);
        let exits = texts(supervisor.logs(), LogSource::Sys)
            .into_iter()
            .filter(|t| t.contains("exited with code 1"))
            .count();
        assert_eq!(exits, 2);
    }

    #[tokio::test]
    async fn test_running_takes_precedence_over_invalid_request() {
        let supervisor = shell("exec sleep 5");
        let pid = supervisor.start_with_args(vec![]).await.unwrap();

        let invalid = LaunchRequest {
            interval: Some(0.0),
            ..Default::default()
        };
        assert!(matches!(
            supervisor.start(&invalid).await,
            Err(Error::AlreadyRunning { pid: p }) if p == pid
        ));

        supervisor.stop().await.unwrap();
        assert!(supervisor.wait_for_exit(EXIT_TIMEOUT).await);
    }

    #[tokio::test]
    async fn test_shutdown_stops_running_monitor() {
        let supervisor = shell("exec sleep 5");
        supervisor.start_with_args(vec![]).await.unwrap();

        supervisor.shutdown(EXIT_TIMEOUT).await;
        assert!(!supervisor.status().await.running);
    }

    #[test]
    fn test_describe_exit_code() {
        use std::os::unix::process::ExitStatusExt;
        let status = ExitStatus::from_raw(1 << 8);
        assert_eq!(
            describe_exit(42, &Ok(status)),
            "Monitor process 42 exited with code 1"
        );
        let signalled = ExitStatus::from_raw(15);
        assert_eq!(
            describe_exit(42, &Ok(signalled)),
            "Monitor process 42 terminated by signal 15"
        );
    }
}
