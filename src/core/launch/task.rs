// ─── Process Supervisor ───
// Spawns the game, forwards its merged output and tracks its exit.

use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::arguments::LaunchPlan;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::sinks::LogSink;

pub const DEFAULT_EARLY_EXIT_GRACE: Duration = Duration::from_secs(3);

/// How long an exited game may keep its output pipes busy before the exit is
/// reported anyway.
const LOG_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    NotStarted,
    Running,
    ExitedClean,
    /// `None` when the process was ended by a signal.
    ExitedNonZero { exit_code: Option<i32> },
    /// Exited with a failure inside the grace window.
    FailedEarly { exit_code: Option<i32> },
}

impl ProcessState {
    pub fn is_finished(&self) -> bool {
        !matches!(self, ProcessState::NotStarted | ProcessState::Running)
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ProcessState::ExitedClean => Some(0),
            ProcessState::ExitedNonZero { exit_code } | ProcessState::FailedEarly { exit_code } => {
                *exit_code
            }
            ProcessState::NotStarted | ProcessState::Running => None,
        }
    }

    fn after_exit(status: ExitStatus) -> Self {
        if status.success() {
            ProcessState::ExitedClean
        } else {
            ProcessState::ExitedNonZero {
                exit_code: status.code(),
            }
        }
    }
}

/// A game process that survived the grace window (or exited cleanly in it).
pub struct RunningInstance {
    pub pid: Option<u32>,
    pub started_at: DateTime<Utc>,
    state: watch::Receiver<ProcessState>,
}

impl RunningInstance {
    pub fn state(&self) -> ProcessState {
        *self.state.borrow()
    }

    /// Another handle on the state, for listeners that outlive `self`.
    pub fn subscribe(&self) -> watch::Receiver<ProcessState> {
        self.state.clone()
    }

    /// Resolves once the process has exited.
    pub async fn wait(&mut self) -> ProcessState {
        if let Ok(state) = self.state.wait_for(ProcessState::is_finished).await {
            return *state;
        }
        *self.state.borrow()
    }
}

pub struct ProcessSupervisor {
    grace: Duration,
    log_sink: Arc<dyn LogSink>,
}

impl ProcessSupervisor {
    pub fn new(log_sink: Arc<dyn LogSink>) -> Self {
        Self {
            grace: DEFAULT_EARLY_EXIT_GRACE,
            log_sink,
        }
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Spawns `plan`. Fails with `MissingJavaExecutable` before spawning if
    /// the executable does not exist, and with `LaunchFailedEarly` if the
    /// process exits unsuccessfully within the grace window.
    pub async fn launch(&self, plan: &LaunchPlan) -> LauncherResult<RunningInstance> {
        if !plan.java.is_file() {
            return Err(LauncherError::MissingJavaExecutable(plan.java.clone()));
        }

        let (state_tx, state) = watch::channel(ProcessState::NotStarted);

        let mut cmd = Command::new(&plan.java);
        cmd.args(&plan.args)
            .current_dir(&plan.working_dir)
            .envs(plan.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        info!("Launching game with Java: {:?}", plan.java);
        debug!("Command (copy/paste): {}", plan.format_for_logs());

        let mut child = cmd
            .spawn()
            .map_err(|e| LauncherError::JavaExecution(e.to_string()))?;
        let pid = child.id();
        let started_at = Utc::now();
        state_tx.send_replace(ProcessState::Running);
        info!("Game process started (pid {:?})", pid);

        // Both streams feed one channel; a single forwarder writes the sink.
        let (tx, rx) = mpsc::unbounded_channel();
        if let Some(stdout) = child.stdout.take() {
            spawn_line_reader(stdout, tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_line_reader(stderr, tx.clone());
        }
        drop(tx);
        let forwarder = spawn_forwarder(rx, self.log_sink.clone());

        let waited = tokio::time::timeout(self.grace, child.wait()).await;
        match waited {
            Ok(Ok(status)) if status.success() => {
                info!("Game exited cleanly during startup");
                state_tx.send_replace(ProcessState::ExitedClean);
                Ok(RunningInstance {
                    pid,
                    started_at,
                    state,
                })
            }
            Ok(Ok(status)) => {
                let _ = tokio::time::timeout(LOG_DRAIN_TIMEOUT, forwarder).await;
                let state = ProcessState::FailedEarly {
                    exit_code: status.code(),
                };
                warn!("Game failed during startup: {:?}", state);
                Err(LauncherError::LaunchFailedEarly {
                    exit_code: state.exit_code(),
                })
            }
            Ok(Err(e)) => Err(LauncherError::JavaExecution(e.to_string())),
            Err(_) => {
                tokio::spawn(async move {
                    let final_state = match child.wait().await {
                        Ok(status) => ProcessState::after_exit(status),
                        Err(e) => {
                            warn!("Lost track of game process: {}", e);
                            ProcessState::ExitedNonZero { exit_code: None }
                        }
                    };
                    let _ = tokio::time::timeout(LOG_DRAIN_TIMEOUT, forwarder).await;
                    info!("Game exited: {:?}", final_state);
                    let _ = state_tx.send(final_state);
                });
                Ok(RunningInstance {
                    pid,
                    started_at,
                    state,
                })
            }
        }
    }
}

fn spawn_line_reader<R>(stream: R, tx: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    debug!("Game output stream closed: {}", e);
                    break;
                }
            }
        }
    });
}

fn spawn_forwarder(
    mut rx: mpsc::UnboundedReceiver<String>,
    sink: Arc<dyn LogSink>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            debug!(target: "game", "{}", line);
            sink.append_line(&line);
        }
    })
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use super::*;
    use crate::core::sinks::ChannelLogSink;

    fn shell_plan(script: &str, cwd: &Path) -> LaunchPlan {
        LaunchPlan {
            java: PathBuf::from("/bin/sh"),
            args: vec!["-c".into(), script.into()],
            working_dir: cwd.to_path_buf(),
            env: vec![("game_directory".into(), "/games/mc".into())],
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<String> {
        let mut lines = Vec::new();
        while let Ok(line) = rx.try_recv() {
            lines.push(line);
        }
        lines
    }

    #[tokio::test]
    async fn missing_java_fails_before_spawning() {
        let dir = tempfile::tempdir().unwrap();
        let (sink, mut rx) = ChannelLogSink::new();
        let supervisor = ProcessSupervisor::new(Arc::new(sink));
        let plan = LaunchPlan {
            java: dir.path().join("jdk").join("bin").join("java"),
            args: vec!["-version".into()],
            working_dir: dir.path().to_path_buf(),
            env: Vec::new(),
        };

        let err = supervisor.launch(&plan).await.err().unwrap();

        assert!(matches!(err, LauncherError::MissingJavaExecutable(_)));
        assert!(drain(&mut rx).is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn quick_failure_is_reported_as_early_exit_with_output() {
        let dir = tempfile::tempdir().unwrap();
        let (sink, mut rx) = ChannelLogSink::new();
        let supervisor =
            ProcessSupervisor::new(Arc::new(sink)).with_grace(Duration::from_secs(5));

        let err = supervisor
            .launch(&shell_plan("echo starting; echo boom >&2; exit 1", dir.path()))
            .await
            .err()
            .unwrap();

        assert!(matches!(
            err,
            LauncherError::LaunchFailedEarly { exit_code: Some(1) }
        ));
        let lines = drain(&mut rx);
        assert!(lines.contains(&"starting".to_string()));
        assert!(lines.contains(&"boom".to_string()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn clean_exit_inside_grace_is_not_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        let (sink, _rx) = ChannelLogSink::new();
        let supervisor = ProcessSupervisor::new(Arc::new(sink));

        let mut instance = supervisor
            .launch(&shell_plan("exit 0", dir.path()))
            .await
            .unwrap();

        assert_eq!(instance.state(), ProcessState::ExitedClean);
        assert_eq!(instance.wait().await.exit_code(), Some(0));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn long_running_process_is_returned_live_and_reports_exit() {
        let dir = tempfile::tempdir().unwrap();
        let (sink, mut rx) = ChannelLogSink::new();
        let supervisor =
            ProcessSupervisor::new(Arc::new(sink)).with_grace(Duration::from_millis(100));

        let mut instance = supervisor
            .launch(&shell_plan(
                "sleep 1; echo \"dir=$game_directory\"; pwd; exit 3",
                dir.path(),
            ))
            .await
            .unwrap();

        assert_eq!(instance.state(), ProcessState::Running);
        assert!(instance.pid.is_some());

        let final_state = instance.wait().await;
        assert_eq!(
            final_state,
            ProcessState::ExitedNonZero { exit_code: Some(3) }
        );

        let lines = drain(&mut rx);
        assert!(lines.contains(&"dir=/games/mc".to_string()));
        let cwd = std::fs::canonicalize(dir.path()).unwrap();
        assert!(lines
            .iter()
            .any(|l| std::fs::canonicalize(l).map(|p| p == cwd).unwrap_or(false)));
    }

    #[test]
    fn terminal_states() {
        assert!(!ProcessState::NotStarted.is_finished());
        assert!(!ProcessState::Running.is_finished());
        assert!(ProcessState::ExitedClean.is_finished());
        assert_eq!(
            ProcessState::FailedEarly { exit_code: Some(1) }.exit_code(),
            Some(1)
        );
    }
}
