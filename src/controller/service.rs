//! Service lifecycle control
//!
//! Launch, wait for readiness, stop gracefully or kill outright, reap.
//! A forced kill goes straight to the platform primitive (`SIGKILL` /
//! `TerminateProcess`) so the target never gets to flush buffered state.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tokio::process::Command;

use super::process::{ExitReport, ServiceProcess};
use super::state::LifecycleState;
use crate::client::KvClient;
use crate::config::HarnessConfig;
use crate::errors::{HarnessError, HarnessResult};
use crate::observability::{log_event, Event, Logger};

/// Owns every process the harness launches
pub struct ServiceController {
    binary: PathBuf,
    working_dir: Option<PathBuf>,
    log_dir: PathBuf,
    state_files: Vec<PathBuf>,
    client: KvClient,
    startup_retries: u32,
    poll_interval: Duration,
    graceful_timeout: Duration,
    launches: AtomicU32,
    /// Live processes by pid; entries leave on confirmed exit
    table: Mutex<BTreeMap<u32, PathBuf>>,
}

impl ServiceController {
    /// Create a controller from harness configuration
    pub fn new(config: &HarnessConfig) -> HarnessResult<Self> {
        Ok(Self {
            binary: config.service_binary.clone(),
            working_dir: config.working_dir.clone(),
            log_dir: config.log_dir.clone(),
            state_files: config.state_files.clone(),
            client: KvClient::from_config(config)?,
            startup_retries: config.startup_retries,
            poll_interval: config.startup_poll_interval(),
            graceful_timeout: config.graceful_stop_timeout(),
            launches: AtomicU32::new(0),
            table: Mutex::new(BTreeMap::new()),
        })
    }

    /// Client bound to the controlled service
    pub fn client(&self) -> &KvClient {
        &self.client
    }

    /// Pids launched and not yet confirmed exited
    pub fn live_pids(&self) -> Vec<u32> {
        self.table
            .lock()
            .map(|t| t.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Remove the configured service state files; missing files are fine
    ///
    /// Only valid while nothing is running against that state.
    pub fn clean_state(&self) -> HarnessResult<()> {
        for file in &self.state_files {
            let path = match &self.working_dir {
                Some(dir) if file.is_relative() => dir.join(file),
                _ => file.clone(),
            };
            match fs::remove_file(&path) {
                Ok(()) => Logger::info(
                    "SERVICE_STATE_REMOVED",
                    &[("path", &path.display().to_string())],
                ),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Launch the service and block until its health probe answers
    ///
    /// Fails with `StartupTimeout` once the retry budget is spent (the
    /// child is killed first) or `ProcessExitedEarly` if it dies while
    /// starting.
    pub async fn launch(&self, args: &[String]) -> HarnessResult<ServiceProcess> {
        fs::create_dir_all(&self.log_dir)?;
        let seq = self.launches.fetch_add(1, Ordering::Relaxed);
        let log_path = self.log_dir.join(format!("service-{:03}.log", seq));
        let log = File::create(&log_path)?;

        let mut command = Command::new(&self.binary);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log.try_clone()?))
            .stderr(Stdio::from(log))
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        let spawn_err = |reason: String| HarnessError::Spawn {
            binary: self.binary.display().to_string(),
            reason,
        };
        let child = command.spawn().map_err(|e| spawn_err(e.to_string()))?;
        let pid = child
            .id()
            .ok_or_else(|| spawn_err("child exited before reporting a pid".into()))?;

        let mut proc = ServiceProcess {
            pid,
            args: args.to_vec(),
            state: LifecycleState::NotStarted,
            child: Some(child),
            log_path: log_path.clone(),
            exit: None,
        };
        proc.state.transition(LifecycleState::Starting)?;
        self.register(pid, log_path);

        let pid_str = pid.to_string();
        let args_str = args.join(" ");
        log_event(
            Event::ServiceLaunch,
            &[("pid", &pid_str), ("args", &args_str)],
        );

        self.wait_ready(&mut proc).await?;
        Ok(proc)
    }

    async fn wait_ready(&self, proc: &mut ServiceProcess) -> HarnessResult<()> {
        let started = Instant::now();

        for attempt in 1..=self.startup_retries {
            if let Some(child) = proc.child.as_mut() {
                if let Some(status) = child.try_wait()? {
                    proc.child = None;
                    proc.exit = Some(status);
                    proc.state.transition(LifecycleState::Exited)?;
                    self.unregister(proc.pid);
                    return Err(HarnessError::ProcessExitedEarly {
                        status: status.to_string(),
                    });
                }
            }

            match self.client.health().await {
                Ok(()) => {
                    proc.state.transition(LifecycleState::Ready)?;
                    let attempts = attempt.to_string();
                    let waited = started.elapsed().as_millis().to_string();
                    log_event(
                        Event::ServiceReady,
                        &[
                            ("attempts", &attempts),
                            ("pid", &proc.pid.to_string()),
                            ("waited_ms", &waited),
                        ],
                    );
                    return Ok(());
                }
                Err(e) => {
                    Logger::trace(
                        "SERVICE_HEALTH_PROBE",
                        &[("attempt", &attempt.to_string()), ("error", &e.to_string())],
                    );
                }
            }

            tokio::time::sleep(self.poll_interval).await;
        }

        let waited_ms = started.elapsed().as_millis() as u64;
        log_event(
            Event::ServiceStartupTimeout,
            &[("pid", &proc.pid.to_string()), ("waited_ms", &waited_ms.to_string())],
        );
        self.kill(proc).await?;
        Err(HarnessError::StartupTimeout {
            attempts: self.startup_retries,
            waited_ms,
        })
    }

    /// Mark a ready process as carrying load
    pub fn mark_running(&self, proc: &mut ServiceProcess) -> HarnessResult<()> {
        if proc.state == LifecycleState::Running {
            return Ok(());
        }
        proc.state.transition(LifecycleState::Running)
    }

    /// Stop a process
    ///
    /// `graceful = true` sends a polite stop signal and escalates to a
    /// forced kill after the configured budget. `graceful = false` kills
    /// immediately by pid.
    pub async fn terminate(
        &self,
        proc: &mut ServiceProcess,
        graceful: bool,
    ) -> HarnessResult<ExitReport> {
        if graceful {
            let timeout = self.graceful_timeout;
            self.stop(proc, timeout).await
        } else {
            self.kill(proc).await
        }
    }

    async fn stop(&self, proc: &mut ServiceProcess, timeout: Duration) -> HarnessResult<ExitReport> {
        if proc.child.is_none() {
            return Ok(already_exited(proc));
        }
        proc.state.transition(LifecycleState::Stopped)?;
        log_event(Event::ServiceStopRequested, &[("pid", &proc.pid.to_string())]);

        if let Err(e) = send_graceful_signal(proc.pid).await {
            // Not fatal: await_exit escalates when the process ignores us.
            Logger::warn(
                "SERVICE_STOP_SIGNAL_FAILED",
                &[("pid", &proc.pid.to_string()), ("error", &e.to_string())],
            );
        }

        self.await_exit(proc, timeout).await
    }

    /// Kill immediately, then reap
    async fn kill(&self, proc: &mut ServiceProcess) -> HarnessResult<ExitReport> {
        let started = Instant::now();
        let Some(child) = proc.child.as_mut() else {
            return Ok(already_exited(proc));
        };

        // start_kill is SIGKILL on Unix and TerminateProcess on Windows.
        if let Err(e) = child.start_kill() {
            // InvalidInput means it was already reaped by try_wait.
            Logger::warn(
                "SERVICE_KILL_FAILED",
                &[("pid", &proc.pid.to_string()), ("error", &e.to_string())],
            );
        }
        proc.state.transition(LifecycleState::Killed)?;
        log_event(Event::ServiceKilled, &[("pid", &proc.pid.to_string())]);

        let status = child.wait().await?;
        let mut report = self.confirm_exit(proc, status, started);
        report.forced = true;
        Ok(report)
    }

    /// Wait for exit; escalate to a forced kill once `timeout` passes
    ///
    /// Escalation is logged as a termination failure but never aborts the run.
    pub async fn await_exit(
        &self,
        proc: &mut ServiceProcess,
        timeout: Duration,
    ) -> HarnessResult<ExitReport> {
        let started = Instant::now();
        let Some(child) = proc.child.as_mut() else {
            return Ok(already_exited(proc));
        };

        match tokio::time::timeout(timeout, child.wait()).await {
            Ok(status) => {
                let status = status?;
                Ok(self.confirm_exit(proc, status, started))
            }
            Err(_) => {
                let failure = HarnessError::ProcessTerminationFailure {
                    pid: proc.pid,
                    waited: timeout,
                };
                Logger::warn(
                    Event::ServiceStopEscalated.as_str(),
                    &[("code", failure.code()), ("reason", &failure.to_string())],
                );
                let mut report = self.kill(proc).await?;
                report.escalated = true;
                report.elapsed = started.elapsed();
                Ok(report)
            }
        }
    }

    /// Launch again with the same arguments
    pub async fn restart(&self, proc: &ServiceProcess) -> HarnessResult<ServiceProcess> {
        self.launch(&proc.args).await
    }

    fn confirm_exit(
        &self,
        proc: &mut ServiceProcess,
        status: std::process::ExitStatus,
        started: Instant,
    ) -> ExitReport {
        proc.child = None;
        proc.exit = Some(status);
        if proc.state.is_live() {
            // Every live state may move to Exited.
            let _ = proc.state.transition(LifecycleState::Exited);
        }
        self.unregister(proc.pid);

        let code = status.code();
        log_event(
            Event::ServiceExited,
            &[
                ("code", &code.map(|c| c.to_string()).unwrap_or_else(|| "signal".into())),
                ("pid", &proc.pid.to_string()),
            ],
        );

        ExitReport {
            pid: proc.pid,
            code,
            escalated: false,
            forced: false,
            elapsed: started.elapsed(),
        }
    }

    fn register(&self, pid: u32, log: PathBuf) {
        if let Ok(mut table) = self.table.lock() {
            table.insert(pid, log);
        }
    }

    fn unregister(&self, pid: u32) {
        if let Ok(mut table) = self.table.lock() {
            table.remove(&pid);
        }
    }
}

fn already_exited(proc: &ServiceProcess) -> ExitReport {
    ExitReport {
        pid: proc.pid,
        code: proc.exit.and_then(|s| s.code()),
        escalated: false,
        forced: false,
        elapsed: Duration::ZERO,
    }
}

#[cfg(unix)]
async fn send_graceful_signal(pid: u32) -> std::io::Result<()> {
    let status = Command::new("kill")
        .args(["-TERM", &pid.to_string()])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await?;
    if status.success() {
        Ok(())
    } else {
        Err(std::io::Error::other(format!("kill -TERM exited with {}", status)))
    }
}

#[cfg(windows)]
async fn send_graceful_signal(pid: u32) -> std::io::Result<()> {
    // taskkill without /F asks the process to close.
    let status = Command::new("taskkill")
        .args(["/PID", &pid.to_string()])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await?;
    if status.success() {
        Ok(())
    } else {
        Err(std::io::Error::other(format!("taskkill exited with {}", status)))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn config_for(binary: &str, dir: &std::path::Path) -> HarnessConfig {
        HarnessConfig {
            service_binary: PathBuf::from(binary),
            // Nothing listens on the discard port, so health never succeeds.
            base_url: "http://127.0.0.1:9".into(),
            log_dir: dir.to_path_buf(),
            request_timeout_ms: 100,
            startup_retries: 3,
            startup_poll_interval_ms: 20,
            graceful_stop_timeout_ms: 500,
            ..HarnessConfig::default()
        }
    }

    #[tokio::test]
    async fn test_startup_timeout_kills_child() {
        let dir = tempfile::tempdir().unwrap();
        let controller = ServiceController::new(&config_for("sleep", dir.path())).unwrap();

        let err = controller.launch(&["30".to_string()]).await.unwrap_err();
        match err {
            HarnessError::StartupTimeout { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("expected StartupTimeout, got {:?}", other),
        }
        assert!(controller.live_pids().is_empty());
    }

    #[tokio::test]
    async fn test_early_exit_detected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_for("true", dir.path());
        config.startup_retries = 50;
        config.startup_poll_interval_ms = 50;
        let controller = ServiceController::new(&config).unwrap();

        let err = controller.launch(&[]).await.unwrap_err();
        assert_eq!(err.code(), "FAULTLINE_PROCESS_EXITED_EARLY");
        assert!(controller.live_pids().is_empty());
    }

    #[test]
    fn test_clean_state_removes_listed_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("data.wal"), b"stale").unwrap();
        let mut config = config_for("sleep", dir.path());
        config.working_dir = Some(dir.path().to_path_buf());
        config.state_files = vec![PathBuf::from("data.wal"), PathBuf::from("absent.wal")];

        let controller = ServiceController::new(&config).unwrap();
        controller.clean_state().unwrap();
        assert!(!dir.path().join("data.wal").exists());
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let dir = tempfile::tempdir().unwrap();
        let controller =
            ServiceController::new(&config_for("/definitely/not/a/binary", dir.path())).unwrap();
        let err = controller.launch(&[]).await.unwrap_err();
        assert_eq!(err.code(), "FAULTLINE_SPAWN_FAILED");
    }
}
