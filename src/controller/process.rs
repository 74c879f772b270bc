//! Handle to one launched service process

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::time::Duration;

use serde::Serialize;
use tokio::process::Child;

use super::state::LifecycleState;
use crate::bench::serialize_millis;
use crate::errors::HarnessResult;

/// A launched service process
///
/// Owned by the caller but only mutated through `ServiceController`.
#[derive(Debug)]
pub struct ServiceProcess {
    pub(super) pid: u32,
    pub(super) args: Vec<String>,
    pub(super) state: LifecycleState,
    pub(super) child: Option<Child>,
    pub(super) log_path: PathBuf,
    pub(super) exit: Option<ExitStatus>,
}

impl ServiceProcess {
    /// OS process identifier
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Startup arguments the process was launched with
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Current lifecycle state
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// File receiving the process's stdout and stderr
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Exit status once reaped
    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.exit
    }

    /// Captured output so far (lossy UTF-8)
    pub fn read_log(&self) -> HarnessResult<String> {
        let bytes = fs::read(&self.log_path)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// How a process ended
#[derive(Debug, Clone, Serialize)]
pub struct ExitReport {
    /// Process that exited
    pub pid: u32,
    /// Exit code, `None` when killed by a signal
    pub code: Option<i32>,
    /// Whether a graceful stop had to be escalated to a forced kill
    pub escalated: bool,
    /// Whether the harness killed the process
    pub forced: bool,
    /// Time from the stop request to confirmed exit
    #[serde(serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}
