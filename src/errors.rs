//! Harness error taxonomy
//!
//! Every error carries a stable machine code (`FAULTLINE_*`) and a fatality
//! class. Fatal errors abort the current test cycle and surface as a FAIL
//! verdict; non-fatal errors are absorbed into counters or findings.

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::controller::LifecycleState;

/// Result type used across the harness
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Harness errors
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Health probe never succeeded within the retry budget
    #[error("service not ready after {attempts} health probes ({waited_ms}ms)")]
    StartupTimeout { attempts: u32, waited_ms: u64 },

    /// Connection refused, reset or timed out
    #[error("transient network error on {endpoint}: {reason}")]
    TransientNetwork { endpoint: String, reason: String },

    /// A recovered key carries a payload that disagrees with what was written
    #[error("integrity violation at key '{key}': expected {expected}, found {found}")]
    IntegrityViolation {
        key: String,
        expected: String,
        found: String,
    },

    /// A key written before the fault window did not survive the restart
    #[error("sentinel key '{key}' lost across restart (status {status})")]
    SentinelLoss { key: String, status: String },

    /// Graceful stop did not finish within its wait budget
    #[error("process {pid} ignored graceful stop for {}ms; forced kill issued", waited.as_millis())]
    ProcessTerminationFailure { pid: u32, waited: Duration },

    /// The service answered with a status the contract does not allow
    #[error("unexpected status {status} from {endpoint}")]
    UnexpectedStatus { endpoint: String, status: u16 },

    /// The child exited while the harness was still waiting for readiness
    #[error("service exited during startup with {status}")]
    ProcessExitedEarly { status: String },

    /// The service binary could not be spawned at all
    #[error("failed to spawn '{binary}': {reason}")]
    Spawn { binary: String, reason: String },

    /// A lifecycle move the state machine forbids
    #[error("invalid lifecycle transition {from:?} -> {to:?}")]
    InvalidTransition {
        from: LifecycleState,
        to: LifecycleState,
    },

    /// Invalid harness configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Local I/O (log capture, config read)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl HarnessError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            HarnessError::StartupTimeout { .. } => "FAULTLINE_STARTUP_TIMEOUT",
            HarnessError::TransientNetwork { .. } => "FAULTLINE_TRANSIENT_NETWORK",
            HarnessError::IntegrityViolation { .. } => "FAULTLINE_INTEGRITY_VIOLATION",
            HarnessError::SentinelLoss { .. } => "FAULTLINE_SENTINEL_LOSS",
            HarnessError::ProcessTerminationFailure { .. } => {
                "FAULTLINE_PROCESS_TERMINATION_FAILURE"
            }
            HarnessError::UnexpectedStatus { .. } => "FAULTLINE_UNEXPECTED_STATUS",
            HarnessError::ProcessExitedEarly { .. } => "FAULTLINE_PROCESS_EXITED_EARLY",
            HarnessError::Spawn { .. } => "FAULTLINE_SPAWN_FAILED",
            HarnessError::InvalidTransition { .. } => "FAULTLINE_INVALID_TRANSITION",
            HarnessError::Config(_) => "FAULTLINE_CONFIG_ERROR",
            HarnessError::Io(_) => "FAULTLINE_IO_ERROR",
        }
    }

    /// Whether this error fails the cycle it occurs in
    ///
    /// Non-fatal errors are counted or reported; one that still cuts a
    /// cycle short leaves it inconclusive rather than failed.
    pub fn is_fatal(&self) -> bool {
        match self {
            HarnessError::TransientNetwork { .. }
            | HarnessError::IntegrityViolation { .. }
            | HarnessError::ProcessTerminationFailure { .. }
            | HarnessError::UnexpectedStatus { .. } => false,
            HarnessError::StartupTimeout { .. }
            | HarnessError::SentinelLoss { .. }
            | HarnessError::ProcessExitedEarly { .. }
            | HarnessError::Spawn { .. }
            | HarnessError::InvalidTransition { .. }
            | HarnessError::Config(_)
            | HarnessError::Io(_) => true,
        }
    }

    /// Transport-level failure helper
    pub fn transient(endpoint: impl Into<String>, reason: impl ToString) -> Self {
        HarnessError::TransientNetwork {
            endpoint: endpoint.into(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_prefixed() {
        let errors = vec![
            HarnessError::StartupTimeout {
                attempts: 3,
                waited_ms: 1500,
            },
            HarnessError::transient("/kv/health", "connection refused"),
            HarnessError::SentinelLoss {
                key: "sentinel".into(),
                status: "404".into(),
            },
            HarnessError::Config("bad".into()),
        ];

        for err in errors {
            assert!(err.code().starts_with("FAULTLINE_"), "{}", err.code());
        }
    }

    #[test]
    fn test_fatality_split() {
        assert!(HarnessError::StartupTimeout {
            attempts: 1,
            waited_ms: 0
        }
        .is_fatal());
        assert!(HarnessError::SentinelLoss {
            key: "s".into(),
            status: "404".into()
        }
        .is_fatal());

        assert!(!HarnessError::transient("/kv/x", "timeout").is_fatal());
        assert!(!HarnessError::IntegrityViolation {
            key: "crash_3".into(),
            expected: "index 3".into(),
            found: "index 7".into()
        }
        .is_fatal());
        assert!(!HarnessError::ProcessTerminationFailure {
            pid: 42,
            waited: Duration::from_secs(5)
        }
        .is_fatal());
    }

    #[test]
    fn test_display_mentions_key() {
        let err = HarnessError::IntegrityViolation {
            key: "crash_9".into(),
            expected: "index 9".into(),
            found: "index 8".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("crash_9"));
        assert!(msg.contains("expected index 9"));
    }
}
