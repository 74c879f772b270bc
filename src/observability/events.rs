//! Observable harness events
//!
//! Events are explicit and typed; the logger only ever sees their
//! `as_str()` names.

use std::fmt;

/// Harness lifecycle events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Service lifecycle
    /// Child process spawned
    ServiceLaunch,
    /// Health probe answered 200
    ServiceReady,
    /// Health probe never answered
    ServiceStartupTimeout,
    /// Graceful stop requested
    ServiceStopRequested,
    /// Graceful stop ran out of budget, forcing
    ServiceStopEscalated,
    /// Forced kill issued
    ServiceKilled,
    /// Exit confirmed and reaped
    ServiceExited,

    // Load and fault injection
    /// Write burst running
    LoadBurstStarted,
    /// All load tasks joined
    LoadBurstJoined,
    /// Fault scheduler fired the kill
    FaultKillIssued,

    // Recovery
    /// Recovered key disagrees with its payload
    RecoveryCorruption,
    /// Key-space scan finished
    RecoveryScanComplete,
    /// Sentinel survived
    SentinelRecovered,
    /// Sentinel missing after restart
    SentinelLost,

    // Metrics
    /// One metrics poll folded into the running max
    MetricsSample,

    // Verdict
    /// Scenario verdict reached
    CycleVerdict,
}

impl Event {
    /// Returns the event name
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ServiceLaunch => "SERVICE_LAUNCH",
            Event::ServiceReady => "SERVICE_READY",
            Event::ServiceStartupTimeout => "SERVICE_STARTUP_TIMEOUT",
            Event::ServiceStopRequested => "SERVICE_STOP_REQUESTED",
            Event::ServiceStopEscalated => "SERVICE_STOP_ESCALATED",
            Event::ServiceKilled => "SERVICE_KILLED",
            Event::ServiceExited => "SERVICE_EXITED",
            Event::LoadBurstStarted => "LOAD_BURST_STARTED",
            Event::LoadBurstJoined => "LOAD_BURST_JOINED",
            Event::FaultKillIssued => "FAULT_KILL_ISSUED",
            Event::RecoveryCorruption => "RECOVERY_CORRUPTION",
            Event::RecoveryScanComplete => "RECOVERY_SCAN_COMPLETE",
            Event::SentinelRecovered => "SENTINEL_RECOVERED",
            Event::SentinelLost => "SENTINEL_LOST",
            Event::MetricsSample => "METRICS_SAMPLE",
            Event::CycleVerdict => "CYCLE_VERDICT",
        }
    }

    /// Events that end the current cycle
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Event::ServiceStartupTimeout | Event::SentinelLost | Event::RecoveryCorruption
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
