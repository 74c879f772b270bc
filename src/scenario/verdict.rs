//! Verdicts and cycle reports

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::errors::HarnessError;
use crate::observability::{log_event, Event};

/// Outcome of one scenario cycle, ordered from best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Pass,
    Warning,
    Fail,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Pass => "PASS",
            Verdict::Warning => "WARNING",
            Verdict::Fail => "FAIL",
        }
    }

    /// The worse of two verdicts
    pub fn worst(self, other: Verdict) -> Verdict {
        self.max(other)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observation that shaped a verdict
///
/// `Pass` findings are informational.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub severity: Verdict,
    /// Error code when the finding comes from a `HarnessError`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
    pub message: String,
}

/// Everything one scenario cycle produced
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    /// Shared by every cycle of one invocation
    pub run_id: Uuid,
    pub scenario: String,
    /// 1-based cycle number
    pub cycle: u32,
    pub started_at: DateTime<Utc>,
    pub verdict: Verdict,
    pub findings: Vec<Finding>,
    /// Scenario-specific measurements
    pub data: Value,
}

impl CycleReport {
    /// A passing report with no findings yet
    pub fn new(run_id: Uuid, scenario: &str, cycle: u32) -> Self {
        Self {
            run_id,
            scenario: scenario.to_string(),
            cycle,
            started_at: Utc::now(),
            verdict: Verdict::Pass,
            findings: Vec::new(),
            data: Value::Null,
        }
    }

    /// Record a finding; the verdict only ever gets worse
    pub fn note(&mut self, severity: Verdict, message: impl Into<String>) {
        self.verdict = self.verdict.worst(severity);
        self.findings.push(Finding {
            severity,
            code: None,
            message: message.into(),
        });
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.note(Verdict::Pass, message);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.note(Verdict::Warning, message);
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.note(Verdict::Fail, message);
    }

    /// Record an error at the given severity, keeping its code
    pub fn error(&mut self, severity: Verdict, err: &HarnessError) {
        self.verdict = self.verdict.worst(severity);
        self.findings.push(Finding {
            severity,
            code: Some(err.code()),
            message: err.to_string(),
        });
    }

    /// An error escaped a phase and ended the cycle
    ///
    /// Fatal errors fail it. A non-fatal one (a timeout, an odd status)
    /// leaves the cycle inconclusive, which is a WARNING.
    pub fn abort(&mut self, err: &HarnessError) {
        let severity = if err.is_fatal() {
            Verdict::Fail
        } else {
            Verdict::Warning
        };
        self.error(severity, err);
    }

    /// Log the verdict and hand the report back
    pub fn finish(self) -> Self {
        let cycle = self.cycle.to_string();
        let findings = self.findings.len().to_string();
        log_event(
            Event::CycleVerdict,
            &[
                ("cycle", &cycle),
                ("findings", &findings),
                ("run_id", &self.run_id.to_string()),
                ("scenario", &self.scenario),
                ("verdict", self.verdict.as_str()),
            ],
        );
        self
    }

    pub fn is_failure(&self) -> bool {
        self.verdict == Verdict::Fail
    }
}

/// Worst verdict across several reports; `Pass` when empty
pub fn overall(reports: &[CycleReport]) -> Verdict {
    reports
        .iter()
        .map(|r| r.verdict)
        .fold(Verdict::Pass, Verdict::worst)
}
