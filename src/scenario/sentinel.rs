//! Sentinel survival across a kill that lands inside one large write

use std::time::Duration;

use serde_json::{json, Value};
use uuid::Uuid;

use super::retire;
use super::verdict::{CycleReport, Verdict};
use crate::controller::ServiceController;
use crate::errors::{HarnessError, HarnessResult};
use crate::fault::{Burst, FaultScheduler, KillWindow};
use crate::observability::PhaseScope;
use crate::recovery::{ControlCheck, ControlOutcome, RecoveryVerifier};

/// Sentinel scenario parameters
#[derive(Debug, Clone)]
pub struct SentinelParams {
    pub args: Vec<String>,
    /// Written and acknowledged before the fault window opens
    pub sentinel_key: String,
    pub sentinel_value: Value,
    /// Written concurrently with the kill
    pub in_window_key: String,
    /// Size of the in-window write's data field
    pub payload_bytes: usize,
    /// Kill delay after the in-window write starts; `None` calibrates
    pub window: Option<KillWindow>,
    pub clean_start: bool,
}

impl Default for SentinelParams {
    fn default() -> Self {
        Self {
            args: Vec::new(),
            sentinel_key: "sentinel_graceful".to_string(),
            sentinel_value: json!({"data": "persisted"}),
            in_window_key: "crash_test_key".to_string(),
            payload_bytes: 1024 * 1024,
            window: Some(KillWindow::Fixed(Duration::from_millis(10))),
            clean_start: true,
        }
    }
}

pub async fn run(controller: &ServiceController, params: &SentinelParams) -> CycleReport {
    let mut report = CycleReport::new(Uuid::new_v4(), "sentinel", 1);
    let phase = PhaseScope::begin("SENTINEL_CYCLE");

    match execute(controller, params, &mut report).await {
        Ok(()) => phase.complete_with(&[("verdict", report.verdict.as_str())]),
        Err(e) => {
            report.abort(&e);
            phase.fail(e.code());
        }
    }
    report.finish()
}

async fn execute(
    controller: &ServiceController,
    params: &SentinelParams,
    report: &mut CycleReport,
) -> HarnessResult<()> {
    if params.clean_start {
        controller.clean_state()?;
    }
    let mut proc = controller.launch(&params.args).await?;
    let client = controller.client();

    let window = match params.window {
        Some(window) => window,
        None => KillWindow::calibrated(client, "sentinel_", 3, params.payload_bytes).await?,
    };

    client
        .put_json(&params.sentinel_key, &params.sentinel_value)
        .await?;

    let payload = json!({"data": "X".repeat(params.payload_bytes)});
    let fault = FaultScheduler::new(window)
        .schedule_kill(
            controller,
            &mut proc,
            Burst::Single {
                key: params.in_window_key.clone(),
                payload: payload.clone(),
            },
        )
        .await?;

    let restarted = controller.restart(&proc).await?;
    let verifier = RecoveryVerifier::new(client.clone(), "");
    let sentinel = verifier
        .verify_sentinel(&params.sentinel_key, &params.sentinel_value)
        .await;
    let in_window = verifier.check_in_window(&params.in_window_key, &payload).await;
    retire(controller, restarted, report).await;

    let sentinel = judge_sentinel(report, &params.sentinel_key, sentinel);
    judge_in_window(report, &in_window, fault.single_acked);

    report.data = json!({
        "fault": fault,
        "in_window": in_window,
        "sentinel": sentinel,
    });
    Ok(())
}

fn judge_sentinel(
    report: &mut CycleReport,
    key: &str,
    checked: HarnessResult<ControlCheck>,
) -> ControlOutcome {
    match checked {
        Ok(check) => {
            report.info(format!("sentinel '{}' recovered", key));
            check.outcome
        }
        Err(e @ HarnessError::SentinelLoss { .. }) => {
            report.error(Verdict::Fail, &e);
            ControlOutcome::Lost
        }
        Err(e) => {
            // Survival unconfirmed: the outcome is unknown, not a loss.
            let severity = if e.is_fatal() {
                Verdict::Fail
            } else {
                Verdict::Warning
            };
            report.error(severity, &e);
            ControlOutcome::Unreachable(e.to_string())
        }
    }
}

fn judge_in_window(report: &mut CycleReport, check: &ControlCheck, acked: Option<bool>) {
    match &check.outcome {
        ControlOutcome::Recovered => report.info("in-window write recovered"),
        ControlOutcome::Lost if acked == Some(true) => {
            report.info("in-window write was acknowledged but lost (buffered loss)")
        }
        ControlOutcome::Lost => report.info("in-window write lost"),
        ControlOutcome::Mismatched => report.error(
            Verdict::Fail,
            &HarnessError::IntegrityViolation {
                key: check.key.clone(),
                expected: "the written value or nothing".into(),
                found: "a different value".into(),
            },
        ),
        ControlOutcome::Unreachable(reason) => {
            report.warn(format!("in-window key could not be checked: {}", reason))
        }
    }
}
