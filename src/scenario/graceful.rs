//! Graceful-stop scenarios: persistence across a clean restart, and the
//! shutdown sequence itself

use serde_json::{json, Value};
use uuid::Uuid;

use super::retire;
use super::verdict::{CycleReport, Verdict};
use crate::controller::{ExitReport, ServiceController};
use crate::errors::{HarnessError, HarnessResult};
use crate::observability::PhaseScope;
use crate::recovery::LogMarkers;

/// Persistence scenario parameters
#[derive(Debug, Clone)]
pub struct PersistenceParams {
    pub args: Vec<String>,
    pub key: String,
    pub value: Value,
    pub clean_start: bool,
}

impl Default for PersistenceParams {
    fn default() -> Self {
        Self {
            args: Vec::new(),
            key: "persist_test_key".to_string(),
            value: json!({"persist": true, "id": 12345}),
            clean_start: true,
        }
    }
}

/// Write, stop gracefully, restart, read back the exact document
pub async fn persistence(controller: &ServiceController, params: &PersistenceParams) -> CycleReport {
    let mut report = CycleReport::new(Uuid::new_v4(), "persistence", 1);
    let phase = PhaseScope::begin("PERSISTENCE_RUN");

    match run_persistence(controller, params, &mut report).await {
        Ok(()) => phase.complete_with(&[("verdict", report.verdict.as_str())]),
        Err(e) => {
            report.abort(&e);
            phase.fail(e.code());
        }
    }
    report.finish()
}

async fn run_persistence(
    controller: &ServiceController,
    params: &PersistenceParams,
    report: &mut CycleReport,
) -> HarnessResult<()> {
    if params.clean_start {
        controller.clean_state()?;
    }
    let client = controller.client();
    let mut proc = controller.launch(&params.args).await?;

    client.put_json(&params.key, &params.value).await?;
    let before = client.get_json(&params.key).await?;
    if before.as_ref() != Some(&params.value) {
        report.fail(format!(
            "read-after-write mismatch before restart: got {}",
            before.map(|v| v.to_string()).unwrap_or_else(|| "404".into())
        ));
    }

    let exit = controller.terminate(&mut proc, true).await?;
    judge_stop(report, &exit);

    let restarted = controller.restart(&proc).await?;
    let after = client.get_json(&params.key).await?;
    retire(controller, restarted, report).await;

    match &after {
        Some(value) if value == &params.value => {
            report.info("document persisted across graceful restart")
        }
        Some(value) => report.error(
            Verdict::Fail,
            &HarnessError::IntegrityViolation {
                key: params.key.clone(),
                expected: params.value.to_string(),
                found: value.to_string(),
            },
        ),
        None => report.error(
            Verdict::Fail,
            &HarnessError::SentinelLoss {
                key: params.key.clone(),
                status: "404".into(),
            },
        ),
    }

    report.data = json!({"after_restart": after, "exit": exit, "expected": params.value});
    Ok(())
}

/// Shutdown scenario parameters
#[derive(Debug, Clone)]
pub struct ShutdownParams {
    pub args: Vec<String>,
    /// Written before the stop so there is state to flush
    pub key: String,
}

impl Default for ShutdownParams {
    fn default() -> Self {
        Self {
            args: Vec::new(),
            key: "shutdown_probe".to_string(),
        }
    }
}

/// Stop gracefully and check the exit and the log markers
pub async fn shutdown(controller: &ServiceController, params: &ShutdownParams) -> CycleReport {
    let mut report = CycleReport::new(Uuid::new_v4(), "shutdown", 1);
    let phase = PhaseScope::begin("SHUTDOWN_RUN");

    match run_shutdown(controller, params, &mut report).await {
        Ok(()) => phase.complete_with(&[("verdict", report.verdict.as_str())]),
        Err(e) => {
            report.abort(&e);
            phase.fail(e.code());
        }
    }
    report.finish()
}

async fn run_shutdown(
    controller: &ServiceController,
    params: &ShutdownParams,
    report: &mut CycleReport,
) -> HarnessResult<()> {
    let mut proc = controller.launch(&params.args).await?;
    controller
        .client()
        .put_json(&params.key, &json!({"data": "flush me"}))
        .await?;

    let exit = controller.terminate(&mut proc, true).await?;
    let markers = LogMarkers::scan(&proc.read_log()?);
    judge_shutdown(report, &exit, &markers);

    report.data = json!({"exit": exit, "markers": markers});
    Ok(())
}

fn judge_stop(report: &mut CycleReport, exit: &ExitReport) {
    if exit.escalated {
        report.fail(format!(
            "process {} ignored the graceful stop and was killed after {}ms",
            exit.pid,
            exit.elapsed.as_millis()
        ));
    } else {
        report.info(format!(
            "process {} stopped in {}ms with code {:?}",
            exit.pid,
            exit.elapsed.as_millis(),
            exit.code
        ));
    }
}

fn judge_shutdown(report: &mut CycleReport, exit: &ExitReport, markers: &LogMarkers) {
    judge_stop(report, exit);
    if !markers.graceful_shutdown {
        report.warn("no graceful-shutdown marker in the service log");
    }
    if !markers.metrics_dumped {
        report.warn("no metrics-dump marker in the service log");
    }
}
