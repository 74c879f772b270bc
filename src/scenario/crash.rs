//! Flood, kill, restart, scan

use std::collections::HashSet;
use std::time::Duration;

use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use super::retire;
use super::verdict::{CycleReport, Verdict};
use crate::controller::{ServiceController, ServiceProcess};
use crate::errors::HarnessResult;
use crate::fault::{Burst, FaultOutcome, FaultScheduler, KillWindow};
use crate::load::{KeyScheme, LoadInjector, TaskTally, Workload};
use crate::observability::PhaseScope;
use crate::recovery::{DiscardBehavior, LogMarkers, RecoveryReport, RecoveryVerifier};

/// Crash-recovery scenario parameters
#[derive(Debug, Clone)]
pub struct CrashParams {
    /// Positional startup arguments
    pub args: Vec<String>,
    /// Key prefix; one writer yields `crash_0, crash_1, ...`
    pub prefix: String,
    pub writers: u32,
    /// Filler bytes per record
    pub payload_bytes: usize,
    /// Kill delay after the flood starts; `None` calibrates on write latency
    pub window: Option<KillWindow>,
    pub key_space_bound: u64,
    pub miss_streak_limit: u32,
    /// Remove service state before the first launch
    pub clean_start: bool,
}

impl Default for CrashParams {
    fn default() -> Self {
        Self {
            args: Vec::new(),
            prefix: "crash_".to_string(),
            writers: 1,
            payload_bytes: 100,
            window: Some(KillWindow::Uniform {
                min: Duration::from_millis(500),
                max: Duration::from_millis(1500),
            }),
            key_space_bound: 10_000,
            miss_streak_limit: 100,
            clean_start: true,
        }
    }
}

/// Per-writer verification of one cycle
#[derive(Debug, Clone, Serialize)]
struct WriterOutcome {
    writer: u32,
    /// Highest index the service acknowledged before the kill
    last_acked: Option<u64>,
    /// Acknowledged indices above the highest verified hit
    acked_not_recovered: u64,
    report: RecoveryReport,
}

/// Run `cycles` crash cycles, stopping after the first failed one
pub async fn run(
    controller: &ServiceController,
    params: &CrashParams,
    cycles: u32,
) -> Vec<CycleReport> {
    let run_id = Uuid::new_v4();
    let mut reports = Vec::new();
    for cycle in 1..=cycles.max(1) {
        let report = run_cycle(controller, params, run_id, cycle).await;
        let failed = report.is_failure();
        reports.push(report);
        if failed {
            break;
        }
    }
    reports
}

/// One flood/kill/restart/scan cycle
pub async fn run_cycle(
    controller: &ServiceController,
    params: &CrashParams,
    run_id: Uuid,
    cycle: u32,
) -> CycleReport {
    let mut report = CycleReport::new(run_id, "crash", cycle);
    let phase = PhaseScope::begin_with("CRASH_CYCLE", &[("cycle", &cycle.to_string())]);

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
    params: &CrashParams,
    report: &mut CycleReport,
) -> HarnessResult<()> {
    if params.clean_start && report.cycle == 1 {
        controller.clean_state()?;
    }
    let mut proc = controller.launch(&params.args).await?;

    let window = match params.window {
        Some(window) => window,
        None => {
            KillWindow::calibrated(controller.client(), &params.prefix, 5, params.payload_bytes)
                .await?
        }
    };

    // Each cycle writes a fresh key range so earlier cycles cannot mask loss.
    let prefix = if report.cycle > 1 {
        format!("{}c{}_", params.prefix, report.cycle)
    } else {
        params.prefix.clone()
    };
    let scheme = KeyScheme::new(prefix, params.writers);
    let injector = LoadInjector::new(
        controller.client().clone(),
        Workload::Sequential {
            scheme: scheme.clone(),
            payload_bytes: params.payload_bytes,
        },
        params.writers,
    );
    let fault = FaultScheduler::new(window)
        .schedule_kill(controller, &mut proc, Burst::Flood(injector))
        .await?;

    let restarted = controller.restart(&proc).await?;
    let mut outcomes = verify_writers(controller, &scheme, &fault.tallies, params).await;
    let markers = classify_log(&restarted, report);
    retire(controller, restarted, report).await;

    judge(report, &mut outcomes, &fault, markers);
    report.data = json!({
        "fault": fault,
        "markers": markers,
        "writers": outcomes,
    });
    Ok(())
}

async fn verify_writers(
    controller: &ServiceController,
    scheme: &KeyScheme,
    tallies: &[TaskTally],
    params: &CrashParams,
) -> Vec<WriterOutcome> {
    let mut outcomes = Vec::with_capacity(scheme.writers() as usize);
    for writer in 0..scheme.writers() {
        let verifier =
            RecoveryVerifier::new(controller.client().clone(), scheme.writer_prefix(writer));
        let recovered = verifier
            .verify(params.key_space_bound, params.miss_streak_limit)
            .await;

        let last_acked = tallies
            .iter()
            .find(|t| t.task == writer)
            .and_then(|t| t.last_acked);
        let acked_not_recovered = match (last_acked, recovered.max_found) {
            (Some(acked), Some(max)) => acked.saturating_sub(max),
            (Some(acked), None) => acked + 1,
            (None, _) => 0,
        };

        outcomes.push(WriterOutcome {
            writer,
            last_acked,
            acked_not_recovered,
            report: recovered,
        });
    }
    outcomes
}

fn classify_log(proc: &ServiceProcess, report: &mut CycleReport) -> Option<LogMarkers> {
    match proc.read_log() {
        Ok(text) => Some(LogMarkers::scan(&text)),
        Err(e) => {
            report.error(Verdict::Warning, &e);
            None
        }
    }
}

fn judge(
    report: &mut CycleReport,
    outcomes: &mut [WriterOutcome],
    fault: &FaultOutcome,
    markers: Option<LogMarkers>,
) {
    let discard = markers.map(|m| m.discard_behavior());

    for outcome in outcomes.iter_mut() {
        if let Some(discard) = discard {
            outcome.report.discard = Some(discard);
        }
        let recovered = &outcome.report;

        // Corruption below the highest verified hit breaks the prefix claim;
        // corruption in the tail is the torn in-flight window surfacing.
        let below_max: HashSet<u64> = recovered.defects_below_max().map(|s| s.index).collect();
        for (sample, violation) in recovered.corrupted.iter().zip(recovered.violations()) {
            let severity = if below_max.contains(&sample.index) {
                Verdict::Fail
            } else {
                Verdict::Warning
            };
            report.error(severity, &violation);
        }

        if recovered.out_of_order > 0 {
            report.warn(format!(
                "writer {}: {} verified keys after the first gap at {:?}",
                outcome.writer, recovered.out_of_order, recovered.first_gap
            ));
        }
        if recovered.probe_errors > 0 {
            report.warn(format!(
                "writer {}: {} probes failed at the transport level",
                outcome.writer, recovered.probe_errors
            ));
        }
        match recovered.max_found {
            Some(max) => report.info(format!(
                "writer {}: keys 0..={} recovered, last acknowledged {:?}",
                outcome.writer,
                recovered.highest_contiguous.unwrap_or(max),
                outcome.last_acked
            )),
            None if outcome.last_acked.is_some() => report.warn(format!(
                "writer {}: nothing recovered although writes were acknowledged",
                outcome.writer
            )),
            None => report.info(format!("writer {}: no writes acknowledged", outcome.writer)),
        }
    }

    match discard {
        Some(DiscardBehavior::LegacyUnchecked) => {
            report.warn("log replay accepted a record without a checksum")
        }
        Some(DiscardBehavior::ChecksumDiscard) => {
            report.info("log replay discarded a torn record on checksum mismatch")
        }
        Some(DiscardBehavior::Clean) | None => {}
    }

    report.info(format!(
        "kill issued {}ms after the flood started",
        fault.delay.as_millis()
    ));
}
