//! Autoscaling verification: sustained load while sampling thread counts

use std::time::Duration;

use serde_json::json;
use uuid::Uuid;

use super::retire;
use super::verdict::CycleReport;
use crate::controller::{pool_args, ServiceController};
use crate::errors::HarnessResult;
use crate::load::{EndCondition, LoadInjector, StopFlag, Workload};
use crate::metrics::{MetricsSampler, SamplingSummary, ScalingAssessment};
use crate::observability::PhaseScope;

/// Scaling scenario parameters
#[derive(Debug, Clone)]
pub struct ScalingParams {
    pub min_workers: u32,
    pub max_workers: u32,
    /// Concurrent users hammering the health endpoint
    pub users: u32,
    /// Length of the sustained load window
    pub duration: Duration,
    /// Metrics poll interval
    pub interval: Duration,
    /// Metrics path override
    pub metrics_path: Option<String>,
}

impl Default for ScalingParams {
    fn default() -> Self {
        Self {
            min_workers: 4,
            max_workers: 16,
            users: 50,
            duration: Duration::from_secs(15),
            interval: Duration::from_millis(500),
            metrics_path: None,
        }
    }
}

pub async fn run(controller: &ServiceController, params: &ScalingParams) -> CycleReport {
    let mut report = CycleReport::new(Uuid::new_v4(), "scaling", 1);
    let phase = PhaseScope::begin_with(
        "SCALING_RUN",
        &[
            ("max_workers", &params.max_workers.to_string()),
            ("min_workers", &params.min_workers.to_string()),
        ],
    );

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
    params: &ScalingParams,
    report: &mut CycleReport,
) -> HarnessResult<()> {
    let mut proc = controller
        .launch(&pool_args(params.min_workers, params.max_workers))
        .await?;
    controller.mark_running(&mut proc)?;

    let mut sampler = MetricsSampler::new(controller.client().clone(), params.interval);
    if let Some(path) = &params.metrics_path {
        sampler = sampler.with_path(path.clone());
    }
    let injector = LoadInjector::new(controller.client().clone(), Workload::Health, params.users);

    // The poller runs for exactly as long as the load does.
    let stop = StopFlag::new();
    let (load, summary) = tokio::join!(
        async {
            let result = injector
                .run(EndCondition::after(params.duration).or_flag(stop.clone()))
                .await;
            stop.raise();
            result
        },
        sampler.sample_until(&stop),
    );
    retire(controller, proc, report).await;

    judge(report, params, &summary);
    report.info(format!(
        "{} health requests succeeded, {} failed",
        load.ops, load.errors
    ));
    report.data = json!({
        "assessment": ScalingAssessment::judge(params.min_workers, params.max_workers, summary.max_thread_count),
        "load": load,
        "metrics": summary,
        "pool": {"min": params.min_workers, "max": params.max_workers},
        "max_thread_count_observed": summary.max_thread_count,
    });
    Ok(())
}

fn judge(report: &mut CycleReport, params: &ScalingParams, summary: &SamplingSummary) {
    if summary.samples == 0 {
        report.warn(format!(
            "no metrics sample succeeded ({} polls failed)",
            summary.failed_polls
        ));
        return;
    }

    let observed = summary.max_thread_count;
    match ScalingAssessment::judge(params.min_workers, params.max_workers, observed) {
        ScalingAssessment::Scaled => report.info(format!(
            "pool scaled from {} to {} threads (max {})",
            params.min_workers, observed, params.max_workers
        )),
        ScalingAssessment::NotScaled => report.warn(format!(
            "thread count never exceeded the minimum of {} (peak {})",
            params.min_workers, observed
        )),
        ScalingAssessment::AboveBound => report.warn(format!(
            "thread count {} exceeds the configured maximum of {}",
            observed, params.max_workers
        )),
    }
}
