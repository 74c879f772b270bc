//! Throughput benchmarks: one pool, or a static pool against a dynamic one

use std::time::Duration;

use serde_json::{json, Value};
use uuid::Uuid;

use super::retire;
use super::verdict::CycleReport;
use crate::bench::{BenchReport, BenchmarkAggregator, Phase};
use crate::controller::{pool_args, ServiceController};
use crate::errors::HarnessResult;
use crate::load::Workload;
use crate::observability::PhaseScope;

/// Benchmark parameters
#[derive(Debug, Clone)]
pub struct BenchParams {
    /// Launch arguments; empty uses the service defaults
    pub args: Vec<String>,
    pub warmup: Phase,
    pub measured: Phase,
    /// Key prefix; keys are `{prefix}{user}_{0..=key_space}`
    pub prefix: String,
    pub key_space: u32,
}

impl Default for BenchParams {
    fn default() -> Self {
        Self {
            args: Vec::new(),
            warmup: Phase::new(10, Duration::from_secs(5)),
            measured: Phase::new(50, Duration::from_secs(30)),
            prefix: "bench_".to_string(),
            key_space: 1000,
        }
    }
}

impl BenchParams {
    fn workload(&self) -> Workload {
        Workload::PutGet {
            prefix: self.prefix.clone(),
            key_space: self.key_space,
        }
    }

    /// Same load against a `(min, max)` worker pool
    fn with_pool(&self, min_workers: u32, max_workers: u32) -> Self {
        Self {
            args: pool_args(min_workers, max_workers),
            ..self.clone()
        }
    }
}

/// Benchmark one service instance and fetch its own metrics afterwards
pub async fn run(controller: &ServiceController, params: &BenchParams) -> CycleReport {
    let mut report = CycleReport::new(Uuid::new_v4(), "bench", 1);
    let phase = PhaseScope::begin("BENCH_RUN");

    match measure(controller, params, &mut report).await {
        Ok((bench, service_metrics)) => {
            judge_bench(&mut report, "bench", &bench);
            report.data = json!({"bench": bench, "service_metrics": service_metrics});
            phase.complete_with(&[("verdict", report.verdict.as_str())]);
        }
        Err(e) => {
            report.abort(&e);
            phase.fail(e.code());
        }
    }
    report.finish()
}

/// Benchmark a static `(min, min)` pool, then a dynamic `(min, max)` pool
pub async fn compare(
    controller: &ServiceController,
    params: &BenchParams,
    min_workers: u32,
    max_workers: u32,
) -> CycleReport {
    let mut report = CycleReport::new(Uuid::new_v4(), "compare", 1);
    let phase = PhaseScope::begin("BENCH_COMPARE");

    let static_params = params.with_pool(min_workers, min_workers);
    let dynamic_params = params.with_pool(min_workers, max_workers);

    let outcome = async {
        let (fixed, _) = measure(controller, &static_params, &mut report).await?;
        let (dynamic, _) = measure(controller, &dynamic_params, &mut report).await?;
        Ok::<_, crate::errors::HarnessError>((fixed, dynamic))
    }
    .await;

    match outcome {
        Ok((fixed, dynamic)) => {
            judge_bench(&mut report, "static", &fixed);
            judge_bench(&mut report, "dynamic", &dynamic);
            let comparison = Comparison::between(&fixed, &dynamic);
            if comparison.delta < 0.0 {
                report.warn(format!(
                    "dynamic pool is slower than static: {:+.2} req/s ({:+.2}%)",
                    comparison.delta, comparison.percent
                ));
            } else {
                report.info(format!(
                    "dynamic pool: {:+.2} req/s ({:+.2}%)",
                    comparison.delta, comparison.percent
                ));
            }
            report.data = json!({
                "delta": comparison.delta,
                "dynamic": dynamic,
                "percent": comparison.percent,
                "static": fixed,
            });
            phase.complete_with(&[("verdict", report.verdict.as_str())]);
        }
        Err(e) => {
            report.abort(&e);
            phase.fail(e.code());
        }
    }
    report.finish()
}

async fn measure(
    controller: &ServiceController,
    params: &BenchParams,
    report: &mut CycleReport,
) -> HarnessResult<(BenchReport, Value)> {
    let mut proc = controller.launch(&params.args).await?;
    controller.mark_running(&mut proc)?;

    let bench = BenchmarkAggregator::new(
        controller.client().clone(),
        params.workload(),
        params.measured,
    )
    .with_warmup(params.warmup)
    .run()
    .await;

    // The service's own view is a bonus; a failure here is not a result.
    let service_metrics = match controller.client().metrics().await {
        Ok(doc) => doc,
        Err(e) => {
            report.info(format!("service metrics unavailable: {}", e));
            Value::Null
        }
    };
    retire(controller, proc, report).await;
    Ok((bench, service_metrics))
}

fn judge_bench(report: &mut CycleReport, label: &str, bench: &BenchReport) {
    if bench.total.ops == 0 {
        report.fail(format!("{}: no operation succeeded", label));
    } else if bench.total.errors > 0 {
        report.warn(format!(
            "{}: {} errors against {} successful ops",
            label, bench.total.errors, bench.total.ops
        ));
    } else {
        report.info(format!(
            "{}: {:.2} req/s, mean latency {:.3}ms (coarse mean)",
            label,
            bench.throughput,
            bench.mean_latency_ms.unwrap_or(0.0)
        ));
    }
}

/// Throughput difference of a dynamic pool over a static one
#[derive(Debug, Clone, Copy, PartialEq)]
struct Comparison {
    delta: f64,
    /// Relative to the static throughput; 0 when that is 0
    percent: f64,
}

impl Comparison {
    fn between(fixed: &BenchReport, dynamic: &BenchReport) -> Self {
        let delta = dynamic.throughput - fixed.throughput;
        let percent = if fixed.throughput > 0.0 {
            delta / fixed.throughput * 100.0
        } else {
            0.0
        };
        Self { delta, percent }
    }
}
