//! Warmup + measured benchmark phases

use std::time::{Duration, Instant};

use serde::Serialize;

use super::result::{serialize_millis, BenchmarkResult};
use crate::client::KvClient;
use crate::load::{EndCondition, LoadInjector, Workload};
use crate::observability::PhaseScope;

/// Concurrency and length of one benchmark phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Phase {
    pub users: u32,
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
}

impl Phase {
    pub fn new(users: u32, duration: Duration) -> Self {
        Self { users, duration }
    }
}

/// Aggregate of a measured phase
#[derive(Debug, Clone, Serialize)]
pub struct BenchReport {
    /// Concurrency of the measured phase
    pub users: u32,
    /// Summed per-task results
    pub total: BenchmarkResult,
    /// Wall time of the measured phase
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
    /// Successful ops per second of wall time
    pub throughput: f64,
    /// Busy time over ops; a coarse mean, not a percentile
    pub mean_latency_ms: Option<f64>,
}

/// Runs a discarded warmup, then a measured phase, with the same workload
#[derive(Debug, Clone)]
pub struct BenchmarkAggregator {
    client: KvClient,
    workload: Workload,
    warmup: Option<Phase>,
    measured: Phase,
}

impl BenchmarkAggregator {
    /// Benchmark with no warmup
    pub fn new(client: KvClient, workload: Workload, measured: Phase) -> Self {
        Self {
            client,
            workload,
            warmup: None,
            measured,
        }
    }

    pub fn with_warmup(mut self, warmup: Phase) -> Self {
        self.warmup = Some(warmup);
        self
    }

    /// Run both phases; only the measured phase is reported
    pub async fn run(&self) -> BenchReport {
        if let Some(warmup) = self.warmup {
            let phase = PhaseScope::begin_with(
                "BENCH_WARMUP",
                &[("users", &warmup.users.to_string())],
            );
            let _discarded = self
                .injector(warmup.users)
                .run(EndCondition::after(warmup.duration))
                .await;
            phase.complete();
        }

        let users = self.measured.users;
        let phase = PhaseScope::begin_with("BENCH_MEASURED", &[("users", &users.to_string())]);
        let started = Instant::now();
        let total = self
            .injector(users)
            .run(EndCondition::after(self.measured.duration))
            .await;
        let elapsed = started.elapsed();

        let report = BenchReport::from_total(users, total, elapsed);
        phase.complete_with(&[
            ("ops", &total.ops.to_string()),
            ("errors", &total.errors.to_string()),
            ("throughput", &format!("{:.2}", report.throughput)),
        ]);
        report
    }

    fn injector(&self, users: u32) -> LoadInjector {
        LoadInjector::new(self.client.clone(), self.workload.clone(), users)
    }
}

impl BenchReport {
    /// Derive throughput and mean latency from a summed result
    pub fn from_total(users: u32, total: BenchmarkResult, elapsed: Duration) -> Self {
        Self {
            users,
            total,
            elapsed,
            throughput: total.throughput(elapsed),
            mean_latency_ms: total.mean_latency().map(|d| d.as_secs_f64() * 1000.0),
        }
    }
}
