//! Load injection, metrics sampling and benchmark aggregation against the mock

mod common;

use std::time::Duration;

use common::MockKv;
use faultline::bench::{BenchmarkAggregator, Phase};
use faultline::load::{EndCondition, KeyScheme, LoadInjector, StopFlag, Workload};
use faultline::metrics::MetricsSampler;
use faultline::recovery::RecoveryVerifier;

#[tokio::test]
async fn test_sequential_flood_writes_contiguous_prefix() {
    let mock = MockKv::start().await;
    let injector = LoadInjector::new(
        mock.client(),
        Workload::Sequential {
            scheme: KeyScheme::new("crash_", 1),
            payload_bytes: 32,
        },
        1,
    );

    let tallies = injector
        .run_tasks(EndCondition::after(Duration::from_millis(200)))
        .await;
    let last = tallies[0].last_acked.expect("flood acknowledged nothing");
    assert_eq!(tallies[0].result.errors, 0);

    let report = RecoveryVerifier::new(mock.client(), "crash_")
        .verify(1_000_000, 10)
        .await;
    assert_eq!(report.highest_contiguous, Some(last));
}

#[tokio::test]
async fn test_writers_get_disjoint_key_ranges() {
    let mock = MockKv::start().await;
    let scheme = KeyScheme::new("crash_", 3);
    let injector = LoadInjector::new(
        mock.client(),
        Workload::Sequential {
            scheme: scheme.clone(),
            payload_bytes: 8,
        },
        3,
    );
    let tallies = injector
        .run_tasks(EndCondition::after(Duration::from_millis(150)))
        .await;

    let acked: u64 = tallies.iter().map(|t| t.result.ops).sum();
    let stored: usize = (0..3)
        .map(|w| mock.keys_with_prefix(&scheme.writer_prefix(w)))
        .sum();
    assert_eq!(acked as usize, stored);
}

#[tokio::test]
async fn test_stop_flag_ends_flood() {
    let mock = MockKv::start().await;
    let flag = StopFlag::new();
    let injector = LoadInjector::new(mock.client(), Workload::Health, 4);

    let raiser = flag.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        raiser.raise();
    });

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        injector.run(EndCondition::on(flag)),
    )
    .await
    .expect("flood ignored the stop flag");
    assert!(result.ops > 0);
    assert_eq!(result.errors, 0);
}

#[tokio::test]
async fn test_sampler_sees_pool_growth_under_load() {
    let mock = MockKv::start().await;
    mock.simulate_pool(4, 16);

    let sampler = MetricsSampler::new(mock.client(), Duration::from_millis(20));
    let injector = LoadInjector::new(mock.client(), Workload::Health, 8);
    let stop = StopFlag::new();

    let (_, max) = tokio::join!(
        async {
            let r = injector
                .run(EndCondition::after(Duration::from_millis(500)).or_flag(stop.clone()))
                .await;
            stop.raise();
            r
        },
        sampler.poll(&stop),
    );
    assert!(max > 4, "pool never grew: {}", max);
    assert!(max <= 16);
}

#[tokio::test]
async fn test_sampler_static_pool() {
    let mock = MockKv::start().await;
    mock.set_thread_count(4);
    let sampler = MetricsSampler::new(mock.client(), Duration::from_millis(10));
    let stop = StopFlag::new();

    let raiser = stop.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        raiser.raise();
    });
    let summary = sampler.sample_until(&stop).await;
    assert_eq!(summary.max_thread_count, 4);
    assert!(summary.samples > 0);
}

async fn poll_for(sampler: &MetricsSampler, window: Duration) -> u64 {
    let stop = StopFlag::new();
    let raiser = stop.clone();
    tokio::spawn(async move {
        tokio::time::sleep(window).await;
        raiser.raise();
    });
    sampler.poll(&stop).await
}

#[tokio::test]
async fn test_each_sampling_run_starts_fresh() {
    let mock = MockKv::start().await;
    let sampler = MetricsSampler::new(mock.client(), Duration::from_millis(10));

    mock.set_thread_count(12);
    assert_eq!(poll_for(&sampler, Duration::from_millis(80)).await, 12);

    // A lower peak in a later run must not be masked by the earlier one.
    mock.set_thread_count(4);
    assert_eq!(poll_for(&sampler, Duration::from_millis(80)).await, 4);
    assert_eq!(poll_for(&sampler.clone(), Duration::from_millis(80)).await, 4);
}

#[tokio::test]
async fn test_benchmark_put_get_has_no_errors() {
    let mock = MockKv::start().await;
    let bench = BenchmarkAggregator::new(
        mock.client(),
        Workload::PutGet {
            prefix: "bench_".into(),
            key_space: 50,
        },
        Phase::new(4, Duration::from_millis(300)),
    )
    .with_warmup(Phase::new(2, Duration::from_millis(100)));

    let report = bench.run().await;
    assert!(report.total.ops > 0);
    assert_eq!(report.total.ops % 2, 0);
    assert_eq!(report.total.errors, 0);
    assert!(report.throughput > 0.0);
    assert!(report.mean_latency_ms.is_some());
}

