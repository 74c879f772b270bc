//! Periodic metrics polling

use std::time::Duration;

use chrono::Utc;
use serde::Serialize;

use super::snapshot::{MetricsSnapshot, RunningMax, SamplingSummary};
use crate::client::KvClient;
use crate::load::StopFlag;
use crate::observability::{Event, Logger, Severity};

/// Polls the metrics endpoint on a fixed interval until stopped
#[derive(Debug, Clone)]
pub struct MetricsSampler {
    client: KvClient,
    path: Option<String>,
    interval: Duration,
}

impl MetricsSampler {
    /// Sampler on the client's configured metrics path
    pub fn new(client: KvClient, interval: Duration) -> Self {
        Self {
            client,
            path: None,
            interval,
        }
    }

    /// Poll an explicit path instead (`/kv/metrics` on older builds)
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Poll until `stop` is raised; returns the highest thread count seen
    ///
    /// Network failures are swallowed. The flag is checked once per
    /// iteration, so the call returns at most one interval after the raise.
    pub async fn poll(&self, stop: &StopFlag) -> u64 {
        self.sample_until(stop).await.max_thread_count
    }

    /// Like `poll`, returning every counter
    ///
    /// Each call starts from empty maxima, so a run never reports a peak
    /// seen by an earlier one.
    pub async fn sample_until(&self, stop: &StopFlag) -> SamplingSummary {
        let mut max = RunningMax::new();
        while !stop.is_raised() {
            let doc = match &self.path {
                Some(path) => self.client.metrics_at(path).await,
                None => self.client.metrics().await,
            };
            match doc {
                Ok(doc) => {
                    let snapshot = MetricsSnapshot::from_document(&doc, Utc::now());
                    max.observe(&snapshot);
                    Logger::log(
                        Severity::Trace,
                        Event::MetricsSample.as_str(),
                        &[
                            ("active_connections", &snapshot.active_connections.to_string()),
                            ("thread_count", &snapshot.thread_count.to_string()),
                        ],
                    );
                }
                Err(e) => {
                    max.record_failure();
                    Logger::trace("METRICS_POLL_FAILED", &[("code", e.code())]);
                }
            }
            tokio::time::sleep(self.interval).await;
        }
        max.summary()
    }
}

/// How an observed thread maximum relates to the configured pool bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalingAssessment {
    /// `min < observed <= max`: the pool grew under load
    Scaled,
    /// `observed <= min`: no growth seen
    NotScaled,
    /// `observed > max`: the service ignored its upper bound, or counts
    /// threads outside the worker pool
    AboveBound,
}

impl ScalingAssessment {
    /// Judge `observed` against `min..=max`
    pub fn judge(min_workers: u32, max_workers: u32, observed: u64) -> Self {
        if observed <= u64::from(min_workers) {
            ScalingAssessment::NotScaled
        } else if observed > u64::from(max_workers) {
            ScalingAssessment::AboveBound
        } else {
            ScalingAssessment::Scaled
        }
    }
}
