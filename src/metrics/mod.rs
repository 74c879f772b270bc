//! Service metrics sampling
//!
//! Polls `system.thread_count` and `system.active_connections` while load
//! runs and keeps only their running maxima.

mod sampler;
mod snapshot;

pub use sampler::{MetricsSampler, ScalingAssessment};
pub use snapshot::{MetricsSnapshot, RunningMax, SamplingSummary};
