//! Benchmark aggregation
//!
//! Per-task tallies are summed, never averaged, so the aggregate does not
//! depend on task count or completion order.

mod aggregator;
mod result;

pub use aggregator::{BenchReport, BenchmarkAggregator, Phase};
pub use result::BenchmarkResult;
pub(crate) use result::serialize_millis;
