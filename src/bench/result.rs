//! Per-task load tallies and their aggregation

use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::time::Duration;

use serde::Serialize;

/// Operation counts and time spent for one or more load tasks
///
/// Aggregation is plain summation, so merging is commutative and
/// associative: per-task results can be folded in any order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BenchmarkResult {
    /// Successful operations
    pub ops: u64,
    /// Failed operations (transport errors and non-2xx answers)
    pub errors: u64,
    /// Wall time spent inside requests, summed across tasks
    #[serde(rename = "busy_ms", serialize_with = "serialize_millis")]
    pub busy: Duration,
}

impl BenchmarkResult {
    /// Fold one loop iteration into the tally
    pub fn record(&mut self, ops: u64, errors: u64, spent: Duration) {
        self.ops += ops;
        self.errors += errors;
        self.busy += spent;
    }

    /// Coarse mean latency: summed busy time over summed ops
    ///
    /// This is not a percentile and says nothing about the tail.
    pub fn mean_latency(&self) -> Option<Duration> {
        if self.ops == 0 {
            return None;
        }
        Some(self.busy.div_f64(self.ops as f64))
    }

    /// Successful ops per second over a wall-clock window
    pub fn throughput(&self, elapsed: Duration) -> f64 {
        let secs = elapsed.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.ops as f64 / secs
    }
}

impl Add for BenchmarkResult {
    type Output = BenchmarkResult;

    fn add(mut self, rhs: BenchmarkResult) -> BenchmarkResult {
        self += rhs;
        self
    }
}

impl AddAssign for BenchmarkResult {
    fn add_assign(&mut self, rhs: BenchmarkResult) {
        self.ops += rhs.ops;
        self.errors += rhs.errors;
        self.busy += rhs.busy;
    }
}

impl Sum for BenchmarkResult {
    fn sum<I: Iterator<Item = BenchmarkResult>>(iter: I) -> Self {
        iter.fold(BenchmarkResult::default(), Add::add)
    }
}

impl<'a> Sum<&'a BenchmarkResult> for BenchmarkResult {
    fn sum<I: Iterator<Item = &'a BenchmarkResult>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

pub(crate) fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(ops: u64, errors: u64, ms: u64) -> BenchmarkResult {
        BenchmarkResult {
            ops,
            errors,
            busy: Duration::from_millis(ms),
        }
    }

    #[test]
    fn test_summation_is_order_independent() {
        let tasks = vec![r(10, 1, 50), r(0, 4, 400), r(250, 0, 900), r(7, 7, 7)];
        let forward: BenchmarkResult = tasks.iter().sum();
        let backward: BenchmarkResult = tasks.iter().rev().sum();
        let shuffled = tasks[2] + tasks[0] + tasks[3] + tasks[1];

        assert_eq!(forward, backward);
        assert_eq!(forward, shuffled);
        assert_eq!(forward, r(267, 12, 1357));
    }

    #[test]
    fn test_mean_latency_is_total_over_ops() {
        // Averaging the per-task means would give (10 + 1) / 2 = 5.5ms.
        let total = r(10, 0, 100) + r(100, 0, 100);
        let mean = total.mean_latency().unwrap();
        assert_eq!(mean.as_micros(), 200_000 / 110);
    }

    #[test]
    fn test_mean_latency_without_ops() {
        assert_eq!(r(0, 5, 100).mean_latency(), None);
    }

    #[test]
    fn test_throughput() {
        let result = r(500, 0, 0);
        assert_eq!(result.throughput(Duration::from_secs(2)), 250.0);
        assert_eq!(result.throughput(Duration::ZERO), 0.0);
    }

    #[test]
    fn test_record() {
        let mut result = BenchmarkResult::default();
        result.record(2, 0, Duration::from_millis(3));
        result.record(0, 1, Duration::from_millis(4));
        assert_eq!(result, r(2, 1, 7));
    }

    #[test]
    fn test_serializes_busy_as_millis() {
        let json = serde_json::to_value(r(1, 2, 1500)).unwrap();
        assert_eq!(json["busy_ms"], 1500);
    }
}
