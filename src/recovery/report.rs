//! Recovery scan results

use serde::Serialize;

use super::markers::DiscardBehavior;
use crate::errors::HarnessError;

/// Result of probing one key after restart
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecoverySample {
    /// Probed key
    pub key: String,
    /// Index encoded in the key
    pub index: u64,
    /// The service returned the key
    pub found: bool,
    /// Index decoded from the payload, if any
    pub decoded: Option<u64>,
    /// Payload index equals key index
    pub intact: bool,
}

/// Aggregate over one prefix scan
///
/// Verified hits and corrupted samples are disjoint: a corrupted key never
/// advances `max_found` or `highest_contiguous`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RecoveryReport {
    /// Key prefix scanned
    pub prefix: String,
    /// Keys probed before the scan stopped
    pub probed: u64,
    /// Verified hits
    pub recovered: u64,
    /// Highest verified hit `i` with no miss or corruption anywhere in `0..=i`
    ///
    /// A probe that failed at the transport level is unknown, not a gap.
    pub highest_contiguous: Option<u64>,
    /// Highest verified hit anywhere in the scan
    pub max_found: Option<u64>,
    /// First index answered with a miss or a corrupted payload
    pub first_gap: Option<u64>,
    /// Verified hits after the first gap
    pub out_of_order: u64,
    /// Found keys whose payload index disagrees with the key
    pub corrupted: Vec<RecoverySample>,
    /// 404 answers
    pub misses: u64,
    /// Probes that failed at the transport level
    pub probe_errors: u64,
    /// Consecutive misses at the point the scan stopped
    pub final_miss_streak: u32,
    /// Longest run of consecutive misses seen
    pub longest_miss_streak: u32,
    /// The miss streak limit ended the scan before the key-space bound
    pub terminated_early: bool,
    /// Log replay classification, when a log was available
    pub discard: Option<DiscardBehavior>,
}

impl RecoveryReport {
    /// Corrupted records below the highest verified hit
    ///
    /// These break the "everything up to max_found is intact" claim.
    pub fn defects_below_max(&self) -> impl Iterator<Item = &RecoverySample> {
        let max = self.max_found;
        self.corrupted
            .iter()
            .filter(move |s| max.map(|m| s.index < m).unwrap_or(false))
    }

    /// Every corrupted sample as an `IntegrityViolation`
    pub fn violations(&self) -> Vec<HarnessError> {
        self.corrupted
            .iter()
            .map(|s| HarnessError::IntegrityViolation {
                key: s.key.clone(),
                expected: format!("index {}", s.index),
                found: s
                    .decoded
                    .map(|d| format!("index {}", d))
                    .unwrap_or_else(|| "no index".to_string()),
            })
            .collect()
    }
}
