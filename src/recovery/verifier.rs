//! Post-restart recovery verification
//!
//! Scans a key prefix in ascending index order and checks that every
//! recovered payload carries the index its key encodes. Separately checks
//! control keys: a sentinel must survive, an in-window key may not.

use std::future::Future;

use serde::Serialize;
use serde_json::Value;

use super::report::{RecoveryReport, RecoverySample};
use crate::client::KvClient;
use crate::errors::{HarnessError, HarnessResult};
use crate::load::decode_index;
use crate::observability::{log_event, Event};

/// Outcome of probing one key
#[derive(Debug, Clone, PartialEq)]
pub enum Probe {
    /// 200 with a body
    Hit(Value),
    /// 404
    Miss,
    /// Transport failure or unexpected status
    Unreachable(String),
}

/// Something that can look a key up on the restarted service
pub trait KeyProbe {
    /// Look up one key
    fn probe(&self, key: &str) -> impl Future<Output = Probe> + Send;
}

impl KeyProbe for KvClient {
    async fn probe(&self, key: &str) -> Probe {
        match self.get_json(key).await {
            Ok(Some(value)) => Probe::Hit(value),
            Ok(None) => Probe::Miss,
            Err(e) => Probe::Unreachable(e.to_string()),
        }
    }
}

/// How a control key fared across the restart
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlOutcome {
    /// Present with exactly the written value
    Recovered,
    /// Absent
    Lost,
    /// Present with a different value
    Mismatched,
    /// Could not be looked up
    Unreachable(String),
}

/// Result of checking a control key
#[derive(Debug, Clone, Serialize)]
pub struct ControlCheck {
    pub key: String,
    pub outcome: ControlOutcome,
}

/// Recovery verifier over one key prefix
pub struct RecoveryVerifier<P> {
    probe: P,
    prefix: String,
}

impl<P: KeyProbe> RecoveryVerifier<P> {
    /// Verifier for keys `{prefix}0`, `{prefix}1`, ...
    pub fn new(probe: P, prefix: impl Into<String>) -> Self {
        Self {
            probe,
            prefix: prefix.into(),
        }
    }

    /// Scan `0..key_space_bound`, stopping once consecutive misses exceed
    /// `miss_streak_limit`
    ///
    /// A found key resets the streak whether or not its payload is intact.
    /// Transport failures count toward the streak so a dead service ends
    /// the scan quickly instead of walking the whole key space, but they
    /// are tallied as `probe_errors` and never mark a gap.
    pub async fn verify(&self, key_space_bound: u64, miss_streak_limit: u32) -> RecoveryReport {
        let mut report = RecoveryReport {
            prefix: self.prefix.clone(),
            ..RecoveryReport::default()
        };
        let mut streak: u32 = 0;

        for index in 0..key_space_bound {
            let key = format!("{}{}", self.prefix, index);
            report.probed += 1;

            match self.probe.probe(&key).await {
                Probe::Hit(value) => {
                    streak = 0;
                    let decoded = decode_index(&value);
                    if decoded == Some(index) {
                        report.recovered += 1;
                        report.max_found = Some(index);
                        if report.first_gap.is_none() {
                            report.highest_contiguous = Some(index);
                        } else {
                            report.out_of_order += 1;
                        }
                    } else {
                        report.first_gap.get_or_insert(index);
                        let found = decoded
                            .map(|d| d.to_string())
                            .unwrap_or_else(|| "none".to_string());
                        log_event(
                            Event::RecoveryCorruption,
                            &[("decoded", &found), ("key", &key)],
                        );
                        report.corrupted.push(RecoverySample {
                            key,
                            index,
                            found: true,
                            decoded,
                            intact: false,
                        });
                    }
                }
                Probe::Miss => {
                    report.misses += 1;
                    streak += 1;
                    report.first_gap.get_or_insert(index);
                }
                Probe::Unreachable(_) => {
                    // Unknown, not absent: the key never opens a gap.
                    report.probe_errors += 1;
                    streak += 1;
                }
            }

            report.longest_miss_streak = report.longest_miss_streak.max(streak);
            if streak > miss_streak_limit {
                report.terminated_early = true;
                break;
            }
        }
        report.final_miss_streak = streak;

        let max_found = report
            .max_found
            .map(|m| m.to_string())
            .unwrap_or_else(|| "none".to_string());
        log_event(
            Event::RecoveryScanComplete,
            &[
                ("corrupted", &report.corrupted.len().to_string()),
                ("max_found", &max_found),
                ("prefix", &self.prefix),
                ("probed", &report.probed.to_string()),
            ],
        );
        report
    }

    /// A sentinel written before the fault window must come back unchanged
    ///
    /// Absence or a changed value is `SentinelLoss`; a failed lookup is
    /// returned as the transport error.
    pub async fn verify_sentinel(&self, key: &str, expected: &Value) -> HarnessResult<ControlCheck> {
        match self.probe.probe(key).await {
            Probe::Hit(value) if &value == expected => {
                log_event(Event::SentinelRecovered, &[("key", key)]);
                Ok(ControlCheck {
                    key: key.to_string(),
                    outcome: ControlOutcome::Recovered,
                })
            }
            Probe::Hit(_) => {
                log_event(Event::SentinelLost, &[("key", key), ("status", "200 changed")]);
                Err(HarnessError::SentinelLoss {
                    key: key.to_string(),
                    status: "200 with a different value".to_string(),
                })
            }
            Probe::Miss => {
                log_event(Event::SentinelLost, &[("key", key), ("status", "404")]);
                Err(HarnessError::SentinelLoss {
                    key: key.to_string(),
                    status: "404".to_string(),
                })
            }
            Probe::Unreachable(reason) => Err(HarnessError::transient(key, reason)),
        }
    }

    /// A key written during the fault window; any outcome is informational
    ///
    /// Only `Mismatched` matters: a partially applied write surfaced as a
    /// different value is an integrity violation.
    pub async fn check_in_window(&self, key: &str, expected: &Value) -> ControlCheck {
        let outcome = match self.probe.probe(key).await {
            Probe::Hit(value) if &value == expected => ControlOutcome::Recovered,
            Probe::Hit(_) => ControlOutcome::Mismatched,
            Probe::Miss => ControlOutcome::Lost,
            Probe::Unreachable(reason) => ControlOutcome::Unreachable(reason),
        };
        ControlCheck {
            key: key.to_string(),
            outcome,
        }
    }
}
