//! Log-marker classification
//!
//! The service's log is the only view into its recovery internals. Markers
//! are matched case-insensitively and treated as weak signals: a missing
//! marker downgrades a verdict to WARNING, it never fails a cycle alone.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

static CHECKSUM_MISMATCH: OnceLock<Regex> = OnceLock::new();
static LEGACY_CHECKSUM: OnceLock<Regex> = OnceLock::new();
static GRACEFUL_SHUTDOWN: OnceLock<Regex> = OnceLock::new();
static METRICS_DUMPED: OnceLock<Regex> = OnceLock::new();

fn pattern(cell: &'static OnceLock<Regex>, source: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(source).expect("marker patterns are static and valid"))
}

/// How the service's log replay treated a torn tail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscardBehavior {
    /// No checksum complaints; nothing was discarded or nothing was torn
    Clean,
    /// A checksum mismatch was detected and the partial record dropped
    ChecksumDiscard,
    /// A record without a checksum was replayed unchecked
    LegacyUnchecked,
}

/// Markers found in a captured service log
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LogMarkers {
    pub checksum_mismatch: bool,
    pub legacy_checksum: bool,
    pub graceful_shutdown: bool,
    pub metrics_dumped: bool,
}

impl LogMarkers {
    /// Scan log text for every known marker
    pub fn scan(text: &str) -> Self {
        Self {
            checksum_mismatch: pattern(&CHECKSUM_MISMATCH, r"(?i)(crc|checksum)\s*mismatch")
                .is_match(text),
            legacy_checksum: pattern(
                &LEGACY_CHECKSUM,
                r"(?i)legacy\s*(/|or)\s*zero\s*(crc|checksum)",
            )
            .is_match(text),
            graceful_shutdown: pattern(
                &GRACEFUL_SHUTDOWN,
                r"(?i)graceful\s+shutdown|stopping\s+server|server\s+stopped",
            )
            .is_match(text),
            metrics_dumped: pattern(
                &METRICS_DUMPED,
                r"(?i)metrics\s+dumped|wal\s+metrics|bytes\s+written",
            )
            .is_match(text),
        }
    }

    /// Discard classification; a checksum discard wins over a legacy replay
    pub fn discard_behavior(&self) -> DiscardBehavior {
        if self.checksum_mismatch {
            DiscardBehavior::ChecksumDiscard
        } else if self.legacy_checksum {
            DiscardBehavior::LegacyUnchecked
        } else {
            DiscardBehavior::Clean
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_log() {
        let markers = LogMarkers::scan("listening on 8080\nreplayed 812 records\n");
        assert_eq!(markers, LogMarkers::default());
        assert_eq!(markers.discard_behavior(), DiscardBehavior::Clean);
    }

    #[test]
    fn test_checksum_discard() {
        let markers = LogMarkers::scan("WAL: CRC Mismatch at offset 4096, truncating");
        assert_eq!(markers.discard_behavior(), DiscardBehavior::ChecksumDiscard);
    }

    #[test]
    fn test_legacy_variants() {
        for line in ["Legacy/Zero CRC record", "legacy or zero checksum found"] {
            let markers = LogMarkers::scan(line);
            assert_eq!(markers.discard_behavior(), DiscardBehavior::LegacyUnchecked, "{}", line);
        }
    }

    #[test]
    fn test_checksum_wins_over_legacy() {
        let markers = LogMarkers::scan("Legacy/Zero CRC\nCRC mismatch");
        assert_eq!(markers.discard_behavior(), DiscardBehavior::ChecksumDiscard);
    }

    #[test]
    fn test_shutdown_markers() {
        let markers = LogMarkers::scan("Stopping server...\nWAL Metrics: Bytes Written=1024\n");
        assert!(markers.graceful_shutdown);
        assert!(markers.metrics_dumped);

        let markers = LogMarkers::scan("graceful shutdown complete; metrics dumped");
        assert!(markers.graceful_shutdown && markers.metrics_dumped);
    }
}
