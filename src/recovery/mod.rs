//! Recovery verification after a forced kill
//!
//! After the service restarts, the verifier walks the flood's key space
//! and checks each payload against the index encoded in its key.
//!
//! # Guarantees checked
//!
//! - Every recovered key carries the payload written under that key
//! - Sentinels written before the fault window survive
//! - Corruption is reported per key, never silently skipped
//!
//! Partial recovery is expected: the tail written during the kill window
//! may be lost. Only inconsistency is a failure.

mod markers;
mod report;
mod verifier;

pub use markers::{DiscardBehavior, LogMarkers};
pub use report::{RecoveryReport, RecoverySample};
pub use verifier::{ControlCheck, ControlOutcome, KeyProbe, Probe, RecoveryVerifier};
