//! End-to-end scenarios
//!
//! Each scenario drives the controller, load, fault and verification
//! components through one cycle and returns a `CycleReport`. An error that
//! escapes a phase ends the cycle with a FAIL verdict; processes still
//! running at that point are killed when their handles drop.

pub mod bench;
pub mod crash;
pub mod graceful;
pub mod scaling;
pub mod sentinel;
mod verdict;

pub use verdict::{overall, CycleReport, Finding, Verdict};

use crate::controller::{ServiceController, ServiceProcess};

/// Stop a process that is done serving a scenario
///
/// Housekeeping only: an escalation or stop error downgrades the report to
/// WARNING but never fails it.
async fn retire(controller: &ServiceController, mut proc: ServiceProcess, report: &mut CycleReport) {
    match controller.terminate(&mut proc, true).await {
        Ok(exit) if exit.escalated => report.warn(format!(
            "process {} ignored the graceful stop and was killed",
            exit.pid
        )),
        Ok(_) => {}
        Err(e) => report.error(Verdict::Warning, &e),
    }
}
