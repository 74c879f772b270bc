//! Fault injection: forced kills timed to land inside in-flight writes
//!
//! The kill is a best-effort timing race. A cycle in which no write was
//! actually torn is still a valid cycle.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::bench::serialize_millis;
use crate::client::KvClient;
use crate::controller::{ExitReport, ServiceController, ServiceProcess};
use crate::errors::{HarnessError, HarnessResult};
use crate::load::{EndCondition, KeyScheme, LoadInjector, StopFlag, TaskTally, WriteRecord};
use crate::observability::{log_event, Event, Logger};

/// Longest the scheduler waits for the burst to issue its first request
const BURST_START_TIMEOUT: Duration = Duration::from_secs(5);

/// Delay between burst start and the kill
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillWindow {
    /// Always the same delay
    Fixed(Duration),
    /// Uniform random delay in `min..=max`
    Uniform { min: Duration, max: Duration },
}

impl KillWindow {
    /// Window of `[0.5x, 1.5x]` around an observed write latency
    pub fn around(latency: Duration) -> Self {
        KillWindow::Uniform {
            min: latency / 2,
            max: latency * 3 / 2,
        }
    }

    /// Measure mean write latency with `samples` probe writes and center a window on it
    ///
    /// Probe keys live under `{prefix}calib_` so they never collide with
    /// the flood's key space.
    pub async fn calibrated(
        client: &KvClient,
        prefix: &str,
        samples: u32,
        payload_bytes: usize,
    ) -> HarnessResult<Self> {
        let scheme = KeyScheme::new(format!("{}calib_", prefix), 1);
        let mut total = Duration::ZERO;
        let mut acked = 0u32;

        for i in 0..samples.max(1) {
            let record = WriteRecord::new(&scheme, 0, u64::from(i), payload_bytes);
            let begun = Instant::now();
            if client.put_json(record.key(), &record.body()).await.is_ok() {
                total += begun.elapsed();
                acked += 1;
            }
        }

        if acked == 0 {
            return Err(HarnessError::transient(
                client.base_url(),
                "no calibration write was acknowledged",
            ));
        }

        let mean = total / acked;
        Logger::info(
            "FAULT_WINDOW_CALIBRATED",
            &[
                ("mean_write_us", &mean.as_micros().to_string()),
                ("samples", &acked.to_string()),
            ],
        );
        Ok(Self::around(mean))
    }

    /// Draw a delay from the window
    pub fn pick<R: Rng>(&self, rng: &mut R) -> Duration {
        match *self {
            KillWindow::Fixed(d) => d,
            KillWindow::Uniform { min, max } => {
                let lo = min.as_micros() as u64;
                let hi = (max.as_micros() as u64).max(lo);
                Duration::from_micros(rng.gen_range(lo..=hi))
            }
        }
    }
}

/// The writes in flight when the kill lands
#[derive(Debug, Clone)]
pub enum Burst {
    /// A concurrent flood of sequential writes
    Flood(LoadInjector),
    /// One (typically large) write
    Single { key: String, payload: Value },
}

/// What happened around a scheduled kill
#[derive(Debug, Clone, Serialize)]
pub struct FaultOutcome {
    /// Delay actually waited after the burst started
    #[serde(rename = "delay_ms", serialize_with = "serialize_millis")]
    pub delay: Duration,
    /// Per-task tallies of a flood burst
    pub tallies: Vec<TaskTally>,
    /// Whether a single-write burst was acknowledged before the kill
    pub single_acked: Option<bool>,
    /// How the killed process ended
    pub exit: ExitReport,
}

/// Fires a forced kill while a write burst is active
#[derive(Debug, Clone, Copy)]
pub struct FaultScheduler {
    window: KillWindow,
}

impl FaultScheduler {
    /// Scheduler drawing its delay from `window`
    pub fn new(window: KillWindow) -> Self {
        Self { window }
    }

    /// Start `burst`, wait for its first request, wait the window delay, kill
    ///
    /// The kill always happens after the burst has started and before this
    /// method returns, so any verification that follows sees a dead process.
    pub async fn schedule_kill(
        &self,
        controller: &ServiceController,
        proc: &mut ServiceProcess,
        burst: Burst,
    ) -> HarnessResult<FaultOutcome> {
        let stop = StopFlag::new();

        let (pending, signal) = match burst {
            Burst::Flood(injector) => {
                let signal = injector.burst_started();
                let end = EndCondition::on(stop.clone());
                let handle = tokio::spawn(async move { injector.run_tasks(end).await });
                (Pending::Flood(handle), signal)
            }
            Burst::Single { key, payload } => {
                let client = controller.client().clone();
                let signal = Arc::new(Notify::new());
                let notify = Arc::clone(&signal);
                let handle = tokio::spawn(async move {
                    notify.notify_one();
                    client.put_json(&key, &payload).await.is_ok()
                });
                (Pending::Single(handle), signal)
            }
        };

        let window = self.window;
        let killed = async {
            if tokio::time::timeout(BURST_START_TIMEOUT, signal.notified())
                .await
                .is_err()
            {
                Logger::warn("FAULT_BURST_NOT_STARTED", &[("pid", &proc.pid().to_string())]);
            }
            controller.mark_running(proc)?;

            let delay = window.pick(&mut StdRng::from_entropy());
            tokio::time::sleep(delay).await;

            let exit = controller.terminate(proc, false).await?;
            log_event(
                Event::FaultKillIssued,
                &[
                    ("delay_us", &delay.as_micros().to_string()),
                    ("pid", &exit.pid.to_string()),
                ],
            );
            Ok::<_, HarnessError>((delay, exit))
        }
        .await;
        // Raised on every path so no flood task outlives this phase.
        stop.raise();

        let (tallies, single_acked) = match pending {
            Pending::Flood(handle) => {
                let tallies = handle.await.unwrap_or_else(|e| {
                    Logger::error("FAULT_BURST_JOIN_FAILED", &[("error", &e.to_string())]);
                    Vec::new()
                });
                (tallies, None)
            }
            Pending::Single(handle) => (Vec::new(), Some(handle.await.unwrap_or(false))),
        };
        let (delay, exit) = killed?;

        Ok(FaultOutcome {
            delay,
            tallies,
            single_acked,
            exit,
        })
    }
}

enum Pending {
    Flood(JoinHandle<Vec<TaskTally>>),
    Single(JoinHandle<bool>),
}
