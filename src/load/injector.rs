//! Concurrent load injection
//!
//! N tasks loop until their end condition holds, issuing one unit of work
//! per iteration. Request failures are counted and the loop carries on.

use std::sync::Arc;
use std::time::Instant;

use futures_util::future::join_all;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use serde_json::json;
use tokio::sync::Notify;

use super::record::{KeyScheme, WriteRecord};
use super::stop::EndCondition;
use crate::bench::BenchmarkResult;
use crate::client::KvClient;
use crate::errors::HarnessResult;
use crate::observability::{log_event, Event, Logger};

/// What each load task does per iteration
#[derive(Debug, Clone)]
pub enum Workload {
    /// Sequentially indexed writes, one index stream per task
    Sequential {
        scheme: KeyScheme,
        payload_bytes: usize,
    },
    /// PUT then GET of a random key in `0..=key_space`
    PutGet { prefix: String, key_space: u32 },
    /// GET the health endpoint
    Health,
}

/// What one task did
#[derive(Debug, Clone, Serialize)]
pub struct TaskTally {
    /// Task number, also the writer number for sequential workloads
    pub task: u32,
    /// Counts for this task
    pub result: BenchmarkResult,
    /// Requests started
    pub issued: u64,
    /// Highest sequential index the service acknowledged
    pub last_acked: Option<u64>,
}

impl TaskTally {
    fn new(task: u32) -> Self {
        Self {
            task,
            result: BenchmarkResult::default(),
            issued: 0,
            last_acked: None,
        }
    }
}

/// Runs N concurrent load tasks against one service
#[derive(Debug, Clone)]
pub struct LoadInjector {
    client: KvClient,
    workload: Workload,
    tasks: u32,
    started: Arc<Notify>,
}

impl LoadInjector {
    /// Tight-loop injector with `tasks` concurrent tasks
    pub fn new(client: KvClient, workload: Workload, tasks: u32) -> Self {
        Self {
            client,
            workload,
            tasks: tasks.max(1),
            started: Arc::new(Notify::new()),
        }
    }

    /// Notified once the first request of the burst is about to go out
    pub fn burst_started(&self) -> Arc<Notify> {
        Arc::clone(&self.started)
    }

    /// Run until `end` holds and return the summed result
    pub async fn run(&self, end: EndCondition) -> BenchmarkResult {
        self.run_tasks(end).await.iter().map(|t| &t.result).sum()
    }

    /// Run until `end` holds and return one tally per task
    pub async fn run_tasks(&self, end: EndCondition) -> Vec<TaskTally> {
        let handles: Vec<_> = (0..self.tasks)
            .map(|task| {
                let client = self.client.clone();
                let workload = self.workload.clone();
                let end = end.clone();
                let started = Arc::clone(&self.started);
                tokio::spawn(run_task(task, client, workload, end, started))
            })
            .collect();

        let mut tallies = Vec::with_capacity(handles.len());
        for (task, joined) in join_all(handles).await.into_iter().enumerate() {
            match joined {
                Ok(tally) => tallies.push(tally),
                Err(e) => Logger::error(
                    "LOAD_TASK_PANICKED",
                    &[("error", &e.to_string()), ("task", &task.to_string())],
                ),
            }
        }

        let total: BenchmarkResult = tallies.iter().map(|t| &t.result).sum();
        log_event(
            Event::LoadBurstJoined,
            &[
                ("errors", &total.errors.to_string()),
                ("ops", &total.ops.to_string()),
                ("tasks", &tallies.len().to_string()),
            ],
        );
        tallies
    }
}

async fn run_task(
    task: u32,
    client: KvClient,
    workload: Workload,
    end: EndCondition,
    started: Arc<Notify>,
) -> TaskTally {
    let mut tally = TaskTally::new(task);
    let mut rng = StdRng::from_entropy();
    let mut index: u64 = 0;

    while !end.reached() {
        if tally.issued == 0 {
            started.notify_one();
            if task == 0 {
                log_event(Event::LoadBurstStarted, &[]);
            }
        }
        tally.issued += 1;

        let begun = Instant::now();
        let (ops, errors) = match &workload {
            Workload::Sequential {
                scheme,
                payload_bytes,
            } => {
                let record = WriteRecord::new(scheme, task, index, *payload_bytes);
                let outcome = client.put_json(record.key(), &record.body()).await;
                if outcome.is_ok() {
                    tally.last_acked = Some(record.index());
                }
                index += 1;
                count(&outcome)
            }
            Workload::PutGet { prefix, key_space } => {
                let key = format!("{}{}_{}", prefix, task, rng.gen_range(0..=*key_space));
                let value = json!({"u": task, "d": "some data", "i": tally.result.ops});
                let put = client.put_json(&key, &value).await;
                // A miss right after our own PUT is an error too.
                let get = client.get(&key).await.and_then(|hit| {
                    hit.map(|_| ()).ok_or(crate::errors::HarnessError::UnexpectedStatus {
                        endpoint: key.clone(),
                        status: 404,
                    })
                });
                let (a, b) = (count(&put), count(&get));
                (a.0 + b.0, a.1 + b.1)
            }
            Workload::Health => count(&client.health().await),
        };
        tally.result.record(ops, errors, begun.elapsed());

        // Yield so a tight loop cannot starve the poller on a busy runtime.
        tokio::task::yield_now().await;
    }

    tally
}

fn count<T>(outcome: &HarnessResult<T>) -> (u64, u64) {
    match outcome {
        Ok(_) => (1, 0),
        Err(e) => {
            Logger::trace("LOAD_REQUEST_FAILED", &[("code", e.code())]);
            (0, 1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load::StopFlag;
    use std::time::Duration;

    fn dead_client() -> KvClient {
        KvClient::new("http://127.0.0.1:9", Duration::from_millis(50)).unwrap()
    }

    #[tokio::test]
    async fn test_errors_are_counted_not_propagated() {
        let injector = LoadInjector::new(
            dead_client(),
            Workload::Sequential {
                scheme: KeyScheme::new("crash_", 2),
                payload_bytes: 8,
            },
            2,
        );

        let tallies = injector
            .run_tasks(EndCondition::after(Duration::from_millis(150)))
            .await;
        assert_eq!(tallies.len(), 2);
        for tally in &tallies {
            assert!(tally.issued > 0);
            assert_eq!(tally.result.ops, 0);
            assert_eq!(tally.result.errors, tally.issued);
            assert_eq!(tally.last_acked, None);
        }
    }

    #[tokio::test]
    async fn test_raised_flag_stops_before_first_request() {
        let flag = StopFlag::new();
        flag.raise();
        let injector = LoadInjector::new(dead_client(), Workload::Health, 4);
        let result = injector.run(EndCondition::on(flag)).await;
        assert_eq!(result, BenchmarkResult::default());
    }
}
