//! CLI command implementations
//!
//! Each command loads configuration, applies overrides, runs one scenario
//! on a fresh tokio runtime and prints its report(s). A FAIL verdict is
//! returned as an error so the process exits non-zero.

use std::time::Duration;

use crate::bench::Phase;
use crate::config::HarnessConfig;
use crate::controller::ServiceController;
use crate::fault::KillWindow;
use crate::scenario::bench::BenchParams;
use crate::scenario::crash::CrashParams;
use crate::scenario::graceful::{PersistenceParams, ShutdownParams};
use crate::scenario::scaling::ScalingParams;
use crate::scenario::sentinel::SentinelParams;
use crate::scenario::{self, overall, CycleReport, Verdict};

use super::args::{BenchArgs, Cli, Command};
use super::errors::{CliError, CliResult};
use super::io::write_json;

/// Parse arguments and run the selected command
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    run_command(cli)
}

/// Run a parsed command line
pub fn run_command(cli: Cli) -> CliResult<()> {
    let config = load_config(&cli)?;
    let controller = ServiceController::new(&config)?;

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::setup_failed(format!("Failed to create tokio runtime: {}", e)))?;
    let reports = rt.block_on(dispatch(&controller, cli.command));

    if reports.len() == 1 {
        write_json(&reports[0])?;
    } else {
        write_json(&reports)?;
    }

    match overall(&reports) {
        Verdict::Fail => {
            let failed: Vec<String> = reports
                .iter()
                .filter(|r| r.is_failure())
                .map(|r| format!("{} cycle {}", r.scenario, r.cycle))
                .collect();
            Err(CliError::verdict_failed(format!("FAIL: {}", failed.join(", "))))
        }
        _ => Ok(()),
    }
}

/// Load the config file and apply command-line overrides
pub fn load_config(cli: &Cli) -> CliResult<HarnessConfig> {
    let mut config = HarnessConfig::load(&cli.config)?;
    if let Some(binary) = &cli.binary {
        config.service_binary = binary.clone();
    }
    if let Some(url) = &cli.base_url {
        config.base_url = url.clone();
    }
    if let Some(dir) = &cli.log_dir {
        config.log_dir = dir.clone();
    }
    config.validate()?;
    Ok(config)
}

async fn dispatch(controller: &ServiceController, command: Command) -> Vec<CycleReport> {
    match command {
        Command::Crash {
            pool,
            cycles,
            writers,
            prefix,
            payload_bytes,
            kill_min_ms,
            kill_max_ms,
            calibrate,
            key_space,
            miss_limit,
            no_clean,
        } => {
            let window = (!calibrate).then(|| KillWindow::Uniform {
                min: Duration::from_millis(kill_min_ms),
                max: Duration::from_millis(kill_max_ms),
            });
            let params = CrashParams {
                args: pool.to_args(),
                prefix,
                writers,
                payload_bytes,
                window,
                key_space_bound: key_space,
                miss_streak_limit: miss_limit,
                clean_start: !no_clean,
            };
            scenario::crash::run(controller, &params, cycles).await
        }

        Command::Sentinel {
            pool,
            payload_bytes,
            kill_after_ms,
            calibrate,
            no_clean,
        } => {
            let params = SentinelParams {
                args: pool.to_args(),
                payload_bytes,
                window: (!calibrate).then(|| KillWindow::Fixed(Duration::from_millis(kill_after_ms))),
                clean_start: !no_clean,
                ..SentinelParams::default()
            };
            vec![scenario::sentinel::run(controller, &params).await]
        }

        Command::Scaling {
            min_workers,
            max_workers,
            users,
            duration_secs,
            interval_ms,
            metrics_path,
        } => {
            let params = ScalingParams {
                min_workers,
                max_workers,
                users,
                duration: Duration::from_secs(duration_secs),
                interval: Duration::from_millis(interval_ms),
                metrics_path,
            };
            vec![scenario::scaling::run(controller, &params).await]
        }

        Command::Bench { pool, load } => {
            let params = bench_params(pool.to_args(), load);
            vec![scenario::bench::run(controller, &params).await]
        }

        Command::Compare {
            min_workers,
            max_workers,
            load,
        } => {
            // compare supplies its own pool arguments per run
            let params = bench_params(Vec::new(), load);
            vec![scenario::bench::compare(controller, &params, min_workers, max_workers).await]
        }

        Command::Persistence { pool, no_clean } => {
            let params = PersistenceParams {
                args: pool.to_args(),
                clean_start: !no_clean,
                ..PersistenceParams::default()
            };
            vec![scenario::graceful::persistence(controller, &params).await]
        }

        Command::Shutdown { pool } => {
            let params = ShutdownParams {
                args: pool.to_args(),
                ..ShutdownParams::default()
            };
            vec![scenario::graceful::shutdown(controller, &params).await]
        }
    }
}

fn bench_params(args: Vec<String>, load: BenchArgs) -> BenchParams {
    BenchParams {
        args,
        warmup: Phase::new(load.warmup_users, Duration::from_secs(load.warmup_secs)),
        measured: Phase::new(load.users, Duration::from_secs(load.duration_secs)),
        key_space: load.key_space,
        ..BenchParams::default()
    }
}
