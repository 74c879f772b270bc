//! CLI argument definitions using clap
//!
//! Commands:
//! - faultline crash       flood, kill, restart, scan
//! - faultline sentinel    sentinel survival across a torn large write
//! - faultline scaling     worker-pool growth under sustained load
//! - faultline bench       throughput of one pool
//! - faultline compare     static pool vs dynamic pool
//! - faultline persistence document survives a graceful restart
//! - faultline shutdown    graceful stop sequence and log markers

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// faultline - crash-durability and autoscaling harness for a KV service
#[derive(Parser, Debug)]
#[command(name = "faultline")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (defaults apply when it does not exist)
    #[arg(long, global = true, default_value = "./faultline.json")]
    pub config: PathBuf,

    /// Override the service binary
    #[arg(long, global = true)]
    pub binary: Option<PathBuf>,

    /// Override the service base URL
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Override the directory receiving service output
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Worker pool passed to the service as positional arguments
#[derive(Args, Debug, Clone, Copy, Default)]
pub struct PoolArgs {
    /// Minimum worker threads
    #[arg(long)]
    pub min_workers: Option<u32>,

    /// Maximum worker threads (requires --min-workers)
    #[arg(long, requires = "min_workers")]
    pub max_workers: Option<u32>,
}

impl PoolArgs {
    /// `[]`, `[min]` or `[min, max]`
    pub fn to_args(self) -> Vec<String> {
        match (self.min_workers, self.max_workers) {
            (Some(min), Some(max)) => vec![min.to_string(), max.to_string()],
            (Some(min), None) => vec![min.to_string()],
            _ => Vec::new(),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Flood sequential writes, kill mid-flight, restart and verify recovery
    Crash {
        #[command(flatten)]
        pool: PoolArgs,

        /// Number of crash cycles
        #[arg(long, default_value_t = 1)]
        cycles: u32,

        /// Concurrent writers
        #[arg(long, default_value_t = 1)]
        writers: u32,

        /// Key prefix
        #[arg(long, default_value = "crash_")]
        prefix: String,

        /// Filler bytes per record
        #[arg(long, default_value_t = 100)]
        payload_bytes: usize,

        /// Earliest kill after the flood starts
        #[arg(long, default_value_t = 500)]
        kill_min_ms: u64,

        /// Latest kill after the flood starts
        #[arg(long, default_value_t = 1500)]
        kill_max_ms: u64,

        /// Derive the kill window from measured write latency instead
        #[arg(long)]
        calibrate: bool,

        /// Highest index probed after restart
        #[arg(long, default_value_t = 10_000)]
        key_space: u64,

        /// Consecutive misses that end the scan
        #[arg(long, default_value_t = 100)]
        miss_limit: u32,

        /// Keep existing service state
        #[arg(long)]
        no_clean: bool,
    },

    /// Write a sentinel, kill during a large write, check what survived
    Sentinel {
        #[command(flatten)]
        pool: PoolArgs,

        /// Size of the in-window write
        #[arg(long, default_value_t = 1024 * 1024)]
        payload_bytes: usize,

        /// Kill delay after the large write starts
        #[arg(long, default_value_t = 10)]
        kill_after_ms: u64,

        /// Derive the kill delay from measured write latency instead
        #[arg(long)]
        calibrate: bool,

        /// Keep existing service state
        #[arg(long)]
        no_clean: bool,
    },

    /// Hammer the service and check the worker pool grows past its minimum
    Scaling {
        #[arg(long, default_value_t = 4)]
        min_workers: u32,

        #[arg(long, default_value_t = 16)]
        max_workers: u32,

        /// Concurrent users
        #[arg(long, default_value_t = 50)]
        users: u32,

        /// Sustained load window in seconds
        #[arg(long, default_value_t = 15)]
        duration_secs: u64,

        /// Metrics poll interval
        #[arg(long, default_value_t = 500)]
        interval_ms: u64,

        /// Metrics path override (e.g. /kv/metrics)
        #[arg(long)]
        metrics_path: Option<String>,
    },

    /// Warm up, then measure throughput of one worker pool
    Bench {
        #[command(flatten)]
        pool: PoolArgs,

        #[command(flatten)]
        load: BenchArgs,
    },

    /// Benchmark a static pool against a dynamic pool
    Compare {
        #[arg(long, default_value_t = 4)]
        min_workers: u32,

        #[arg(long, default_value_t = 16)]
        max_workers: u32,

        #[command(flatten)]
        load: BenchArgs,
    },

    /// Write a document, restart gracefully, require it back unchanged
    Persistence {
        #[command(flatten)]
        pool: PoolArgs,

        /// Keep existing service state
        #[arg(long)]
        no_clean: bool,
    },

    /// Stop gracefully and check the shutdown log markers
    Shutdown {
        #[command(flatten)]
        pool: PoolArgs,
    },
}

/// Benchmark load shape
#[derive(Args, Debug, Clone, Copy)]
pub struct BenchArgs {
    /// Concurrent users in the measured phase
    #[arg(long, default_value_t = 50)]
    pub users: u32,

    /// Measured phase length in seconds
    #[arg(long, default_value_t = 30)]
    pub duration_secs: u64,

    /// Concurrent users in the warmup phase
    #[arg(long, default_value_t = 10)]
    pub warmup_users: u32,

    /// Warmup length in seconds (0 disables it)
    #[arg(long, default_value_t = 5)]
    pub warmup_secs: u64,

    /// Random keys per user
    #[arg(long, default_value_t = 1000)]
    pub key_space: u32,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
