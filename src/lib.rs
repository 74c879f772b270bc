//! faultline - crash-durability and autoscaling verification harness
//!
//! Drives an external key-value service through launch, write floods,
//! forced kills and restarts, then judges what it recovered. Also samples
//! the service's concurrency metrics to confirm its worker pool scales.

pub mod bench;
pub mod cli;
pub mod client;
pub mod config;
pub mod controller;
pub mod errors;
pub mod fault;
pub mod load;
pub mod metrics;
pub mod observability;
pub mod recovery;
pub mod scenario;
