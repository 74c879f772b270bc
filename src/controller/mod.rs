//! Lifecycle control of the external service process
//!
//! - `ServiceController::launch` spawns and health-polls until ready
//! - `terminate(graceful)` stops politely with escalation, or kills outright
//! - `await_exit` reaps, escalating on timeout

mod process;
mod service;
mod state;

pub use process::{ExitReport, ServiceProcess};
pub use service::ServiceController;
pub use state::LifecycleState;

/// Positional startup arguments for a worker pool of `min..=max` threads
pub fn pool_args(min_workers: u32, max_workers: u32) -> Vec<String> {
    vec![min_workers.to_string(), max_workers.to_string()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_args() {
        assert_eq!(pool_args(4, 16), vec!["4".to_string(), "16".to_string()]);
    }
}
