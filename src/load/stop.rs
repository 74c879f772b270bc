//! Cooperative stop signalling
//!
//! Tasks check the end condition between iterations, never mid-request.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared write-once stop flag for one phase
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    /// A lowered flag
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag; returns true only for the call that raised it
    pub fn raise(&self) -> bool {
        !self.0.swap(true, Ordering::AcqRel)
    }

    /// Whether the flag has been raised
    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// When a load task should stop: a deadline, a flag, or whichever comes first
#[derive(Debug, Clone, Default)]
pub struct EndCondition {
    deadline: Option<Instant>,
    flag: Option<StopFlag>,
}

impl EndCondition {
    /// Stop at a fixed instant
    pub fn at(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            flag: None,
        }
    }

    /// Stop after a duration from now
    pub fn after(duration: Duration) -> Self {
        Self::at(Instant::now() + duration)
    }

    /// Stop when the flag is raised
    pub fn on(flag: StopFlag) -> Self {
        Self {
            deadline: None,
            flag: Some(flag),
        }
    }

    /// Also stop when `flag` is raised
    pub fn or_flag(mut self, flag: StopFlag) -> Self {
        self.flag = Some(flag);
        self
    }

    /// Whether the task should stop now
    pub fn reached(&self) -> bool {
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return true;
            }
        }
        self.flag.as_ref().map(StopFlag::is_raised).unwrap_or(false)
    }
}
