//! Observability for the harness
//!
//! - Structured JSON-lines logging
//! - Typed lifecycle events
//! - Phase scopes that log begin/complete/aborted
//!
//! # Usage
//!
//! ```ignore
//! use faultline::observability::{log_event, Event, PhaseScope};
//!
//! let phase = PhaseScope::begin("RECOVERY_SCAN");
//! // ... scan ...
//! phase.complete_with(&[("max_found", "812")]);
//! log_event(Event::SentinelRecovered, &[("key", "sentinel")]);
//! ```

mod events;
mod logger;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity, LOG_LEVEL_ENV};
pub use scope::PhaseScope;

/// Log a lifecycle event; failure events go out at ERROR
pub fn log_event(event: Event, fields: &[(&str, &str)]) {
    let severity = if event.is_failure() {
        Severity::Error
    } else {
        Severity::Info
    };
    Logger::log(severity, event.as_str(), fields);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_event() {
        log_event(Event::ServiceLaunch, &[("pid", "1")]);
        log_event(Event::SentinelLost, &[("key", "sentinel")]);
    }
}
