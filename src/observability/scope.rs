//! Phase scopes
//!
//! - Logs `{PHASE}_BEGIN` on creation
//! - Logs `{PHASE}_COMPLETE` with the elapsed time on `complete()`
//! - Logs `{PHASE}_ABORTED` on drop if never completed (a `?` bailed out)

use std::time::Instant;

use super::logger::Logger;

/// A harness phase with automatic begin/complete logging
///
/// Owns its strings so it can be held across `.await` points.
pub struct PhaseScope {
    name: String,
    fields: Vec<(String, String)>,
    started: Instant,
    done: bool,
}

impl PhaseScope {
    /// Begin a phase
    pub fn begin(name: &str) -> Self {
        Self::begin_with(name, &[])
    }

    /// Begin a phase with fields repeated on the closing line
    pub fn begin_with(name: &str, fields: &[(&str, &str)]) -> Self {
        Logger::info(&format!("{}_BEGIN", name), fields);
        Self {
            name: name.to_string(),
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            started: Instant::now(),
            done: false,
        }
    }

    /// Milliseconds since the phase began
    pub fn elapsed_ms(&self) -> u128 {
        self.started.elapsed().as_millis()
    }

    /// Close the phase successfully
    pub fn complete(self) {
        self.complete_with(&[]);
    }

    /// Close the phase successfully with extra fields
    pub fn complete_with(mut self, extra: &[(&str, &str)]) {
        self.done = true;
        let elapsed = self.elapsed_ms().to_string();
        let mut fields: Vec<(&str, &str)> = self
            .fields
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        fields.extend(extra.iter().copied());
        fields.push(("elapsed_ms", &elapsed));
        Logger::info(&format!("{}_COMPLETE", self.name), &fields);
    }

    /// Close the phase as failed
    pub fn fail(mut self, reason: &str) {
        self.done = true;
        Logger::error(&format!("{}_FAILED", self.name), &[("reason", reason)]);
    }
}

impl Drop for PhaseScope {
    fn drop(&mut self) {
        if !self.done {
            Logger::warn(
                &format!("{}_ABORTED", self.name),
                &[("reason", "phase dropped without completion")],
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_marks_done() {
        let scope = PhaseScope::begin_with("TEST", &[("cycle", "1")]);
        scope.complete_with(&[("verdict", "PASS")]);
    }

    #[test]
    fn test_fail_and_drop_do_not_panic() {
        PhaseScope::begin("TEST").fail("boom");
        let scope = PhaseScope::begin("TEST");
        drop(scope);
    }

    #[test]
    fn test_elapsed_advances() {
        let scope = PhaseScope::begin("TEST");
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(scope.elapsed_ms() >= 5);
        scope.complete();
    }
}
