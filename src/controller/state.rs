//! Service lifecycle state machine

use serde::Serialize;

use crate::errors::{HarnessError, HarnessResult};

/// Lifecycle of one service process
///
/// States only move forward. `Running -> Killed` is the forced path that
/// skips `Stopped`; `Stopped -> Killed` is graceful-stop escalation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LifecycleState {
    NotStarted,
    Starting,
    Ready,
    Running,
    Stopped,
    Killed,
    Exited,
}

impl LifecycleState {
    /// Whether `self -> next` is a legal move
    pub fn can_transition_to(self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, next),
            (NotStarted, Starting)
                | (Starting, Ready)
                | (Starting, Killed)
                | (Starting, Exited)
                | (Ready, Running)
                | (Ready, Stopped)
                | (Ready, Killed)
                | (Ready, Exited)
                | (Running, Stopped)
                | (Running, Killed)
                | (Running, Exited)
                | (Stopped, Killed)
                | (Stopped, Exited)
                | (Killed, Exited)
        )
    }

    /// Move to `next` or fail with `InvalidTransition`
    pub fn transition(&mut self, next: LifecycleState) -> HarnessResult<()> {
        if !self.can_transition_to(next) {
            return Err(HarnessError::InvalidTransition {
                from: *self,
                to: next,
            });
        }
        *self = next;
        Ok(())
    }

    /// The process may still be alive
    pub fn is_live(self) -> bool {
        !matches!(self, LifecycleState::NotStarted | LifecycleState::Exited)
    }
}

#[cfg(test)]
mod tests {
    use super::LifecycleState::*;
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut state = NotStarted;
        for next in [Starting, Ready, Running, Stopped, Exited] {
            state.transition(next).unwrap();
        }
        assert_eq!(state, Exited);
        assert!(!state.is_live());
    }

    #[test]
    fn test_forced_kill_bypasses_stop() {
        let mut state = Running;
        state.transition(Killed).unwrap();
        state.transition(Exited).unwrap();
    }

    #[test]
    fn test_graceful_escalation() {
        let mut state = Stopped;
        state.transition(Killed).unwrap();
    }

    #[test]
    fn test_no_backward_moves() {
        assert!(!Running.can_transition_to(Ready));
        assert!(!Exited.can_transition_to(Starting));
        assert!(!Killed.can_transition_to(Stopped));
        assert!(!NotStarted.can_transition_to(Ready));

        let mut state = Exited;
        let err = state.transition(Running).unwrap_err();
        assert_eq!(err.code(), "FAULTLINE_INVALID_TRANSITION");
        assert_eq!(state, Exited);
    }
}
