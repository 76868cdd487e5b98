//! # Timers
//!
//! The machine keeps at most one pending timer as part of its own state, measured
//! against a logical clock. Nothing here sleeps: a host advances the clock and
//! the machine fires whatever has come due.

use std::time::Duration;

/// What a pending timer does when it fires.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// One-shot auto-start from `IDLE`.
    AutoStart,
    /// `EXECUTION_STARTED` -> `STEP_RUNNING`.
    EnterStep,
    /// `STEP_RUNNING` -> `STEP_COMPLETED`.
    CompleteStep,
    /// `STEP_COMPLETED` -> next `STEP_RUNNING` or `EXECUTION_FINISHED`.
    AdvanceStep,
}

/// A single scheduled transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingTimer {
    pub kind: TimerKind,
    /// Step the timer was armed for; `None` for auto-start.
    pub step_index: Option<usize>,
    /// Logical time at which the timer fires.
    pub deadline: Duration,
}

impl PendingTimer {
    /// Whether this timer was armed for the same transition of the same step.
    pub fn matches(&self, kind: TimerKind, step_index: Option<usize>) -> bool {
        self.kind == kind && self.step_index == step_index
    }
}

/// Monotonic logical clock, measured from the machine's creation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LogicalClock {
    now: Duration,
}

impl LogicalClock {
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Moves the clock forward. Earlier instants are ignored.
    pub fn advance_to(&mut self, instant: Duration) {
        if instant > self.now {
            self.now = instant;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_never_runs_backwards() {
        let mut clock = LogicalClock::default();
        clock.advance_to(Duration::from_millis(500));
        clock.advance_to(Duration::from_millis(200));
        assert_eq!(clock.now(), Duration::from_millis(500));
    }
}
