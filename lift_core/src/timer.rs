//! Rest timer between sets.
//!
//! A single countdown, `Stopped -> Running -> Stopped`. The timer does not
//! own a clock: whoever schedules the recurring tick calls [`RestTimer::tick`]
//! with the [`TickSource`] handed out by `start`. Starting again or resetting
//! retires the previous source, so a leftover scheduler can never decrement
//! twice.

use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerState {
    Stopped,
    Running,
}

/// Token identifying the tick schedule of one countdown
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TickSource(u64);

/// Result of delivering one tick
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Tick from a retired source, or timer not running
    Ignored,
    Running { remaining: u32 },
    /// Countdown reached zero; the timer is now stopped
    Completed,
}

#[derive(Clone, Debug)]
pub struct RestTimer {
    state: TimerState,
    remaining: u32,
    source: u64,
    tick_interval: Duration,
}

impl RestTimer {
    pub fn new(tick_interval: Duration) -> Self {
        Self {
            state: TimerState::Stopped,
            remaining: 0,
            source: 0,
            tick_interval,
        }
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == TimerState::Running
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// How often the scheduler should call `tick`
    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Start counting down from `seconds`, replacing any running countdown
    pub fn start(&mut self, seconds: u32) -> TickSource {
        self.source += 1;
        self.remaining = seconds;
        self.state = if seconds > 0 {
            TimerState::Running
        } else {
            TimerState::Stopped
        };
        tracing::debug!("Rest timer started: {}s", seconds);
        TickSource(self.source)
    }

    /// Add (or with a negative delta, remove) time. No effect unless running.
    ///
    /// Removing all remaining time completes the countdown at once.
    pub fn extend(&mut self, delta_seconds: i64) -> TickOutcome {
        if !self.is_running() {
            return TickOutcome::Ignored;
        }
        let extended = i64::from(self.remaining).saturating_add(delta_seconds);
        self.remaining = u32::try_from(extended.max(0)).unwrap_or(u32::MAX);
        tracing::debug!("Rest timer extended by {}s", delta_seconds);

        if self.remaining == 0 {
            self.state = TimerState::Stopped;
            self.source += 1;
            tracing::debug!("Rest timer finished");
            return TickOutcome::Completed;
        }
        TickOutcome::Running {
            remaining: self.remaining,
        }
    }

    /// Stop and retire the current tick source. Safe to call repeatedly.
    pub fn reset(&mut self) {
        if self.is_running() {
            tracing::debug!("Rest timer reset with {}s left", self.remaining);
        }
        self.source += 1;
        self.remaining = 0;
        self.state = TimerState::Stopped;
    }

    /// Advance one interval
    pub fn tick(&mut self, source: TickSource) -> TickOutcome {
        if !self.is_running() || source.0 != self.source {
            return TickOutcome::Ignored;
        }

        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.state = TimerState::Stopped;
            self.source += 1;
            tracing::debug!("Rest timer finished");
            return TickOutcome::Completed;
        }
        TickOutcome::Running {
            remaining: self.remaining,
        }
    }

    /// Remaining time as `MM:SS`
    pub fn display(&self) -> String {
        format!("{:02}:{:02}", self.remaining / 60, self.remaining % 60)
    }
}

impl Default for RestTimer {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}
