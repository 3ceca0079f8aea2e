//! Poll cycle state machine.
//!
//! ```text
//!            observe(terminal, no analysis)
//!   Idle ───────────────────────────────────▶ Polling ──tick x max──▶ Stopped(Exhausted)
//!                                              │   ▲                        │
//!                    observe(analysis present) │   │ refresh()              │
//!                                              ▼   │                        │
//!                                    Stopped(Resolved) ◀────────────────────┘
//! ```
//!
//! `refresh()` restarts polling from any state. Time is not modelled here;
//! the owner calls `tick()` once per interval.

use carewatch_core::CallStatus;
use serde::Serialize;

/// Why a cycle stopped polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The poll budget ran out without an analysis
    Exhausted,
    /// The analysis became available
    Resolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "reason")]
pub enum PollState {
    #[default]
    Idle,
    Polling,
    Stopped(StopReason),
}

/// Bounded poll counter for one call.
#[derive(Debug, Clone)]
pub struct PollCycle {
    state: PollState,
    attempts: u32,
    max_polls: u32,
}

impl PollCycle {
    pub fn new(max_polls: u32) -> Self {
        Self {
            state: PollState::Idle,
            attempts: 0,
            max_polls,
        }
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    /// Polls performed since polling last (re)started.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_polls(&self) -> u32 {
        self.max_polls
    }

    /// True once the budget ran out without an analysis.
    pub fn is_timed_out(&self) -> bool {
        self.state == PollState::Stopped(StopReason::Exhausted)
    }

    /// Feeds the latest known call state.
    ///
    /// Returns `true` when this observation starts polling: the call is
    /// terminal, has no analysis and polling has never started. An
    /// analysis arriving while polling stops it.
    pub fn observe(&mut self, status: CallStatus, has_analysis: bool) -> bool {
        if has_analysis {
            if self.state == PollState::Polling {
                self.state = PollState::Stopped(StopReason::Resolved);
            }
            return false;
        }

        if self.state == PollState::Idle && status.is_terminal() {
            self.state = PollState::Polling;
            self.attempts = 0;
            return true;
        }
        false
    }

    /// Advances one interval.
    ///
    /// Returns the attempt number to fetch, or `None` if nothing should be
    /// fetched. The tick that uses the last attempt also stops the cycle.
    pub fn tick(&mut self) -> Option<u32> {
        if self.state != PollState::Polling {
            return None;
        }
        if self.attempts >= self.max_polls {
            self.state = PollState::Stopped(StopReason::Exhausted);
            return None;
        }

        self.attempts += 1;
        if self.attempts >= self.max_polls {
            self.state = PollState::Stopped(StopReason::Exhausted);
        }
        Some(self.attempts)
    }

    /// Restarts polling with a fresh budget.
    pub fn refresh(&mut self) {
        self.attempts = 0;
        self.state = PollState::Polling;
    }
}
