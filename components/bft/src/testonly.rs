//! Test-only utilities.
use std::sync::{Arc, Mutex};

use dv_consensus_roles::operator;

use crate::qbft::{RoundTimer, TimerState};

/// Deterministic round timer for tests. It never fires on its own: tests
/// trigger expiry explicitly through [`MockTimer::fire`] and feed the event
/// to the instance themselves. Records the expirations for verification.
/// Clones share state, so a test can keep a handle to a timer owned by an
/// instance.
#[derive(Debug, Clone, Default)]
pub struct MockTimer(Arc<Mutex<MockTimerInner>>);

#[derive(Debug, Default)]
struct MockTimerInner {
    state: TimerState,
    scheduled_round: Option<operator::Round>,
    /// Count of expirations so far.
    timeouts: usize,
    /// Round at the last expiry.
    round: Option<operator::Round>,
}

impl MockTimer {
    /// New timer in the idle state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates a natural expiry of the armed schedule. Returns the armed
    /// round, to be fed to the instance. No-op unless scheduled.
    pub fn fire(&self) -> Option<operator::Round> {
        let mut inner = self.0.lock().unwrap();
        if inner.state != TimerState::Scheduled {
            return None;
        }
        inner.state = TimerState::Fired;
        inner.timeouts += 1;
        inner.round = inner.scheduled_round;
        inner.round
    }

    /// Count of expirations so far.
    pub fn timeouts(&self) -> usize {
        self.0.lock().unwrap().timeouts
    }

    /// Round at the last expiry.
    pub fn last_fired_round(&self) -> Option<operator::Round> {
        self.0.lock().unwrap().round
    }

    /// Round the timer is currently armed for.
    pub fn scheduled_round(&self) -> Option<operator::Round> {
        self.0.lock().unwrap().scheduled_round
    }
}

impl RoundTimer for MockTimer {
    fn schedule(&mut self, round: operator::Round) {
        let mut inner = self.0.lock().unwrap();
        inner.state = TimerState::Scheduled;
        inner.scheduled_round = Some(round);
    }

    fn cancel(&mut self) {
        let mut inner = self.0.lock().unwrap();
        if inner.state == TimerState::Scheduled {
            inner.state = TimerState::Canceled;
        }
    }

    fn state(&self) -> TimerState {
        self.0.lock().unwrap().state
    }
}
