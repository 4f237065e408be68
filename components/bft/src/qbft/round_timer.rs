//! Round timers.
//!
//! Each instance arms one timer per round; on expiry the instance moves to
//! the next round. Durations double with the round number so that under
//! adversarial delay the committee eventually shares a long enough round.
use std::{
    fmt,
    sync::{Arc, Mutex},
    time::Duration,
};

use dv_consensus_roles::operator;
use tokio::sync::mpsc;

/// States of a round timer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimerState {
    /// Nothing armed yet.
    #[default]
    Idle,
    /// Armed for a round, expiry pending.
    Scheduled,
    /// Expired naturally and delivered its event.
    Fired,
    /// Canceled before expiry.
    Canceled,
}

/// Capability for scheduling a single expiry event per round.
/// Re-scheduling while armed implicitly cancels the prior schedule, so at
/// most one expiry is outstanding per instance.
pub trait RoundTimer: fmt::Debug + Send {
    /// Arms the timer for the given round. Implicitly cancels any
    /// outstanding schedule.
    fn schedule(&mut self, round: operator::Round);
    /// Cancels the outstanding schedule, suppressing its expiry event.
    /// Idempotent.
    fn cancel(&mut self);
    /// Current state of the timer.
    fn state(&self) -> TimerState;
}

/// The base duration of a round.
pub const BASE_ROUND_TIMEOUT: Duration = Duration::from_millis(2000);

/// Duration of the given round. On every round we double the duration,
/// starting from the base duration, capped so the shift cannot overflow.
pub fn round_timeout(base: Duration, round: operator::Round) -> Duration {
    const MAX_EXPONENT: u64 = 10;
    let exponent = round.0.saturating_sub(1).min(MAX_EXPONENT) as u32;
    base.saturating_mul(2u32.pow(exponent))
}

/// Production timer backed by a tokio task. On expiry it posts the armed
/// round into the instance's event channel, so that round changes go through
/// the same single-consumer path as inbound messages.
#[derive(Debug)]
pub struct TokioTimer {
    base: Duration,
    events: mpsc::UnboundedSender<operator::Round>,
    state: Arc<Mutex<TimerState>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl TokioTimer {
    /// New timer. Returns the receiving end of the expiry-event channel,
    /// to be handed to the instance's consumer loop.
    pub fn new(base: Duration) -> (Self, mpsc::UnboundedReceiver<operator::Round>) {
        let (events, events_recv) = mpsc::unbounded_channel();
        (
            Self {
                base,
                events,
                state: Arc::new(Mutex::new(TimerState::Idle)),
                task: None,
            },
            events_recv,
        )
    }
}

impl RoundTimer for TokioTimer {
    fn schedule(&mut self, round: operator::Round) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        *self.state.lock().unwrap() = TimerState::Scheduled;

        let timeout = round_timeout(self.base, round);
        let events = self.events.clone();
        let state = self.state.clone();
        self.task = Some(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            *state.lock().unwrap() = TimerState::Fired;
            // The receiver is gone only when the instance is gone.
            let _ = events.send(round);
        }));
    }

    fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        let mut state = self.state.lock().unwrap();
        if *state == TimerState::Scheduled {
            *state = TimerState::Canceled;
        }
    }

    fn state(&self) -> TimerState {
        *self.state.lock().unwrap()
    }
}

impl Drop for TokioTimer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
