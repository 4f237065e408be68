use std::time::Duration;

use dv_consensus_roles::operator::Round;
use test_casing::test_casing;

use crate::{
    qbft::{round_timeout, RoundTimer as _, TimerState, TokioTimer},
    testonly::MockTimer,
};

#[test]
fn mock_timer_records_expiry() {
    let mut timer = MockTimer::new();
    assert_eq!(timer.state(), TimerState::Idle);

    timer.schedule(Round(3));
    assert_eq!(timer.state(), TimerState::Scheduled);

    assert_eq!(timer.fire(), Some(Round(3)));
    assert_eq!(timer.state(), TimerState::Fired);
    assert_eq!(timer.timeouts(), 1);
    assert_eq!(timer.last_fired_round(), Some(Round(3)));

    // One expiry per schedule.
    assert_eq!(timer.fire(), None);
    assert_eq!(timer.timeouts(), 1);
}

#[test]
fn mock_timer_cancel_suppresses_expiry() {
    let mut timer = MockTimer::new();
    timer.schedule(Round(1));
    timer.cancel();
    assert_eq!(timer.state(), TimerState::Canceled);

    assert_eq!(timer.fire(), None);
    assert_eq!(timer.timeouts(), 0);
    assert_eq!(timer.last_fired_round(), None);

    // Cancel is idempotent and doesn't disturb other states.
    timer.cancel();
    assert_eq!(timer.state(), TimerState::Canceled);
    timer.schedule(Round(2));
    timer.fire();
    timer.cancel();
    assert_eq!(timer.state(), TimerState::Fired);
}

#[test]
fn mock_timer_reschedule_replaces_schedule() {
    let mut timer = MockTimer::new();
    timer.schedule(Round(1));
    timer.schedule(Round(2));

    assert_eq!(timer.fire(), Some(Round(2)));
    assert_eq!(timer.timeouts(), 1);
    assert_eq!(timer.fire(), None);
}

const BACKOFF_CASES: [(u64, u32); 6] = [(1, 1), (2, 2), (3, 4), (4, 8), (11, 1024), (20, 1024)];

#[test_casing(6, BACKOFF_CASES)]
#[test]
fn round_timeout_backs_off_exponentially(round: u64, multiplier: u32) {
    assert_eq!(
        round_timeout(Duration::from_millis(100), Round(round)),
        Duration::from_millis(100) * multiplier,
    );
}

#[tokio::test(start_paused = true)]
async fn tokio_timer_fires_into_the_event_channel() {
    let (mut timer, mut events) = TokioTimer::new(Duration::from_millis(10));
    timer.schedule(Round(1));
    assert_eq!(timer.state(), TimerState::Scheduled);

    assert_eq!(events.recv().await, Some(Round(1)));
    assert_eq!(timer.state(), TimerState::Fired);
}

#[tokio::test(start_paused = true)]
async fn tokio_timer_cancel_suppresses_expiry() {
    let (mut timer, mut events) = TokioTimer::new(Duration::from_millis(10));
    timer.schedule(Round(1));
    timer.cancel();
    assert_eq!(timer.state(), TimerState::Canceled);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(events.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn tokio_timer_reschedule_cancels_prior_schedule() {
    let (mut timer, mut events) = TokioTimer::new(Duration::from_millis(10));
    timer.schedule(Round(1));
    timer.schedule(Round(2));

    // Only the later schedule fires, after the round-2 backoff.
    assert_eq!(events.recv().await, Some(Round(2)));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(events.try_recv().is_err());
}
