//! Per-instance message admission queue.
//!
//! The queue shields an instance from being flooded by stale or premature
//! messages: anything below the current round is dropped on arrival, anything
//! above it is parked in a bag until the instance reaches that round.
use std::{collections::VecDeque, sync::Mutex};

use dv_consensus_roles::operator;
use tokio::sync::Notify;

/// A broker of messages for the consensus instance to process.
/// Safe for many concurrent producers and a single consumer.
#[derive(Debug)]
pub struct MessageQueue {
    inner: Mutex<Inner>,
    /// Wakes the consumer when a message lands in the current-round queue.
    notify: Notify,
}

#[derive(Debug)]
struct Inner {
    current_round: operator::Round,
    current: VecDeque<operator::SignedMessage>,
    future: Vec<operator::SignedMessage>,
}

impl MessageQueue {
    /// New empty queue, admitting messages for `initial_round` and above.
    pub fn new(initial_round: operator::Round) -> Self {
        Self {
            inner: Mutex::new(Inner {
                current_round: initial_round,
                current: VecDeque::new(),
                future: Vec::new(),
            }),
            notify: Notify::new(),
        }
    }

    /// Adds a message to the queue based on the message round.
    /// Messages below the current round are silently dropped.
    pub fn add_message(&self, msg: operator::SignedMessage) {
        let mut inner = self.inner.lock().unwrap();

        if msg.message.round < inner.current_round {
            // Not admitting previous round messages.
            return;
        }

        if msg.message.round == inner.current_round {
            inner.current.push_back(msg);
            self.notify.notify_one();
        } else {
            inner.future.push(msg);
        }
    }

    /// Returns and removes a message from the current-round queue, FIFO.
    /// Returns `None` if no messages are queued. Never blocks.
    pub fn pop_message(&self) -> Option<operator::SignedMessage> {
        self.inner.lock().unwrap().current.pop_front()
    }

    /// Moves the queue to a new round: drops everything below it, promotes
    /// the buffered messages that match it, keeps the rest parked.
    /// Rounds are monotonic, so `new_round` is expected to be at least the
    /// current round.
    pub fn set_round(&self, new_round: operator::Round) {
        let mut inner = self.inner.lock().unwrap();

        // Repeating the current round is a no-op: the buffered messages for
        // it were already moved into the FIFO, clearing it again would lose
        // them.
        if new_round == inner.current_round {
            return;
        }

        inner.current_round = new_round;
        inner.current.clear();

        let future = std::mem::take(&mut inner.future);
        for msg in future {
            if msg.message.round < new_round {
                // Unreachable past, dropped.
            } else if msg.message.round == new_round {
                inner.current.push_back(msg);
            } else {
                inner.future.push(msg);
            }
        }

        if !inner.current.is_empty() {
            self.notify.notify_one();
        }
    }

    /// The round the queue currently admits into the FIFO.
    pub fn current_round(&self) -> operator::Round {
        self.inner.lock().unwrap().current_round
    }

    /// Number of buffered future-round messages.
    pub fn future_len(&self) -> usize {
        self.inner.lock().unwrap().future.len()
    }

    /// Resolves when a message may be available in the current-round queue.
    /// Used by the consumer loop to park between messages.
    pub(crate) async fn notified(&self) {
        self.notify.notified().await;
    }
}
