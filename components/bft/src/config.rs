//! Configuration of a consensus instance.
use std::{sync::Arc, time::Duration};

use dv_consensus_engine::DecidedStore;
use dv_consensus_roles::operator;
use tokio::sync::mpsc;

use crate::qbft::{Instance, MessageQueue, TokioTimer};

/// Configuration of a consensus instance. Immutable for the instance's
/// lifetime.
#[derive(Debug)]
pub struct Config {
    /// This operator's id within the committee.
    pub operator_id: operator::OperatorId,
    /// This operator's secret key.
    pub secret_key: operator::SecretKey,
    /// The committee running this instance.
    pub committee: operator::Committee,
    /// Decision context the instance is scoped to.
    pub identifier: operator::Identifier,
    /// Height the instance is deciding.
    pub height: operator::Height,
    /// Duration of the first round; later rounds back off exponentially.
    pub base_round_timeout: Duration,
    /// Durable store for decided certificates.
    pub decided_store: Box<dyn DecidedStore>,
}

impl Config {
    /// Number of distinct signers required for a decision.
    pub fn quorum_threshold(&self) -> usize {
        self.committee.quorum_threshold()
    }

    /// Builds an instance with the production round timer. Returns the
    /// instance together with the queue handle the transport delivers into.
    pub fn build(
        self,
        outbound: mpsc::UnboundedSender<operator::SignedMessage>,
    ) -> (Instance, Arc<MessageQueue>) {
        let (timer, timer_events) = TokioTimer::new(self.base_round_timeout);
        let instance = Instance::new(Arc::new(self), outbound, Box::new(timer), timer_events);
        let queue = instance.queue();
        (instance, queue)
    }
}
