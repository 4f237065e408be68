//! Unit-test harness for the instance state machine.
use std::sync::Arc;

use dv_consensus_engine::testonly::in_memory;
use dv_consensus_roles::operator::{self, testonly::Setup};
use rand::Rng;
use tokio::sync::mpsc;

use crate::{
    qbft::{pipeline, Instance},
    testonly::MockTimer,
    Config,
};

pub(crate) const BASE_TIMEOUT: std::time::Duration = std::time::Duration::from_millis(2000);

/// `UnitTestHarness` wires an instance against a mock timer, an in-memory
/// decided store and a captured outbound channel.
/// The instance acts as operator 1; the harness holds every committee key.
/// It should be instantiated once for every test case.
pub(crate) struct UnitTestHarness {
    pub(crate) instance: Instance,
    pub(crate) setup: Setup,
    pub(crate) timer: MockTimer,
    pub(crate) store: in_memory::DecidedStore,
    pub(crate) outbound: mpsc::UnboundedReceiver<operator::SignedMessage>,
}

impl UnitTestHarness {
    /// New harness with the given committee size.
    pub(crate) fn new(rng: &mut impl Rng, operators: usize) -> Self {
        let setup = Setup::new(rng, operators);
        let store = in_memory::DecidedStore::new();
        let (outbound_send, outbound_recv) = mpsc::unbounded_channel();
        let (_timer_events_send, timer_events_recv) = mpsc::unbounded_channel();
        let timer = MockTimer::new();

        let config = Arc::new(Config {
            operator_id: setup.operator_id(0),
            secret_key: setup.keys[0].clone(),
            committee: setup.committee.clone(),
            identifier: setup.identifier.clone(),
            height: setup.height,
            base_round_timeout: BASE_TIMEOUT,
            decided_store: Box::new(store.clone()),
        });
        let instance = Instance::new(
            config,
            outbound_send,
            Box::new(timer.clone()),
            timer_events_recv,
        );

        Self {
            instance,
            setup,
            timer,
            store,
            outbound: outbound_recv,
        }
    }

    /// The proposer of the given round.
    pub(crate) fn proposer(&self, round: operator::Round) -> operator::OperatorId {
        self.setup.committee.proposer(self.setup.height, round)
    }

    /// Processes one message through the instance.
    pub(crate) async fn process(
        &mut self,
        msg: operator::SignedMessage,
    ) -> Result<(), pipeline::Error> {
        self.instance.process_message(&msg).await
    }

    /// Feeds the round's proposal, signed by the designated proposer.
    pub(crate) async fn process_proposal(
        &mut self,
        round: operator::Round,
        value: &[u8],
    ) -> Result<(), pipeline::Error> {
        let msg = self
            .setup
            .sign(self.proposer(round), self.setup.proposal_message(round, value));
        self.process(msg).await
    }

    /// Feeds prepare votes from the first `count` operators.
    pub(crate) async fn process_prepares(
        &mut self,
        round: operator::Round,
        value: &[u8],
        count: usize,
    ) -> Result<(), pipeline::Error> {
        for index in 0..count {
            let id = self.setup.operator_id(index);
            let msg = self.setup.sign(id, self.setup.prepare_message(round, value));
            self.process(msg).await?;
        }
        Ok(())
    }

    /// Feeds commit votes from the first `count` operators.
    pub(crate) async fn process_commits(
        &mut self,
        round: operator::Round,
        value: &[u8],
        count: usize,
    ) -> Result<(), pipeline::Error> {
        for index in 0..count {
            let id = self.setup.operator_id(index);
            let msg = self.setup.sign(id, self.setup.commit_message(round, value));
            self.process(msg).await?;
        }
        Ok(())
    }

    /// Pops the next captured outbound message, if any.
    pub(crate) fn try_recv(&mut self) -> Option<operator::SignedMessage> {
        self.outbound.try_recv().ok()
    }

    /// Drains the captured outbound messages.
    pub(crate) fn drain_outbound(&mut self) -> Vec<operator::SignedMessage> {
        let mut msgs = Vec::new();
        while let Some(msg) = self.try_recv() {
            msgs.push(msg);
        }
        msgs
    }
}
