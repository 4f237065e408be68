//! The QBFT instance: a state machine driving one committee decision through
//! PrePrepare, Prepare and Commit, with round changes on timeout.
use std::sync::Arc;

use dv_consensus_roles::operator;
use tokio::sync::mpsc;

use crate::Config;

mod commit;
pub mod decided;
pub mod msg_container;
pub mod msg_queue;
pub mod pipeline;
mod pre_prepare;
mod prepare;
mod round_change;
pub mod round_timer;
#[cfg(test)]
pub(crate) mod testonly;
#[cfg(test)]
mod tests;

pub use decided::{aggregate_messages, process_late_commit};
pub use msg_container::MsgContainer;
pub use msg_queue::MessageQueue;
pub use pipeline::Pipeline;
pub use round_timer::{round_timeout, RoundTimer, TimerState, TokioTimer, BASE_ROUND_TIMEOUT};

/// Phase of the instance, layered over the round. The round can advance
/// independently of the phase through round changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for the round's proposal.
    PrePrepare,
    /// Proposal accepted, collecting prepare votes.
    Prepare,
    /// Value prepared, collecting commit votes.
    Commit,
    /// Decision reached. Terminal, except that late commits may still be
    /// folded into the decided certificate.
    Decided,
}

/// The pipelines of an instance, one per message type, composed once at
/// construction.
#[derive(Debug)]
struct Pipelines {
    pre_prepare: Pipeline,
    prepare: Pipeline,
    commit: Pipeline,
    round_change: Pipeline,
}

impl Pipelines {
    fn new() -> Self {
        Self {
            pre_prepare: pre_prepare::pipeline(),
            prepare: prepare::pipeline(),
            commit: commit::pipeline(),
            round_change: round_change::pipeline(),
        }
    }

    fn for_type(&self, msg_type: operator::MsgType) -> &Pipeline {
        match msg_type {
            operator::MsgType::PrePrepare => &self.pre_prepare,
            operator::MsgType::Prepare => &self.prepare,
            operator::MsgType::Commit => &self.commit,
            operator::MsgType::RoundChange => &self.round_change,
        }
    }
}

/// A single consensus instance. The consumer loop ([`Instance::run`]) is the
/// only writer of this state; producers interact exclusively through the
/// message queue.
#[derive(Debug)]
pub struct Instance {
    pub(crate) config: Arc<Config>,
    /// Channel through which the instance broadcasts its messages.
    pub(crate) outbound: mpsc::UnboundedSender<operator::SignedMessage>,
    /// Admission queue the transport delivers into.
    pub(crate) queue: Arc<MessageQueue>,
    /// Round timer capability.
    pub(crate) timer: Box<dyn RoundTimer>,
    /// Expiry events posted by the timer.
    pub(crate) timer_events: mpsc::UnboundedReceiver<operator::Round>,

    /// The current round.
    pub(crate) round: operator::Round,
    /// The current phase.
    pub(crate) phase: Phase,
    /// Value this operator would propose, set at start.
    pub(crate) input_value: Option<Vec<u8>>,
    /// Value of the accepted proposal for the current round.
    pub(crate) proposed_value: Option<Vec<u8>>,
    /// Round at which this replica last reached a prepare quorum.
    pub(crate) prepared_round: Option<operator::Round>,
    /// Value this replica last prepared.
    pub(crate) prepared_value: Option<Vec<u8>>,
    /// The aggregated certificate, once a commit quorum was reached.
    pub(crate) decided: Option<operator::SignedMessage>,
    /// Round for which this operator already broadcast a proposal.
    pub(crate) proposal_broadcast: Option<operator::Round>,
    /// The decided certificate changed and must be persisted.
    pub(crate) needs_persist: bool,

    /// Received proposals.
    pub(crate) pre_prepare_messages: MsgContainer,
    /// Received prepare votes.
    pub(crate) prepare_messages: MsgContainer,
    /// Received commit votes.
    pub(crate) commit_messages: MsgContainer,
    /// Received round-change messages.
    pub(crate) round_change_messages: MsgContainer,

    pub(crate) pipelines: Pipelines,
}

impl Instance {
    /// Creates a new instance at round 1, waiting for a proposal.
    pub fn new(
        config: Arc<Config>,
        outbound: mpsc::UnboundedSender<operator::SignedMessage>,
        timer: Box<dyn RoundTimer>,
        timer_events: mpsc::UnboundedReceiver<operator::Round>,
    ) -> Self {
        let n = config.committee.len();
        let quorum = config.committee.quorum_threshold();
        Self {
            queue: Arc::new(MessageQueue::new(operator::Round::FIRST)),
            outbound,
            timer,
            timer_events,
            round: operator::Round::FIRST,
            phase: Phase::PrePrepare,
            input_value: None,
            proposed_value: None,
            prepared_round: None,
            prepared_value: None,
            decided: None,
            proposal_broadcast: None,
            needs_persist: false,
            pre_prepare_messages: MsgContainer::new(n, quorum),
            prepare_messages: MsgContainer::new(n, quorum),
            commit_messages: MsgContainer::new(n, quorum),
            round_change_messages: MsgContainer::new(n, quorum),
            pipelines: Pipelines::new(),
            config,
        }
    }

    /// Handle to the admission queue, for the transport to deliver into.
    pub fn queue(&self) -> Arc<MessageQueue> {
        self.queue.clone()
    }

    /// The current round.
    pub fn round(&self) -> operator::Round {
        self.round
    }

    /// The current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Pipeline processing PrePrepare messages.
    pub fn pre_prepare_pipeline(&self) -> &Pipeline {
        &self.pipelines.pre_prepare
    }

    /// Pipeline processing Prepare messages.
    pub fn prepare_pipeline(&self) -> &Pipeline {
        &self.pipelines.prepare
    }

    /// Pipeline processing Commit messages.
    pub fn commit_pipeline(&self) -> &Pipeline {
        &self.pipelines.commit
    }

    /// Pipeline processing RoundChange messages.
    pub fn round_change_pipeline(&self) -> &Pipeline {
        &self.pipelines.round_change
    }

    /// Kicks off the protocol: arms the round-1 timer and, if this operator
    /// is the round-1 proposer, broadcasts the proposal for `value`.
    pub fn start(&mut self, value: Vec<u8>) {
        tracing::info!(
            height = %self.config.height,
            operator = %self.config.operator_id,
            "starting consensus instance",
        );

        self.input_value = Some(value.clone());
        self.timer.schedule(self.round);

        if self
            .config
            .committee
            .proposer(self.config.height, self.round)
            == self.config.operator_id
        {
            self.proposal_broadcast = Some(self.round);
            self.broadcast(
                operator::MsgType::PrePrepare,
                self.round,
                operator::ProposalData { data: value }.encode(),
            );
        }
    }

    /// Runs the consumer loop: pops messages from the queue, runs each
    /// through its pipeline, and reacts to round-timer expiries. Pending
    /// round changes are honored between any two queued messages, so a
    /// backlog cannot starve them. Returns the decided certificate.
    pub async fn run(mut self) -> anyhow::Result<operator::SignedMessage> {
        loop {
            while let Ok(fired) = self.timer_events.try_recv() {
                self.on_round_timeout(fired);
            }

            if let Some(msg) = self.queue.pop_message() {
                if let Err(err) = self.process_message(&msg).await {
                    match err {
                        pipeline::Error::Store(err) => return Err(err),
                        err => tracing::warn!(
                            msg_type = msg.message.msg_type.label(),
                            "message rejected: {err:#}",
                        ),
                    }
                }
                if let Some(decided) = &self.decided {
                    return Ok(decided.clone());
                }
                continue;
            }

            tokio::select! {
                () = self.queue.notified() => {}
                fired = self.timer_events.recv() => {
                    if let Some(fired) = fired {
                        self.on_round_timeout(fired);
                    }
                }
            }
        }
    }

    /// Runs a single message through the pipeline for its type. An error
    /// aborts that message only; the instance stays usable.
    pub async fn process_message(
        &mut self,
        msg: &operator::SignedMessage,
    ) -> Result<(), pipeline::Error> {
        self.route(msg)?;

        if self.needs_persist {
            let decided = self
                .decided
                .clone()
                .expect("only a decided certificate is marked for persisting");
            self.config
                .decided_store
                .save_decided(&decided)
                .await
                .map_err(pipeline::Error::Store)?;
            self.needs_persist = false;
        }

        Ok(())
    }

    fn route(&mut self, msg: &operator::SignedMessage) -> Result<(), pipeline::Error> {
        if self.decided.is_some() {
            return match msg.message.msg_type {
                operator::MsgType::Commit => self.on_late_commit(msg),
                _ => Err(pipeline::Error::AlreadyDecided),
            };
        }

        let pipeline = self.pipelines.for_type(msg.message.msg_type).clone();
        pipeline.run(self, msg)
    }

    /// Signs and broadcasts a message of this instance's context.
    pub(crate) fn broadcast(
        &mut self,
        msg_type: operator::MsgType,
        round: operator::Round,
        data: Vec<u8>,
    ) {
        let message = operator::ConsensusMessage {
            msg_type,
            height: self.config.height,
            round,
            identifier: self.config.identifier.clone(),
            data,
        };
        let signed = self
            .config
            .secret_key
            .sign_msg(self.config.operator_id, message);
        self.send(signed);
    }

    /// Hands an already-signed message to the network collaborator.
    pub(crate) fn send(&mut self, msg: operator::SignedMessage) {
        if self.outbound.send(msg).is_err() {
            tracing::warn!("network channel closed, dropping outbound message");
        }
    }
}
