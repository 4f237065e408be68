//! Per-round container of signed messages, bucketed by payload hash.
use std::collections::{BTreeMap, BTreeSet, HashMap};

use dv_consensus_roles::operator;

/// Accumulates signed messages of one type and answers quorum queries.
/// Counting is by distinct signer: re-adding a message from a signer already
/// recorded for the same (round, payload) is a no-op.
#[derive(Debug)]
pub struct MsgContainer {
    committee_size: usize,
    quorum_threshold: usize,
    by_round: BTreeMap<operator::Round, RoundMsgs>,
}

#[derive(Debug, Default)]
struct RoundMsgs {
    by_payload: HashMap<operator::PayloadHash, PayloadVotes>,
    /// Messages for the round in insertion order, across payloads.
    messages: Vec<operator::SignedMessage>,
}

#[derive(Debug, Default)]
struct PayloadVotes {
    signers: BTreeSet<operator::OperatorId>,
}

impl MsgContainer {
    /// New container for a committee of `committee_size` operators with the
    /// given quorum threshold. Both are fixed at creation.
    pub fn new(committee_size: usize, quorum_threshold: usize) -> Self {
        Self {
            committee_size,
            quorum_threshold,
            by_round: BTreeMap::new(),
        }
    }

    /// Records the message's signers against (round, payload hash).
    /// Returns true if at least one new signer was recorded.
    pub fn add_message(
        &mut self,
        msg: &operator::SignedMessage,
        payload_hash: operator::PayloadHash,
    ) -> bool {
        let round = self.by_round.entry(msg.message.round).or_default();
        let votes = round.by_payload.entry(payload_hash).or_default();

        let mut added = false;
        for signer in &msg.signers {
            added |= votes.signers.insert(*signer);
        }
        debug_assert!(votes.signers.len() <= self.committee_size);

        if added {
            round.messages.push(msg.clone());
        }
        added
    }

    /// All distinct signed messages recorded for the round, in insertion
    /// order. The caller gets copies, never references into the container.
    pub fn read_only_messages_by_round(
        &self,
        round: operator::Round,
    ) -> Vec<operator::SignedMessage> {
        self.by_round
            .get(&round)
            .map(|r| r.messages.clone())
            .unwrap_or_default()
    }

    /// The recorded messages for (round, payload hash), in insertion order.
    pub fn messages_for(
        &self,
        round: operator::Round,
        payload_hash: operator::PayloadHash,
    ) -> Vec<operator::SignedMessage> {
        self.by_round
            .get(&round)
            .map(|r| {
                r.messages
                    .iter()
                    .filter(|msg| msg.message.payload_hash() == payload_hash)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns the signer set once the distinct-signer count for
    /// (round, payload hash) reaches the quorum threshold, `None` until then.
    pub fn quorum_for(
        &self,
        round: operator::Round,
        payload_hash: operator::PayloadHash,
    ) -> Option<Vec<operator::OperatorId>> {
        let signers = &self
            .by_round
            .get(&round)?
            .by_payload
            .get(&payload_hash)?
            .signers;
        (signers.len() >= self.quorum_threshold).then(|| signers.iter().copied().collect())
    }

    /// Returns the signer set once the distinct-signer count for the round,
    /// across payloads, reaches the quorum threshold. Round-change messages
    /// carry per-sender payloads, so their quorum is per round.
    pub fn quorum_for_round(&self, round: operator::Round) -> Option<Vec<operator::OperatorId>> {
        let round = self.by_round.get(&round)?;
        let signers: BTreeSet<_> = round
            .by_payload
            .values()
            .flat_map(|votes| votes.signers.iter().copied())
            .collect();
        (signers.len() >= self.quorum_threshold).then(|| signers.into_iter().collect())
    }
}
