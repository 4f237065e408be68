//! Committee of operators running a consensus instance.
use std::{collections::BTreeMap, fmt};

use super::{Height, Round};
use crate::operator::PublicKey;

/// Unique integer identifying a committee member.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, bincode::Encode, bincode::Decode,
)]
pub struct OperatorId(pub u64);

impl fmt::Display for OperatorId {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(fmt)
    }
}

/// A fixed set of operators, keyed by operator id. The committee is immutable
/// for the lifetime of an instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Committee {
    members: BTreeMap<OperatorId, PublicKey>,
}

impl Committee {
    /// Creates a new Committee from a list of operator ids and public keys.
    pub fn new(operators: impl IntoIterator<Item = (OperatorId, PublicKey)>) -> anyhow::Result<Self> {
        let mut members = BTreeMap::new();
        for (id, key) in operators {
            anyhow::ensure!(
                members.insert(id, key).is_none(),
                "duplicate operator {id} in committee"
            );
        }
        anyhow::ensure!(
            !members.is_empty(),
            "committee must contain at least one operator"
        );
        Ok(Self { members })
    }

    /// Number of operators in the committee.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Returns true if the given operator is a committee member.
    pub fn contains(&self, id: &OperatorId) -> bool {
        self.members.contains_key(id)
    }

    /// Public key of a committee member.
    pub fn get(&self, id: &OperatorId) -> Option<&PublicKey> {
        self.members.get(id)
    }

    /// Iterates over the committee members in ascending operator-id order.
    pub fn iter(&self) -> impl Iterator<Item = (&OperatorId, &PublicKey)> {
        self.members.iter()
    }

    /// Iterates over the operator ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = &OperatorId> {
        self.members.keys()
    }

    /// Maximal number of faulty operators the committee tolerates.
    pub fn max_faulty(&self) -> usize {
        // n = 3*f + 1, so f = floor((n - 1) / 3).
        (self.len() - 1) / 3
    }

    /// Number of distinct signers required for a decision.
    pub fn quorum_threshold(&self) -> usize {
        self.len() - self.max_faulty()
    }

    /// Number of distinct signers that is guaranteed to include at least one
    /// honest operator. Used for round-change catch-up.
    pub fn partial_quorum_threshold(&self) -> usize {
        self.max_faulty() + 1
    }

    /// The designated proposer for a round, selected round-robin over the
    /// committee in ascending operator-id order.
    pub fn proposer(&self, height: Height, round: Round) -> OperatorId {
        // Round numbering starts at 1, so round 1 of height 0 maps to the
        // first operator.
        let index = (height.0.wrapping_add(round.0).saturating_sub(1)) % self.len() as u64;
        *self
            .ids()
            .nth(index as usize)
            .expect("index is reduced modulo the committee size")
    }
}
