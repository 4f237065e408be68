//! Test-only utilities.
use rand::{
    distributions::{Distribution, Standard},
    Rng,
};

use crate::operator::{
    CommitData, Committee, ConsensusMessage, Height, Identifier, MsgType, OperatorId, PrepareData,
    ProposalData, Round, RoundChangeData, SecretKey, SignedMessage,
};

/// Test setup: a committee, its secret keys and a decision context.
/// Operator ids are assigned 1..=n in key order.
#[derive(Debug, Clone)]
pub struct Setup {
    /// Operators' secret keys. Key at index `i` belongs to operator `i + 1`.
    pub keys: Vec<SecretKey>,
    /// The committee holding the corresponding public keys.
    pub committee: Committee,
    /// Decision context the instance is scoped to.
    pub identifier: Identifier,
    /// Height the instance is deciding.
    pub height: Height,
}

impl Setup {
    /// New `Setup` with the given committee size.
    pub fn new(rng: &mut impl Rng, operators: usize) -> Self {
        let keys: Vec<SecretKey> = (0..operators).map(|_| rng.gen()).collect();
        let committee = Committee::new(
            keys.iter()
                .enumerate()
                .map(|(i, key)| (OperatorId(i as u64 + 1), key.public())),
        )
        .unwrap();
        Self {
            keys,
            committee,
            identifier: Identifier(rng.gen::<[u8; 32]>().to_vec()),
            height: Height(rng.gen_range(0..100)),
        }
    }

    /// Operator id of the key at the given index.
    pub fn operator_id(&self, index: usize) -> OperatorId {
        OperatorId(index as u64 + 1)
    }

    /// Secret key of the given operator.
    pub fn secret(&self, id: OperatorId) -> &SecretKey {
        &self.keys[id.0 as usize - 1]
    }

    /// Signs a message on behalf of the given operator.
    pub fn sign(&self, id: OperatorId, message: ConsensusMessage) -> SignedMessage {
        self.secret(id).sign_msg(id, message)
    }

    /// A PrePrepare message proposing `value` for the given round.
    pub fn proposal_message(&self, round: Round, value: &[u8]) -> ConsensusMessage {
        ConsensusMessage {
            msg_type: MsgType::PrePrepare,
            height: self.height,
            round,
            identifier: self.identifier.clone(),
            data: ProposalData {
                data: value.to_vec(),
            }
            .encode(),
        }
    }

    /// A Prepare vote for `value` at the given round.
    pub fn prepare_message(&self, round: Round, value: &[u8]) -> ConsensusMessage {
        ConsensusMessage {
            msg_type: MsgType::Prepare,
            height: self.height,
            round,
            identifier: self.identifier.clone(),
            data: PrepareData {
                data: value.to_vec(),
            }
            .encode(),
        }
    }

    /// A Commit vote for `value` at the given round.
    pub fn commit_message(&self, round: Round, value: &[u8]) -> ConsensusMessage {
        ConsensusMessage {
            msg_type: MsgType::Commit,
            height: self.height,
            round,
            identifier: self.identifier.clone(),
            data: CommitData {
                data: value.to_vec(),
            }
            .encode(),
        }
    }

    /// A RoundChange message for the given round, carrying the sender's
    /// prepared state.
    pub fn round_change_message(
        &self,
        round: Round,
        prepared: Option<(Round, &[u8])>,
    ) -> ConsensusMessage {
        ConsensusMessage {
            msg_type: MsgType::RoundChange,
            height: self.height,
            round,
            identifier: self.identifier.clone(),
            data: RoundChangeData {
                prepared_round: prepared.map(|(round, _)| round),
                prepared_value: prepared.map(|(_, value)| value.to_vec()),
            }
            .encode(),
        }
    }
}

impl Distribution<OperatorId> for Standard {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> OperatorId {
        OperatorId(rng.gen())
    }
}

impl Distribution<Round> for Standard {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Round {
        Round(rng.gen())
    }
}

impl Distribution<Height> for Standard {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Height {
        Height(rng.gen())
    }
}

impl Distribution<Identifier> for Standard {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Identifier {
        Identifier(rng.gen::<[u8; 32]>().to_vec())
    }
}

impl Distribution<MsgType> for Standard {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> MsgType {
        match rng.gen_range(0..4) {
            0 => MsgType::PrePrepare,
            1 => MsgType::Prepare,
            2 => MsgType::Commit,
            _ => MsgType::RoundChange,
        }
    }
}

impl Distribution<ConsensusMessage> for Standard {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> ConsensusMessage {
        ConsensusMessage {
            msg_type: rng.gen(),
            height: rng.gen(),
            round: rng.gen(),
            identifier: rng.gen(),
            data: rng.gen::<[u8; 16]>().to_vec(),
        }
    }
}
