//! Types of the consensus protocol messages.
use std::fmt;

use dv_consensus_crypto::keccak256::Keccak256;

use super::encode;

/// Number of a consensus round. Rounds start at 1 and only ever increase
/// within an instance.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    bincode::Encode,
    bincode::Decode,
)]
pub struct Round(pub u64);

impl Round {
    /// First round of every instance.
    pub const FIRST: Self = Self(1);

    /// The round after this one.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Round {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(fmt)
    }
}

/// Height (sequence number) of the duty an instance decides.
/// Orthogonal to [`Round`].
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    bincode::Encode,
    bincode::Decode,
)]
pub struct Height(pub u64);

impl Height {
    /// The next height.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Height {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(fmt)
    }
}

/// Opaque byte key scoping messages to one logical decision context
/// (committee + duty).
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, bincode::Encode, bincode::Decode)]
pub struct Identifier(pub Vec<u8>);

impl fmt::Debug for Identifier {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "identifier:0x{}", hex::encode(&self.0))
    }
}

impl From<&[u8]> for Identifier {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

/// Type of a consensus message.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, bincode::Encode, bincode::Decode,
)]
pub enum MsgType {
    /// Round proposal from the round's designated proposer.
    PrePrepare,
    /// Vote that the proposal for the round is acceptable.
    Prepare,
    /// Vote to finalize the prepared value.
    Commit,
    /// Request to move to a higher round.
    RoundChange,
}

impl MsgType {
    /// Returns a label suitable for logging and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::PrePrepare => "pre_prepare",
            Self::Prepare => "prepare",
            Self::Commit => "commit",
            Self::RoundChange => "round_change",
        }
    }
}

/// Hash of the value payload carried by a message.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PayloadHash(pub Keccak256);

impl fmt::Debug for PayloadHash {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "payload:{}", hex::encode(self.0.as_bytes()))
    }
}

/// A single protocol message, before signing.
/// Immutable once constructed.
/// WARNING: any change to this struct invalidates preexisting signatures.
#[derive(Clone, Debug, PartialEq, Eq, Hash, bincode::Encode, bincode::Decode)]
pub struct ConsensusMessage {
    /// Type of the message.
    pub msg_type: MsgType,
    /// Height this instance is deciding.
    pub height: Height,
    /// Round the message belongs to.
    pub round: Round,
    /// Decision context this message is scoped to.
    pub identifier: Identifier,
    /// Payload, specific to `msg_type`.
    pub data: Vec<u8>,
}

impl ConsensusMessage {
    /// Root of the message, the bytes that get signed.
    pub fn hash(&self) -> super::MsgHash {
        super::MsgHash(Keccak256::new(&encode::canonical(self)))
    }

    /// Hash of the payload, used to bucket votes for the same value.
    pub fn payload_hash(&self) -> PayloadHash {
        PayloadHash(Keccak256::new(&self.data))
    }

    /// Decodes the payload of a Commit message.
    pub fn commit_data(&self) -> anyhow::Result<CommitData> {
        CommitData::decode(&self.data)
    }

    /// Decodes the payload of a RoundChange message.
    pub fn round_change_data(&self) -> anyhow::Result<RoundChangeData> {
        RoundChangeData::decode(&self.data)
    }
}

/// Value payload of a PrePrepare message.
#[derive(Clone, Debug, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct ProposalData {
    /// The proposed value.
    pub data: Vec<u8>,
}

/// Value payload of a Prepare message.
#[derive(Clone, Debug, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct PrepareData {
    /// The value being prepared.
    pub data: Vec<u8>,
}

/// Value payload of a Commit message.
#[derive(Clone, Debug, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct CommitData {
    /// The value being committed.
    pub data: Vec<u8>,
}

/// Payload of a RoundChange message: the sender's highest prepared state,
/// if any.
#[derive(Clone, Debug, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct RoundChangeData {
    /// Round at which the sender last reached a prepare quorum.
    pub prepared_round: Option<Round>,
    /// Value the sender last prepared.
    pub prepared_value: Option<Vec<u8>>,
}

macro_rules! impl_payload_codec {
    ($($t:ty),*) => {$(
        impl $t {
            /// Encodes the payload with the canonical configuration.
            pub fn encode(&self) -> Vec<u8> {
                encode::canonical(self)
            }

            /// Decodes the payload, rejecting trailing garbage.
            pub fn decode(bytes: &[u8]) -> anyhow::Result<Self> {
                encode::decode_whole(bytes)
            }
        }
    )*};
}

impl_payload_codec!(ProposalData, PrepareData, CommitData, RoundChangeData);
