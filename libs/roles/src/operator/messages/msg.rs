//! Signed messages and signer-set aggregation.
use std::fmt;

use dv_consensus_crypto::{keccak256::Keccak256, ByteFmt, Text, TextFmt};

use super::{Committee, ConsensusMessage, OperatorId};
use crate::operator::AggregateSignature;

/// Hash of a message, the root that signatures cover.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct MsgHash(pub(crate) Keccak256);

impl ByteFmt for MsgHash {
    fn decode(bytes: &[u8]) -> anyhow::Result<Self> {
        ByteFmt::decode(bytes).map(Self)
    }

    fn encode(&self) -> Vec<u8> {
        ByteFmt::encode(&self.0)
    }
}

impl TextFmt for MsgHash {
    fn decode(text: Text) -> anyhow::Result<Self> {
        text.strip("operator_msg:keccak256:")?.decode_hex().map(Self)
    }

    fn encode(&self) -> String {
        format!(
            "operator_msg:keccak256:{}",
            hex::encode(ByteFmt::encode(&self.0))
        )
    }
}

impl fmt::Debug for MsgHash {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.write_str(&TextFmt::encode(self))
    }
}

/// A consensus message together with the signature(s) covering its root.
/// An individual message carries exactly one signer; an aggregated (decided)
/// message carries the whole signer set of the quorum.
/// WARNING: the signature is not guaranteed to be valid until `verify` is
/// called.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedMessage {
    /// The message that was signed.
    pub message: ConsensusMessage,
    /// The operators that signed it, in the order their signatures were
    /// folded in.
    pub signers: Vec<OperatorId>,
    /// Signature over the message root. An aggregate of all `signers`.
    pub signature: AggregateSignature,
}

impl SignedMessage {
    /// Root of the carried message.
    pub fn msg_hash(&self) -> MsgHash {
        self.message.hash()
    }

    /// Verifies the signature against the signer set, resolving public keys
    /// through the committee.
    pub fn verify(&self, committee: &Committee) -> anyhow::Result<()> {
        anyhow::ensure!(!self.signers.is_empty(), "message without signers");
        let hash = self.msg_hash();
        let mut hashes_and_keys = Vec::with_capacity(self.signers.len());
        for id in &self.signers {
            let Some(key) = committee.get(id) else {
                anyhow::bail!("signer {id} not in committee");
            };
            hashes_and_keys.push((hash, key));
        }
        self.signature.verify_hash(hashes_and_keys.into_iter())
    }

    /// Folds another signed message into this one, merging the signer sets
    /// and combining the signatures. The carried messages must be identical
    /// and the signer sets disjoint.
    pub fn aggregate(&mut self, other: &SignedMessage) -> Result<(), AggregateError> {
        if self.message != other.message {
            return Err(AggregateError::Mismatch);
        }
        if let Some(id) = other.signers.iter().find(|id| self.signers.contains(id)) {
            return Err(AggregateError::DuplicateSigner(*id));
        }
        self.signers.extend_from_slice(&other.signers);
        self.signature.merge(&other.signature);
        Ok(())
    }
}

/// Error returned by [`SignedMessage::aggregate`].
#[derive(Debug, thiserror::Error)]
pub enum AggregateError {
    /// The messages being aggregated do not carry identical contents.
    #[error("can't aggregate messages with differing contents")]
    Mismatch,
    /// A signer is present on both sides of the aggregation.
    #[error("signer already signed: {0}")]
    DuplicateSigner(OperatorId),
}
