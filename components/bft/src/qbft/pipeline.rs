//! Ordered validation/processing pipelines.
//!
//! Every inbound message runs through the pipeline for its type: an ordered
//! list of named stages, composed once at instance construction. A stage
//! either passes or fails with a specific error that aborts processing of
//! that message only; the stage ordering is part of the contract and is
//! asserted on by tests through [`Pipeline::name`].
use dv_consensus_roles::operator;

use super::{decided::AggregateMessagesError, Instance};

/// A single pipeline stage. Stages are data, not closures, so that a
/// composed pipeline can be inspected and its ordering tested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stage {
    /// Structural sanity of the signed message.
    BasicValidation,
    /// The message type matches the pipeline's type.
    TypeCheck(operator::MsgType),
    /// The message is scoped to this instance's identifier.
    IdentifierMatch,
    /// The message is for this instance's height.
    HeightMatch,
    /// The signer is a committee member.
    AuthorizeSigner,
    /// The signature verifies against the signer's public key.
    VerifySignature,
    /// The message comes from the round's designated proposer.
    ValidateProposer,
    /// Accept the proposal and vote to prepare it.
    UponPrePrepare,
    /// Record the prepare vote.
    AddPrepare,
    /// React to a prepare quorum.
    UponPrepareQuorum,
    /// Record the commit vote.
    AddCommit,
    /// React to a commit quorum.
    UponCommitQuorum,
    /// The round-change payload decodes and is internally consistent.
    ValidateRoundChange,
    /// Record the round-change message.
    AddRoundChange,
    /// React to a round-change quorum.
    UponRoundChangeQuorum,
}

impl Stage {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::BasicValidation => "basic msg validation",
            Self::TypeCheck(_) => "type check",
            Self::IdentifierMatch => "identifier match",
            Self::HeightMatch => "height match",
            Self::AuthorizeSigner => "authorize signer",
            Self::VerifySignature => "verify signature",
            Self::ValidateProposer => "validate proposer",
            Self::UponPrePrepare => "upon pre-prepare msg",
            Self::AddPrepare => "add prepare msg",
            Self::UponPrepareQuorum => "upon prepare quorum",
            Self::AddCommit => "add commit msg",
            Self::UponCommitQuorum => "upon commit quorum",
            Self::ValidateRoundChange => "validate round change data",
            Self::AddRoundChange => "add round change msg",
            Self::UponRoundChangeQuorum => "upon round change quorum",
        }
    }

    fn run(&self, instance: &mut Instance, msg: &operator::SignedMessage) -> Result<(), Error> {
        match self {
            Self::BasicValidation => instance.validate_basic(msg),
            Self::TypeCheck(expected) => instance.check_type(msg, *expected),
            Self::IdentifierMatch => instance.check_identifier(msg),
            Self::HeightMatch => instance.check_height(msg),
            Self::AuthorizeSigner => instance.authorize_signer(msg),
            Self::VerifySignature => instance.verify_signature(msg),
            Self::ValidateProposer => instance.validate_proposer(msg),
            Self::UponPrePrepare => instance.upon_pre_prepare(msg),
            Self::AddPrepare => instance.add_prepare(msg),
            Self::UponPrepareQuorum => instance.upon_prepare_quorum(msg),
            Self::AddCommit => instance.add_commit(msg),
            Self::UponCommitQuorum => instance.upon_commit_quorum(msg),
            Self::ValidateRoundChange => instance.validate_round_change(msg),
            Self::AddRoundChange => instance.add_round_change(msg),
            Self::UponRoundChangeQuorum => instance.upon_round_change_quorum(msg),
        }
    }
}

/// An ordered composition of stages, built once at construction time.
#[derive(Debug, Clone)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub(crate) fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    /// The composed name of the pipeline: the names of its stages in order.
    pub fn name(&self) -> String {
        self.stages
            .iter()
            .map(Stage::name)
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub(crate) fn run(
        &self,
        instance: &mut Instance,
        msg: &operator::SignedMessage,
    ) -> Result<(), Error> {
        for stage in &self.stages {
            stage.run(instance, msg)?;
        }
        Ok(())
    }
}

/// Errors that can occur while running a message through a pipeline.
/// Each one aborts the offending message and leaves instance state intact.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An individual message must carry exactly one signer.
    #[error("individual message must carry exactly one signer (got: {got})")]
    InvalidSignersLen {
        /// Number of signers on the message.
        got: usize,
    },
    /// Message of a type this pipeline doesn't process.
    #[error("wrong message type (expected: {expected:?}, got: {got:?})")]
    WrongMsgType {
        /// Type the pipeline processes.
        expected: operator::MsgType,
        /// Type carried by the message.
        got: operator::MsgType,
    },
    /// Message scoped to a different decision context.
    #[error("message identifier doesn't match the instance (got: {got:?})")]
    WrongIdentifier {
        /// Identifier carried by the message.
        got: operator::Identifier,
    },
    /// Message for a different height.
    #[error("message height doesn't match the instance (got: {got}, want: {want})")]
    WrongHeight {
        /// Height carried by the message.
        got: operator::Height,
        /// Height of this instance.
        want: operator::Height,
    },
    /// Message signer isn't part of the committee.
    #[error("message signer isn't part of the committee (signer: {signer})")]
    UnauthorizedSigner {
        /// Signer of the message.
        signer: operator::OperatorId,
    },
    /// Invalid message signature.
    #[error("invalid signature: {0:#}")]
    InvalidSignature(#[source] anyhow::Error),
    /// Proposal from an operator that isn't the round's proposer.
    #[error("message from the wrong proposer (got: {got}, want: {want})")]
    WrongProposer {
        /// Signer of the proposal.
        got: operator::OperatorId,
        /// Designated proposer for the round.
        want: operator::OperatorId,
    },
    /// Proposal that doesn't carry the value this instance prepared.
    #[error("proposal doesn't repropose the prepared value")]
    UnjustifiedProposal,
    /// A proposal for this round was already accepted.
    #[error("proposal for this round was already accepted")]
    DuplicateProposal,
    /// Payload that doesn't decode for the message's type.
    #[error("malformed payload: {0:#}")]
    MalformedPayload(#[source] anyhow::Error),
    /// Message (other than a late commit) for an already decided instance.
    #[error("instance already decided")]
    AlreadyDecided,
    /// Failure while aggregating a commit quorum into a certificate.
    #[error(transparent)]
    Aggregate(#[from] AggregateMessagesError),
    /// A late commit that can't be folded into the decided certificate.
    #[error("could not aggregate commit message: {0:#}")]
    CouldNotAggregateCommit(#[source] anyhow::Error),
    /// Failure of the storage collaborator. The instance performs no retry.
    #[error("persisting decided certificate: {0:#}")]
    Store(#[source] anyhow::Error),
}

impl Instance {
    /// Structural sanity of an inbound individual message.
    pub(crate) fn validate_basic(&mut self, msg: &operator::SignedMessage) -> Result<(), Error> {
        if msg.signers.len() != 1 {
            return Err(Error::InvalidSignersLen {
                got: msg.signers.len(),
            });
        }
        Ok(())
    }

    pub(crate) fn check_type(
        &mut self,
        msg: &operator::SignedMessage,
        expected: operator::MsgType,
    ) -> Result<(), Error> {
        if msg.message.msg_type != expected {
            return Err(Error::WrongMsgType {
                expected,
                got: msg.message.msg_type,
            });
        }
        Ok(())
    }

    pub(crate) fn check_identifier(&mut self, msg: &operator::SignedMessage) -> Result<(), Error> {
        if msg.message.identifier != self.config.identifier {
            return Err(Error::WrongIdentifier {
                got: msg.message.identifier.clone(),
            });
        }
        Ok(())
    }

    pub(crate) fn check_height(&mut self, msg: &operator::SignedMessage) -> Result<(), Error> {
        if msg.message.height != self.config.height {
            return Err(Error::WrongHeight {
                got: msg.message.height,
                want: self.config.height,
            });
        }
        Ok(())
    }

    pub(crate) fn authorize_signer(&mut self, msg: &operator::SignedMessage) -> Result<(), Error> {
        for signer in &msg.signers {
            if !self.config.committee.contains(signer) {
                return Err(Error::UnauthorizedSigner { signer: *signer });
            }
        }
        Ok(())
    }

    pub(crate) fn verify_signature(&mut self, msg: &operator::SignedMessage) -> Result<(), Error> {
        msg.verify(&self.config.committee)
            .map_err(Error::InvalidSignature)
    }
}
