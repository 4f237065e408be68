//! Commit vote handling.
use dv_consensus_roles::operator;

use super::{
    decided::aggregate_messages,
    pipeline::{Error, Pipeline, Stage},
    Instance, Phase,
};

/// Pipeline for Commit messages.
pub(crate) fn pipeline() -> Pipeline {
    Pipeline::new(vec![
        Stage::BasicValidation,
        Stage::TypeCheck(operator::MsgType::Commit),
        Stage::IdentifierMatch,
        Stage::HeightMatch,
        Stage::AuthorizeSigner,
        Stage::VerifySignature,
        Stage::AddCommit,
        Stage::UponCommitQuorum,
    ])
}

impl Instance {
    /// Records the commit vote. Idempotent per signer.
    pub(crate) fn add_commit(&mut self, msg: &operator::SignedMessage) -> Result<(), Error> {
        self.commit_messages
            .add_message(msg, msg.message.payload_hash());
        Ok(())
    }

    /// On a commit quorum for (round, value), aggregates the quorum's
    /// commit messages into the decided certificate. Independent of the
    /// prepare-quorum bookkeeping.
    pub(crate) fn upon_commit_quorum(
        &mut self,
        msg: &operator::SignedMessage,
    ) -> Result<(), Error> {
        let round = msg.message.round;
        let payload_hash = msg.message.payload_hash();

        let Some(signers) = self.commit_messages.quorum_for(round, payload_hash) else {
            return Ok(());
        };

        let decided = aggregate_messages(&self.commit_messages.messages_for(round, payload_hash))?;

        tracing::info!(
            round = %round,
            signers = ?signers,
            "commit quorum reached, instance decided",
        );

        self.phase = Phase::Decided;
        self.timer.cancel();
        // Lagging operators converge on the aggregated certificate.
        self.send(decided.clone());
        self.decided = Some(decided);
        self.needs_persist = true;

        Ok(())
    }

    /// Folds a commit that arrived after the decision into the decided
    /// certificate, extending its signer set. A commit for a different value
    /// or with a bad signature leaves the certificate untouched.
    pub(crate) fn on_late_commit(&mut self, msg: &operator::SignedMessage) -> Result<(), Error> {
        self.validate_basic(msg)?;
        self.check_type(msg, operator::MsgType::Commit)?;
        self.check_identifier(msg)?;
        self.check_height(msg)?;
        self.authorize_signer(msg)?;

        if let Err(err) = msg.verify(&self.config.committee) {
            return Err(Error::CouldNotAggregateCommit(err));
        }

        let decided = self
            .decided
            .as_mut()
            .expect("late commits are only routed to decided instances");
        decided
            .aggregate(msg)
            .map_err(|err| Error::CouldNotAggregateCommit(err.into()))?;

        tracing::debug!(
            signer = %msg.signers[0],
            signers = ?decided.signers,
            "late commit folded into the decided certificate",
        );
        self.needs_persist = true;

        Ok(())
    }
}
