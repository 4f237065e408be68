//! Prepare vote handling.
use dv_consensus_roles::operator;

use super::{
    pipeline::{Error, Pipeline, Stage},
    Instance, Phase,
};

/// Pipeline for Prepare messages.
pub(crate) fn pipeline() -> Pipeline {
    Pipeline::new(vec![
        Stage::BasicValidation,
        Stage::TypeCheck(operator::MsgType::Prepare),
        Stage::IdentifierMatch,
        Stage::HeightMatch,
        Stage::AuthorizeSigner,
        Stage::VerifySignature,
        Stage::AddPrepare,
        Stage::UponPrepareQuorum,
    ])
}

impl Instance {
    /// Records the prepare vote. Idempotent per signer.
    pub(crate) fn add_prepare(&mut self, msg: &operator::SignedMessage) -> Result<(), Error> {
        self.prepare_messages
            .add_message(msg, msg.message.payload_hash());
        Ok(())
    }

    /// On a prepare quorum for (round, value), marks the value prepared and
    /// votes to commit it.
    pub(crate) fn upon_prepare_quorum(
        &mut self,
        msg: &operator::SignedMessage,
    ) -> Result<(), Error> {
        let round = msg.message.round;

        // Already prepared at this round, the quorum was acted on.
        if self.prepared_round == Some(round) {
            return Ok(());
        }

        let Some(signers) = self
            .prepare_messages
            .quorum_for(round, msg.message.payload_hash())
        else {
            return Ok(());
        };

        let prepare =
            operator::PrepareData::decode(&msg.message.data).map_err(Error::MalformedPayload)?;

        tracing::info!(
            round = %round,
            signers = ?signers,
            "prepare quorum reached, broadcasting commit vote",
        );

        self.prepared_round = Some(round);
        self.prepared_value = Some(prepare.data.clone());
        self.phase = Phase::Commit;

        self.broadcast(
            operator::MsgType::Commit,
            round,
            operator::CommitData { data: prepare.data }.encode(),
        );

        Ok(())
    }
}
