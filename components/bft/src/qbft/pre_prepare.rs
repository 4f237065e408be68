//! PrePrepare (proposal) handling.
use dv_consensus_roles::operator;

use super::{
    pipeline::{Error, Pipeline, Stage},
    Instance, Phase,
};

/// Pipeline for PrePrepare messages.
pub(crate) fn pipeline() -> Pipeline {
    Pipeline::new(vec![
        Stage::BasicValidation,
        Stage::TypeCheck(operator::MsgType::PrePrepare),
        Stage::IdentifierMatch,
        Stage::HeightMatch,
        Stage::AuthorizeSigner,
        Stage::VerifySignature,
        Stage::ValidateProposer,
        Stage::UponPrePrepare,
    ])
}

impl Instance {
    /// Checks that the proposal comes from the round's designated proposer,
    /// selected round-robin by round number.
    pub(crate) fn validate_proposer(&mut self, msg: &operator::SignedMessage) -> Result<(), Error> {
        let want = self
            .config
            .committee
            .proposer(self.config.height, msg.message.round);
        let got = msg.signers[0];
        if got != want {
            return Err(Error::WrongProposer { got, want });
        }
        Ok(())
    }

    /// Accepts the proposal: records the proposed value and votes to
    /// prepare it.
    pub(crate) fn upon_pre_prepare(&mut self, msg: &operator::SignedMessage) -> Result<(), Error> {
        if self.proposed_value.is_some() {
            return Err(Error::DuplicateProposal);
        }

        let proposal = operator::ProposalData::decode(&msg.message.data)
            .map_err(Error::MalformedPayload)?;

        // A proposer must repropose the value this replica already prepared;
        // accepting anything else would let a decision conflict with an
        // earlier prepare quorum.
        if let Some(prepared) = &self.prepared_value {
            if *prepared != proposal.data {
                return Err(Error::UnjustifiedProposal);
            }
        }

        self.pre_prepare_messages
            .add_message(msg, msg.message.payload_hash());
        self.proposed_value = Some(proposal.data.clone());
        self.phase = Phase::Prepare;

        tracing::debug!(
            round = %msg.message.round,
            proposer = %msg.signers[0],
            "accepted proposal, broadcasting prepare vote",
        );
        self.broadcast(
            operator::MsgType::Prepare,
            msg.message.round,
            operator::PrepareData {
                data: proposal.data,
            }
            .encode(),
        );

        Ok(())
    }
}
