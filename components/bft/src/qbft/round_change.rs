//! Round-change handling: inbound round-change messages and round-timer
//! expiry.
use dv_consensus_roles::operator;

use super::{
    pipeline::{Error, Pipeline, Stage},
    round_timer::TimerState,
    Instance, Phase,
};

/// Pipeline for RoundChange messages.
pub(crate) fn pipeline() -> Pipeline {
    Pipeline::new(vec![
        Stage::BasicValidation,
        Stage::TypeCheck(operator::MsgType::RoundChange),
        Stage::IdentifierMatch,
        Stage::HeightMatch,
        Stage::AuthorizeSigner,
        Stage::VerifySignature,
        Stage::ValidateRoundChange,
        Stage::AddRoundChange,
        Stage::UponRoundChangeQuorum,
    ])
}

impl Instance {
    /// Checks that the round-change payload decodes and is internally
    /// consistent: a prepared round travels together with a prepared value.
    pub(crate) fn validate_round_change(
        &mut self,
        msg: &operator::SignedMessage,
    ) -> Result<(), Error> {
        let data = msg
            .message
            .round_change_data()
            .map_err(Error::MalformedPayload)?;
        if data.prepared_round.is_some() != data.prepared_value.is_some() {
            return Err(Error::MalformedPayload(anyhow::anyhow!(
                "prepared round and prepared value must be set together"
            )));
        }
        Ok(())
    }

    /// Records the round-change message. Idempotent per signer.
    pub(crate) fn add_round_change(&mut self, msg: &operator::SignedMessage) -> Result<(), Error> {
        self.round_change_messages
            .add_message(msg, msg.message.payload_hash());
        Ok(())
    }

    /// On a round-change quorum for the message's round, the round's
    /// designated proposer broadcasts a proposal carrying the highest
    /// prepared value reported by the quorum, or its own start value when
    /// nothing was prepared.
    pub(crate) fn upon_round_change_quorum(
        &mut self,
        msg: &operator::SignedMessage,
    ) -> Result<(), Error> {
        let round = msg.message.round;

        if self.proposal_broadcast == Some(round) {
            return Ok(());
        }
        if self
            .config
            .committee
            .proposer(self.config.height, round)
            != self.config.operator_id
        {
            return Ok(());
        }
        if self.round_change_messages.quorum_for_round(round).is_none() {
            return Ok(());
        }

        // Repropose the highest prepared value announced by the quorum.
        let mut highest: Option<(operator::Round, Vec<u8>)> = None;
        for recorded in self
            .round_change_messages
            .read_only_messages_by_round(round)
        {
            let data = recorded
                .message
                .round_change_data()
                .map_err(Error::MalformedPayload)?;
            if let (Some(prepared_round), Some(prepared_value)) =
                (data.prepared_round, data.prepared_value)
            {
                if highest.as_ref().map_or(true, |(r, _)| *r < prepared_round) {
                    highest = Some((prepared_round, prepared_value));
                }
            }
        }

        let value = match highest {
            Some((_, value)) => value,
            None => match &self.input_value {
                Some(value) => value.clone(),
                // Nothing prepared and nothing to propose ourselves.
                None => return Ok(()),
            },
        };

        tracing::info!(
            round = %round,
            "round-change quorum reached, broadcasting proposal as the new proposer",
        );
        self.proposal_broadcast = Some(round);
        self.broadcast(
            operator::MsgType::PrePrepare,
            round,
            operator::ProposalData { data: value }.encode(),
        );

        Ok(())
    }

    /// Reacts to a round-timer expiry: moves to the next round, re-arms the
    /// timer and announces the change, carrying the highest prepared state.
    /// Expiry events for rounds the instance has already left are ignored.
    pub fn on_round_timeout(&mut self, fired_round: operator::Round) {
        if self.decided.is_some() {
            tracing::debug!(%fired_round, "ignoring round timeout, instance already decided");
            return;
        }
        if fired_round != self.round {
            tracing::debug!(
                %fired_round,
                current_round = %self.round,
                "ignoring stale round timeout",
            );
            return;
        }

        let new_round = self.round.next();
        tracing::info!(
            old_round = %self.round,
            %new_round,
            "round timed out, moving to the next round",
        );

        self.round = new_round;
        self.phase = Phase::PrePrepare;
        self.proposed_value = None;
        self.timer.schedule(new_round);
        debug_assert_eq!(self.timer.state(), TimerState::Scheduled);

        self.broadcast(
            operator::MsgType::RoundChange,
            new_round,
            operator::RoundChangeData {
                prepared_round: self.prepared_round,
                prepared_value: self.prepared_value.clone(),
            }
            .encode(),
        );

        self.queue.set_round(new_round);
    }
}
