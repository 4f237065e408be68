//! Decided certificates: aggregation of commit quorums and late-commit
//! reprocessing.
use dv_consensus_engine::DecidedStore;
use dv_consensus_roles::operator;

use super::Instance;

/// Error returned by [`aggregate_messages`].
#[derive(Debug, thiserror::Error)]
pub enum AggregateMessagesError {
    /// Nothing to aggregate.
    #[error("could not aggregate decided messages, no msgs")]
    NoMessages,
    /// The messages disagree on contents or share a signer.
    #[error("could not aggregate message: {0}")]
    Aggregate(#[from] operator::AggregateError),
}

/// Aggregates the given signed messages into a single certificate whose
/// signer set is the union of the inputs. The first message is copied as the
/// accumulator; the inputs are never mutated.
pub fn aggregate_messages(
    messages: &[operator::SignedMessage],
) -> Result<operator::SignedMessage, AggregateMessagesError> {
    let (first, rest) = messages
        .split_first()
        .ok_or(AggregateMessagesError::NoMessages)?;

    let mut decided = first.clone();
    for msg in rest {
        decided.aggregate(msg)?;
    }
    Ok(decided)
}

/// Error returned by [`Instance::committed_aggregated_msg`] before a commit
/// quorum exists.
#[derive(Debug, thiserror::Error)]
#[error("missing decided message")]
pub struct MissingDecidedMessage;

/// Error returned by [`process_late_commit`].
#[derive(Debug, thiserror::Error)]
pub enum LateCommitError {
    /// The commit disagrees with the decided value or fails verification.
    #[error("could not aggregate commit message: {0:#}")]
    CouldNotAggregate(#[source] anyhow::Error),
    /// Failure of the storage collaborator.
    #[error(transparent)]
    Store(anyhow::Error),
}

impl Instance {
    /// The aggregated certificate this instance decided on.
    /// Fails until a commit quorum has been aggregated.
    pub fn committed_aggregated_msg(
        &self,
    ) -> Result<operator::SignedMessage, MissingDecidedMessage> {
        self.decided.clone().ok_or(MissingDecidedMessage)
    }
}

/// Serves a commit that arrived after the deciding instance is gone, folding
/// it into the certificate persisted for (identifier, height).
///
/// Returns the extended certificate, or `None` when nothing was decided for
/// the commit's identifier and height (a benign no-op). A commit for a
/// different value or with a bad signature leaves the stored state untouched.
pub async fn process_late_commit(
    msg: &operator::SignedMessage,
    store: &dyn DecidedStore,
    committee: &operator::Committee,
) -> Result<Option<operator::SignedMessage>, LateCommitError> {
    let Some(mut decided) = store
        .get_decided(&msg.message.identifier, msg.message.height)
        .await
        .map_err(LateCommitError::Store)?
    else {
        return Ok(None);
    };

    msg.verify(committee)
        .map_err(LateCommitError::CouldNotAggregate)?;
    decided
        .aggregate(msg)
        .map_err(|err| LateCommitError::CouldNotAggregate(err.into()))?;

    store
        .save_decided(&decided)
        .await
        .map_err(LateCommitError::Store)?;

    tracing::debug!(
        height = %decided.message.height,
        signers = ?decided.signers,
        "late commit folded into the stored decided certificate",
    );

    Ok(Some(decided))
}
