use std::time::Duration;

use assert_matches::assert_matches;
use dv_consensus_engine::{testonly::in_memory, DecidedStore as _};
use dv_consensus_roles::operator::{
    testonly::Setup, MsgType, OperatorId, PrepareData, Round,
};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    qbft::{pipeline, round_timer::TimerState, testonly::UnitTestHarness, Phase, RoundTimer as _},
    Config,
};

#[tokio::test]
async fn committed_aggregated_msg_requires_decision() {
    let mut rng = StdRng::seed_from_u64(310);
    let mut util = UnitTestHarness::new(&mut rng, 4);

    // No decided message.
    let err = util.instance.committed_aggregated_msg().unwrap_err();
    assert_eq!(err.to_string(), "missing decided message");

    // Prepared state alone is not a decision.
    util.instance.prepared_round = Some(Round(1));
    util.instance.prepared_value = Some(b"value".to_vec());
    let err = util.instance.committed_aggregated_msg().unwrap_err();
    assert_eq!(err.to_string(), "missing decided message");

    // A commit quorum is.
    util.process_commits(Round(3), b"value", 3).await.unwrap();
    let msg = util.instance.committed_aggregated_msg().unwrap();
    let mut signers = msg.signers.clone();
    signers.sort_unstable_by_key(|id| id.0);
    assert_eq!(signers, vec![OperatorId(1), OperatorId(2), OperatorId(3)]);
    msg.verify(&util.setup.committee).unwrap();
}

#[tokio::test]
async fn proposal_yields_prepare_vote() {
    let mut rng = StdRng::seed_from_u64(311);
    let mut util = UnitTestHarness::new(&mut rng, 4);

    util.process_proposal(Round::FIRST, b"value").await.unwrap();

    assert_eq!(util.instance.phase(), Phase::Prepare);
    assert_eq!(util.instance.proposed_value, Some(b"value".to_vec()));
    assert_eq!(
        util.instance
            .pre_prepare_messages
            .read_only_messages_by_round(Round::FIRST)
            .len(),
        1
    );

    let vote = util.try_recv().unwrap();
    assert_eq!(vote.message.msg_type, MsgType::Prepare);
    assert_eq!(vote.signers, vec![util.setup.operator_id(0)]);
    assert_eq!(
        PrepareData::decode(&vote.message.data).unwrap().data,
        b"value".to_vec()
    );
}

#[tokio::test]
async fn proposal_from_wrong_proposer_rejected() {
    let mut rng = StdRng::seed_from_u64(312);
    let mut util = UnitTestHarness::new(&mut rng, 4);

    let proposer = util.proposer(Round::FIRST);
    let impostor = *util
        .setup
        .committee
        .ids()
        .find(|id| **id != proposer)
        .unwrap();
    let msg = util.setup.sign(
        impostor,
        util.setup.proposal_message(Round::FIRST, b"value"),
    );

    let res = util.process(msg).await;
    assert_matches!(res, Err(pipeline::Error::WrongProposer { got, want }) => {
        assert_eq!(got, impostor);
        assert_eq!(want, proposer);
    });
    assert_eq!(util.instance.phase(), Phase::PrePrepare);
    assert!(util.try_recv().is_none());
}

#[tokio::test]
async fn duplicate_proposal_rejected() {
    let mut rng = StdRng::seed_from_u64(313);
    let mut util = UnitTestHarness::new(&mut rng, 4);

    util.process_proposal(Round::FIRST, b"value").await.unwrap();
    let res = util.process_proposal(Round::FIRST, b"value").await;
    assert_matches!(res, Err(pipeline::Error::DuplicateProposal));
}

#[tokio::test]
async fn message_validation_errors() {
    let mut rng = StdRng::seed_from_u64(314);
    let mut util = UnitTestHarness::new(&mut rng, 4);

    // Wrong height.
    let mut msg = util.setup.commit_message(Round(1), b"value");
    msg.height = util.setup.height.next();
    let res = util.process(util.setup.sign(OperatorId(1), msg)).await;
    assert_matches!(res, Err(pipeline::Error::WrongHeight { .. }));

    // Wrong identifier.
    let mut msg = util.setup.commit_message(Round(1), b"value");
    msg.identifier = rng.gen();
    let res = util.process(util.setup.sign(OperatorId(1), msg)).await;
    assert_matches!(res, Err(pipeline::Error::WrongIdentifier { .. }));

    // Signer outside the committee.
    let msg = util.setup.commit_message(Round(1), b"value");
    let res = util
        .process(util.setup.keys[0].sign_msg(OperatorId(9), msg))
        .await;
    assert_matches!(
        res,
        Err(pipeline::Error::UnauthorizedSigner {
            signer: OperatorId(9)
        })
    );

    // Signature from the wrong key.
    let msg = util.setup.commit_message(Round(1), b"value");
    let res = util
        .process(util.setup.keys[1].sign_msg(OperatorId(1), msg))
        .await;
    assert_matches!(res, Err(pipeline::Error::InvalidSignature(_)));

    // None of the rejections touched the instance.
    assert_eq!(util.instance.phase(), Phase::PrePrepare);
    assert_eq!(util.instance.round(), Round::FIRST);
    assert!(util.try_recv().is_none());
}

#[tokio::test]
async fn prepare_quorum_prepares_and_votes_commit() {
    let mut rng = StdRng::seed_from_u64(315);
    let mut util = UnitTestHarness::new(&mut rng, 4);

    util.process_proposal(Round::FIRST, b"value").await.unwrap();
    util.drain_outbound();

    // Below the quorum threshold nothing happens.
    util.process_prepares(Round::FIRST, b"value", 2).await.unwrap();
    assert_eq!(util.instance.prepared_round, None);
    assert!(util.try_recv().is_none());

    // The third distinct prepare completes the quorum.
    util.process_prepares(Round::FIRST, b"value", 3).await.unwrap();
    assert_eq!(util.instance.prepared_round, Some(Round::FIRST));
    assert_eq!(util.instance.prepared_value, Some(b"value".to_vec()));
    assert_eq!(util.instance.phase(), Phase::Commit);

    let vote = util.try_recv().unwrap();
    assert_eq!(vote.message.msg_type, MsgType::Commit);
    assert!(util.try_recv().is_none(), "commit vote is sent only once");
}

#[tokio::test]
async fn commit_quorum_decides_and_persists() {
    let mut rng = StdRng::seed_from_u64(316);
    let mut util = UnitTestHarness::new(&mut rng, 4);

    let mut timer = util.timer.clone();
    timer.schedule(Round::FIRST);

    util.process_commits(Round(3), b"value", 3).await.unwrap();

    assert_eq!(util.instance.phase(), Phase::Decided);
    assert_eq!(util.timer.state(), TimerState::Canceled);

    // The aggregated certificate was broadcast and persisted.
    let cert = util.try_recv().unwrap();
    assert_eq!(cert.signers.len(), 3);
    cert.verify(&util.setup.committee).unwrap();

    let stored = util
        .store
        .get_decided(&util.setup.identifier, util.setup.height)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored, cert);
}

#[tokio::test]
async fn decided_instance_folds_late_commit() {
    let mut rng = StdRng::seed_from_u64(317);
    let mut util = UnitTestHarness::new(&mut rng, 4);

    util.process_commits(Round(3), b"value", 3).await.unwrap();
    util.drain_outbound();

    // A matching late commit extends the certificate.
    let late = util
        .setup
        .sign(OperatorId(4), util.setup.commit_message(Round(3), b"value"));
    util.process(late).await.unwrap();
    let decided = util.instance.committed_aggregated_msg().unwrap();
    assert_eq!(decided.signers.len(), 4);
    decided.verify(&util.setup.committee).unwrap();

    let stored = util
        .store
        .get_decided(&util.setup.identifier, util.setup.height)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.signers.len(), 4);

    // A commit for a different value doesn't.
    let conflicting = util
        .setup
        .sign(OperatorId(4), util.setup.commit_message(Round(3), b"value2"));
    let res = util.process(conflicting).await;
    assert_matches!(res, Err(pipeline::Error::CouldNotAggregateCommit(_)));

    // Any other message type is rejected outright.
    let prepare = util
        .setup
        .sign(OperatorId(4), util.setup.prepare_message(Round(3), b"value"));
    let res = util.process(prepare).await;
    assert_matches!(res, Err(pipeline::Error::AlreadyDecided));
}

#[tokio::test]
async fn run_loop_decides_from_queued_messages() {
    let mut rng = StdRng::seed_from_u64(318);
    let setup = Setup::new(&mut rng, 4);
    let store = in_memory::DecidedStore::new();

    let config = Config {
        operator_id: setup.operator_id(0),
        secret_key: setup.keys[0].clone(),
        committee: setup.committee.clone(),
        identifier: setup.identifier.clone(),
        height: setup.height,
        base_round_timeout: Duration::from_secs(60),
        decided_store: Box::new(store.clone()),
    };
    let (outbound_send, mut outbound_recv) = crate::create_outbound_channel();
    let (instance, queue) = config.build(outbound_send);

    let proposer = setup.committee.proposer(setup.height, Round::FIRST);
    queue.add_message(setup.sign(proposer, setup.proposal_message(Round::FIRST, b"value")));
    for index in 0..3 {
        let id = setup.operator_id(index);
        queue.add_message(setup.sign(id, setup.prepare_message(Round::FIRST, b"value")));
        queue.add_message(setup.sign(id, setup.commit_message(Round::FIRST, b"value")));
    }

    let decided = tokio::time::timeout(Duration::from_secs(5), instance.run())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(decided.signers.len(), 3);
    decided.verify(&setup.committee).unwrap();

    let stored = store
        .get_decided(&setup.identifier, setup.height)
        .await
        .unwrap();
    assert_eq!(stored, Some(decided));

    // The instance voted prepare and commit along the way, then broadcast
    // the certificate.
    let mut types = Vec::new();
    while let Ok(msg) = outbound_recv.try_recv() {
        types.push((msg.message.msg_type, msg.signers.len()));
    }
    assert_eq!(
        types,
        vec![(MsgType::Prepare, 1), (MsgType::Commit, 1), (MsgType::Commit, 3)]
    );
}
