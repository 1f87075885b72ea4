use lifecycle_client::{
    build_lifecycle_proposal, collect_endorsements, BroadcastConfig, CollectorConfig,
    EndorsementQuorum, LifecycleClient,
};
use lifecycle_common::protos::common::{Payload, Status};
use lifecycle_common::protos::peer::{ChaincodeActionPayload, Transaction};
use lifecycle_common::{
    AssemblyError, BroadcastError, ChaincodeDefinition, CommitPhase, EndorsementError, Endorser,
    LifecycleError, LifecycleOperation, Signer, SigningIdentity,
};
use lifecycle_mock::{generate_identity, MockOrderer, MockPeer, OrdererBehavior, PeerBehavior};
use prost::Message;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

fn definition() -> ChaincodeDefinition {
    ChaincodeDefinition::new("CHANNEL", "CHAINCODE", "1.0", 1).unwrap()
}

fn admin() -> Arc<SigningIdentity> {
    Arc::new(generate_identity("Org1MSP"))
}

fn client(signer: Arc<SigningIdentity>, peers: &[Arc<MockPeer>]) -> LifecycleClient {
    let endorsers = peers
        .iter()
        .map(|peer| peer.clone() as Arc<dyn Endorser>)
        .collect();
    LifecycleClient::new(signer, endorsers).with_collector_config(CollectorConfig {
        timeout: Duration::from_secs(5),
        ..Default::default()
    })
}

#[tokio::test]
async fn commit_is_endorsed_assembled_and_broadcast() {
    let signer = admin();
    let peers = [
        Arc::new(MockPeer::new("peer0.org1:7051", "Org1MSP")),
        Arc::new(MockPeer::new("peer0.org2:9051", "Org2MSP")),
    ];
    let client = client(signer.clone(), &peers);
    let mut orderer = MockOrderer::new("orderer:7050", OrdererBehavior::Accept);

    let submitted = client
        .commit(&definition(), &mut orderer, &CancellationToken::new())
        .await
        .unwrap();
    assert!(!submitted.tx_id.is_empty());
    assert_eq!(submitted.endorsements, 2);
    assert_eq!(submitted.ack.status, Status::Success);

    // Each peer saw the same signed proposal exactly once.
    let first = peers[0].received().await;
    assert_eq!(first.len(), 1);
    assert_eq!(first, peers[1].received().await);

    let envelopes = orderer.envelopes();
    assert_eq!(envelopes.len(), 1);
    signer
        .verify(&envelopes[0].payload, &envelopes[0].signature)
        .unwrap();
    // The submission signature is distinct from the proposal signature.
    assert_ne!(envelopes[0].signature, first[0].signature);

    let payload = Payload::decode(envelopes[0].payload.as_slice()).unwrap();
    let channel_header = payload
        .header
        .as_ref()
        .unwrap()
        .decode_channel_header()
        .unwrap();
    assert_eq!(channel_header.tx_id, submitted.tx_id.as_str());
    let transaction = Transaction::decode(payload.data.as_slice()).unwrap();
    let action = ChaincodeActionPayload::decode(transaction.actions[0].payload.as_slice()).unwrap();
    let endorsers: Vec<_> = action
        .action
        .unwrap()
        .endorsements
        .into_iter()
        .map(|e| e.endorser)
        .collect();
    assert_eq!(endorsers.len(), 2);
    assert!(endorsers.contains(&peers[0].identity().creator().to_vec()));
    assert!(endorsers.contains(&peers[1].identity().creator().to_vec()));
}

#[tokio::test]
async fn approve_goes_through_ordering_too() {
    let peers = [Arc::new(MockPeer::new("peer0.org1:7051", "Org1MSP"))];
    let client = client(admin(), &peers);
    let mut orderer = MockOrderer::new("orderer:7050", OrdererBehavior::Accept);
    let definition = definition().with_package_id("basic_1.0:abc");

    client
        .approve(&definition, &mut orderer, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(orderer.envelopes().len(), 1);
}

#[tokio::test]
async fn single_peer_endorsement_set() {
    let signer = admin();
    let peer: Arc<dyn Endorser> = Arc::new(MockPeer::new("peer0.org1:7051", "Org1MSP"));
    let definition = definition();
    let proposal =
        build_lifecycle_proposal(&LifecycleOperation::Commit(&definition), signer.as_ref()).unwrap();

    let set = collect_endorsements(
        &proposal,
        &[peer],
        &CollectorConfig::default(),
        &CancellationToken::new(),
    )
    .await
    .unwrap();
    assert_eq!(set.len(), 1);
    assert!(set.failures.is_empty());
}

#[tokio::test]
async fn rejected_proposal_names_the_peer_and_status() {
    let peers = [
        Arc::new(MockPeer::new("peer0.org1:7051", "Org1MSP")),
        Arc::new(MockPeer::new("peer0.org2:9051", "Org2MSP").behaving(PeerBehavior::Reject {
            status: 500,
            message: "Endorsement error".to_string(),
        })),
    ];
    let client = client(admin(), &peers);
    let mut orderer = MockOrderer::new("orderer:7050", OrdererBehavior::Accept);

    let error = client
        .commit(&definition(), &mut orderer, &CancellationToken::new())
        .await
        .unwrap_err();
    match &error {
        LifecycleError::Endorsement(EndorsementError::Rejected {
            endpoint,
            status,
            message,
        }) => {
            assert_eq!(endpoint, "peer0.org2:9051");
            assert_eq!(*status, 500);
            assert_eq!(message, "Endorsement error");
        }
        other => panic!("expected a rejection, got {other:?}"),
    }
    assert_eq!(error.phase(), CommitPhase::Endorsing);
    assert_eq!(orderer.sends(), 0);
}

#[tokio::test]
async fn missing_endorsement_fails_the_attempt() {
    let peers = [Arc::new(
        MockPeer::new("peer0.org1:7051", "Org1MSP").behaving(PeerBehavior::OmitEndorsement),
    )];
    let client = client(admin(), &peers);
    let mut orderer = MockOrderer::new("orderer:7050", OrdererBehavior::Accept);
    assert!(matches!(
        client
            .commit(&definition(), &mut orderer, &CancellationToken::new())
            .await,
        Err(LifecycleError::Endorsement(EndorsementError::MissingEndorsement { .. }))
    ));
}

#[tokio::test]
async fn unreachable_peer_is_a_transport_failure() {
    let peers = [Arc::new(
        MockPeer::new("peer0.org1:7051", "Org1MSP")
            .behaving(PeerBehavior::Unreachable("connection refused".to_string())),
    )];
    let client = client(admin(), &peers);
    let mut orderer = MockOrderer::new("orderer:7050", OrdererBehavior::Accept);
    let error = client
        .commit(&definition(), &mut orderer, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(
        &error,
        LifecycleError::Endorsement(EndorsementError::Transport { endpoint, cause })
            if endpoint == "peer0.org1:7051" && cause.0 == "connection refused"
    ));
    assert!(error.to_string().contains("peer0.org1:7051"));
}

#[tokio::test]
async fn first_failure_drops_outstanding_calls() {
    let hanging = Arc::new(MockPeer::new("peer0.org2:9051", "Org2MSP").behaving(PeerBehavior::Hang));
    let peers = [
        hanging.clone(),
        Arc::new(
            MockPeer::new("peer0.org1:7051", "Org1MSP")
                .behaving(PeerBehavior::Unreachable("reset".to_string())),
        ),
    ];
    let client = client(admin(), &peers);
    let mut orderer = MockOrderer::new("orderer:7050", OrdererBehavior::Accept);

    let started = Instant::now();
    let error = client
        .commit(&definition(), &mut orderer, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(
        error,
        LifecycleError::Endorsement(EndorsementError::Transport { .. })
    ));
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(hanging.in_flight(), 0);
}

#[tokio::test]
async fn divergent_payloads_are_never_assembled() {
    let peers = [
        Arc::new(MockPeer::new("peer0.org1:7051", "Org1MSP")),
        Arc::new(
            MockPeer::new("peer0.org2:9051", "Org2MSP")
                .behaving(PeerBehavior::Diverge(b"different write set".to_vec())),
        ),
    ];
    let client = client(admin(), &peers);
    let mut orderer = MockOrderer::new("orderer:7050", OrdererBehavior::Accept);

    let error = client
        .commit(&definition(), &mut orderer, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(
        error,
        LifecycleError::Assembly(AssemblyError::PayloadMismatch { .. })
    ));
    assert_eq!(error.phase(), CommitPhase::Endorsed);
    assert_eq!(orderer.sends(), 0);
}

#[tokio::test]
async fn broadcast_send_failure_is_reported_once() {
    let peers = [Arc::new(MockPeer::new("peer0.org1:7051", "Org1MSP"))];
    let client = client(admin(), &peers);
    let mut orderer = MockOrderer::new(
        "orderer:7050",
        OrdererBehavior::SendFails("Send error".to_string()),
    );

    let error = client
        .commit(&definition(), &mut orderer, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(
        &error,
        LifecycleError::Broadcast(BroadcastError::Transport { endpoint, .. }) if endpoint == "orderer:7050"
    ));
    assert_eq!(orderer.sends(), 1);
}

#[tokio::test]
async fn unacknowledged_broadcast_reports_submitted() {
    let peers = [Arc::new(MockPeer::new("peer0.org1:7051", "Org1MSP"))];
    let client = client(admin(), &peers).with_broadcast_config(BroadcastConfig {
        timeout: Duration::from_millis(50),
    });

    for behavior in [OrdererBehavior::Hang, OrdererBehavior::Close] {
        let mut orderer = MockOrderer::new("orderer:7050", behavior);
        let error = client
            .commit(&definition(), &mut orderer, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(orderer.envelopes().len(), 1);
        assert_eq!(error.phase(), CommitPhase::Submitted);
        assert!(matches!(&error, LifecycleError::Broadcast(e) if e.envelope_sent()));
    }
}

#[tokio::test]
async fn orderer_rejection_ends_in_rejected_phase() {
    let peers = [Arc::new(MockPeer::new("peer0.org1:7051", "Org1MSP"))];
    let client = client(admin(), &peers);
    let mut orderer = MockOrderer::new("orderer:7050", OrdererBehavior::Respond(Status::Forbidden));

    let error = client
        .commit(&definition(), &mut orderer, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(
        error,
        LifecycleError::Broadcast(BroadcastError::Rejected { status: 403, .. })
    ));
    assert_eq!(error.phase(), CommitPhase::Rejected);
}

#[tokio::test]
async fn cancellation_before_any_response() {
    let peers = [
        Arc::new(MockPeer::new("peer0.org1:7051", "Org1MSP").behaving(PeerBehavior::Hang)),
        Arc::new(MockPeer::new("peer0.org2:9051", "Org2MSP").behaving(PeerBehavior::Hang)),
    ];
    let client = LifecycleClient::new(
        admin(),
        peers.iter().map(|p| p.clone() as Arc<dyn Endorser>).collect(),
    )
    .with_collector_config(CollectorConfig {
        timeout: Duration::from_secs(600),
        ..Default::default()
    });
    let mut orderer = MockOrderer::new("orderer:7050", OrdererBehavior::Accept);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let error = client
        .commit(&definition(), &mut orderer, &cancel)
        .await
        .unwrap_err();
    assert!(matches!(
        error,
        LifecycleError::Cancelled {
            phase: CommitPhase::Endorsing
        }
    ));
    assert!(started.elapsed() < Duration::from_secs(5));
    for peer in &peers {
        assert_eq!(peer.received().await.len(), 1);
        assert_eq!(peer.in_flight(), 0);
    }
    assert_eq!(orderer.sends(), 0);
}

#[tokio::test]
async fn silent_peer_times_out() {
    let peers = [Arc::new(
        MockPeer::new("peer0.org1:7051", "Org1MSP").behaving(PeerBehavior::Hang),
    )];
    let client = LifecycleClient::new(
        admin(),
        peers.iter().map(|p| p.clone() as Arc<dyn Endorser>).collect(),
    )
    .with_collector_config(CollectorConfig {
        timeout: Duration::from_millis(50),
        ..Default::default()
    });
    let mut orderer = MockOrderer::new("orderer:7050", OrdererBehavior::Accept);
    assert!(matches!(
        client
            .commit(&definition(), &mut orderer, &CancellationToken::new())
            .await,
        Err(LifecycleError::Endorsement(EndorsementError::Timeout { timeout_ms: 50, .. }))
    ));
    assert_eq!(peers[0].in_flight(), 0);
}

#[tokio::test]
async fn forged_endorsement_is_caught_when_verifying() {
    let peers = [Arc::new(
        MockPeer::new("peer0.org1:7051", "Org1MSP").behaving(PeerBehavior::BadSignature),
    )];
    let signer = admin();
    let verifying = client(signer.clone(), &peers).with_collector_config(CollectorConfig {
        verify_signatures: true,
        ..Default::default()
    });
    let mut orderer = MockOrderer::new("orderer:7050", OrdererBehavior::Accept);
    assert!(matches!(
        verifying
            .commit(&definition(), &mut orderer, &CancellationToken::new())
            .await,
        Err(LifecycleError::Endorsement(EndorsementError::InvalidSignature { .. }))
    ));

    peers[0].set_behavior(PeerBehavior::Endorse);
    verifying
        .commit(&definition(), &mut orderer, &CancellationToken::new())
        .await
        .unwrap();
}

#[tokio::test]
async fn organization_quorum_tolerates_failed_peers() {
    let peers = [
        Arc::new(MockPeer::new("peer0.org1:7051", "Org1MSP")),
        Arc::new(MockPeer::new("peer0.org2:9051", "Org2MSP")),
        Arc::new(
            MockPeer::new("peer0.org3:11051", "Org3MSP")
                .behaving(PeerBehavior::Unreachable("down".to_string())),
        ),
    ];
    let quorum = |organizations| CollectorConfig {
        quorum: EndorsementQuorum::Organizations(organizations),
        ..Default::default()
    };
    let mut orderer = MockOrderer::new("orderer:7050", OrdererBehavior::Accept);

    let submitted = client(admin(), &peers)
        .with_collector_config(quorum(2))
        .commit(&definition(), &mut orderer, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(submitted.endorsements, 2);

    let error = client(admin(), &peers)
        .with_collector_config(quorum(3))
        .commit(&definition(), &mut orderer, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(
        error,
        LifecycleError::Endorsement(EndorsementError::QuorumNotMet {
            required: 3,
            endorsed: 2,
            failed: 1
        })
    ));
}

#[tokio::test]
async fn organization_quorum_never_counts_forged_endorsements() {
    let peers = [
        Arc::new(MockPeer::new("peer0.org1:7051", "Org1MSP")),
        Arc::new(
            MockPeer::new("peer0.org2:9051", "Org2MSP").behaving(PeerBehavior::BadSignature),
        ),
    ];
    let mut orderer = MockOrderer::new("orderer:7050", OrdererBehavior::Accept);

    let error = client(admin(), &peers)
        .with_collector_config(CollectorConfig {
            quorum: EndorsementQuorum::Organizations(2),
            verify_signatures: false,
            ..Default::default()
        })
        .commit(&definition(), &mut orderer, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(
        error,
        LifecycleError::Endorsement(EndorsementError::QuorumNotMet {
            required: 2,
            endorsed: 1,
            failed: 1
        })
    ));
    assert_eq!(orderer.sends(), 0);
}

#[tokio::test]
async fn no_endorsers_is_an_error() {
    let client = LifecycleClient::new(admin(), Vec::new());
    let mut orderer = MockOrderer::new("orderer:7050", OrdererBehavior::Accept);
    assert!(matches!(
        client
            .commit(&definition(), &mut orderer, &CancellationToken::new())
            .await,
        Err(LifecycleError::Endorsement(EndorsementError::NoEndorsers))
    ));
}

#[tokio::test]
async fn invalid_definition_never_reaches_a_peer() {
    let peers = [Arc::new(MockPeer::new("peer0.org1:7051", "Org1MSP"))];
    let client = client(admin(), &peers);
    let mut orderer = MockOrderer::new("orderer:7050", OrdererBehavior::Accept);
    let definition = ChaincodeDefinition {
        version: String::new(),
        ..definition()
    };
    assert!(matches!(
        client
            .commit(&definition, &mut orderer, &CancellationToken::new())
            .await,
        Err(LifecycleError::Validation(_))
    ));
    assert!(peers[0].received().await.is_empty());
}

#[tokio::test]
async fn concurrent_attempts_share_one_identity() {
    let peers = [Arc::new(MockPeer::new("peer0.org1:7051", "Org1MSP"))];
    let client = Arc::new(client(admin(), &peers));

    let mut handles = Vec::new();
    for _ in 0..4 {
        let client = client.clone();
        handles.push(tokio::spawn(async move {
            let mut orderer = MockOrderer::new("orderer:7050", OrdererBehavior::Accept);
            client
                .commit(&definition(), &mut orderer, &CancellationToken::new())
                .await
                .map(|submitted| submitted.tx_id)
        }));
    }
    let mut tx_ids = Vec::new();
    for handle in handles {
        tx_ids.push(handle.await.unwrap().unwrap());
    }
    tx_ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    tx_ids.dedup();
    assert_eq!(tx_ids.len(), 4);
    assert_eq!(peers[0].received().await.len(), 4);
}
