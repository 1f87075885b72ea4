use lifecycle_client::LifecycleClient;
use lifecycle_common::{
    AssemblyError, ChaincodeDefinition, ChaincodePackage, Endorser, LifecycleError, PackageMetadata,
    ValidationError,
};
use lifecycle_mock::{generate_identity, MockPeer, PeerBehavior};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn package(label: &str) -> ChaincodePackage {
    ChaincodePackage::build(
        PackageMetadata {
            path: "github.com/example/basic".to_string(),
            chaincode_type: "golang".to_string(),
            label: label.to_string(),
        },
        b"not really a code archive",
    )
    .unwrap()
}

fn client(peers: &[Arc<MockPeer>]) -> LifecycleClient {
    LifecycleClient::new(
        Arc::new(generate_identity("Org1MSP")),
        peers.iter().map(|p| p.clone() as Arc<dyn Endorser>).collect(),
    )
}

#[tokio::test]
async fn install_then_query_installed() {
    let peers = [
        Arc::new(MockPeer::new("peer0.org1:7051", "Org1MSP")),
        Arc::new(MockPeer::new("peer1.org1:8051", "Org1MSP")),
    ];
    let client = client(&peers);
    let package = package("basic_1.0");
    let cancel = CancellationToken::new();

    let installed = client.install(package.bytes(), &cancel).await.unwrap();
    assert_eq!(installed.len(), 2);
    for result in &installed {
        assert_eq!(result.result.package_id, package.package_id());
        assert_eq!(result.result.label, "basic_1.0");
    }

    let listed = client.query_installed(&cancel).await.unwrap();
    assert_eq!(listed.len(), 2);
    let mut endpoints: Vec<_> = listed.iter().map(|r| r.endpoint.as_str()).collect();
    endpoints.sort();
    assert_eq!(endpoints, ["peer0.org1:7051", "peer1.org1:8051"]);
    for peer in &listed {
        assert_eq!(peer.result.len(), 1);
        assert_eq!(peer.result[0].package_id, package.package_id());
    }
}

#[tokio::test]
async fn corrupt_package_is_rejected_by_the_peer() {
    let peers = [Arc::new(MockPeer::new("peer0.org1:7051", "Org1MSP"))];
    let error = client(&peers)
        .install(b"not a gzip archive", &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(
        error,
        LifecycleError::Endorsement(lifecycle_common::EndorsementError::Rejected { status: 500, .. })
    ));
    assert!(peers[0].installed().await.is_empty());
}

#[tokio::test]
async fn empty_package_is_never_sent() {
    let peers = [Arc::new(MockPeer::new("peer0.org1:7051", "Org1MSP"))];
    assert!(matches!(
        client(&peers).install(&[], &CancellationToken::new()).await,
        Err(LifecycleError::Validation(ValidationError::EmptyPackage))
    ));
    assert!(peers[0].received().await.is_empty());
}

#[tokio::test]
async fn commit_readiness_reports_approvals() {
    let peer = Arc::new(MockPeer::new("peer0.org1:7051", "Org1MSP"));
    peer.set_approval("Org1MSP", true).await;
    peer.set_approval("Org2MSP", false).await;
    let definition = ChaincodeDefinition::new("CHANNEL", "CHAINCODE", "1.0", 1).unwrap();

    let approvals = client(&[peer])
        .check_commit_readiness(&definition, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(approvals.len(), 2);
    assert_eq!(approvals.get("Org1MSP"), Some(&true));
    assert_eq!(approvals.get("Org2MSP"), Some(&false));
}

#[tokio::test]
async fn commit_readiness_refuses_disagreeing_peers() {
    let peers = [
        Arc::new(MockPeer::new("peer0.org1:7051", "Org1MSP")),
        Arc::new(MockPeer::new("peer1.org1:8051", "Org1MSP")),
    ];
    for peer in &peers {
        peer.set_approval("Org1MSP", true).await;
        peer.set_approval("Org2MSP", true).await;
    }
    let definition = ChaincodeDefinition::new("CHANNEL", "CHAINCODE", "1.0", 1).unwrap();
    let client = client(&peers);

    let approvals = client
        .check_commit_readiness(&definition, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(approvals.get("Org2MSP"), Some(&true));

    peers[1].set_approval("Org1MSP", false).await;
    let error = client
        .check_commit_readiness(&definition, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(
        error,
        LifecycleError::Assembly(AssemblyError::PayloadMismatch { .. })
    ));
    let rendered = error.to_string();
    assert!(rendered.contains("peer0.org1:7051"));
    assert!(rendered.contains("peer1.org1:8051"));
}

#[tokio::test]
async fn query_failure_is_not_swallowed() {
    let peers = [Arc::new(MockPeer::new("peer0.org1:7051", "Org1MSP").behaving(
        PeerBehavior::Reject {
            status: 403,
            message: "access denied".to_string(),
        },
    ))];
    let error = client(&peers)
        .query_installed(&CancellationToken::new())
        .await
        .unwrap_err();
    assert!(error.to_string().contains("access denied"));
    assert!(error.to_string().contains("peer0.org1:7051"));
}
