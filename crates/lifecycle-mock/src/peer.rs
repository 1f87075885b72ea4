use async_trait::async_trait;
use lifecycle_common::protos::lifecycle::{
    CheckCommitReadinessResult, InstallChaincodeArgs, InstallChaincodeResult, InstalledChaincode,
    QueryInstalledChaincodesResult,
};
use lifecycle_common::protos::peer::{
    Endorsement, ProposalResponse, ProposalResponsePayload, Response, SignedProposal,
};
use lifecycle_common::{
    ChaincodePackage, Endorser, Signer, SigningIdentity, TransportError,
    CHECK_COMMIT_READINESS_FUNCTION, ENDORSEMENT_SUCCESS, INSTALL_FUNCTION,
    QUERY_INSTALLED_FUNCTION,
};
use prost::Message;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// How a [`MockPeer`] answers proposals.
#[derive(Debug, Clone)]
pub enum PeerBehavior {
    /// Simulate and endorse.
    Endorse,
    /// Endorse, but over a response payload no other peer produces.
    Diverge(Vec<u8>),
    /// Answer with the given status instead of endorsing.
    Reject { status: i32, message: String },
    /// Successful status but no endorsement attached.
    OmitEndorsement,
    /// Endorse with a signature that does not match the payload.
    BadSignature,
    /// Fail the call at the transport level.
    Unreachable(String),
    /// Never answer.
    Hang,
}

#[derive(Default)]
struct PeerState {
    received: Vec<SignedProposal>,
    installed: Vec<InstalledChaincode>,
    approvals: HashMap<String, bool>,
}

/// An endorsing peer with its own organization identity.
pub struct MockPeer {
    endpoint: String,
    identity: SigningIdentity,
    behavior: std::sync::Mutex<PeerBehavior>,
    state: Arc<Mutex<PeerState>>,
    in_flight: Arc<AtomicUsize>,
}

/// Tracks proposals currently being processed; decremented when the call is dropped.
struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        InFlight(counter.clone())
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockPeer {
    pub fn new(endpoint: impl Into<String>, msp_id: &str) -> Self {
        Self::with_identity(endpoint, crate::generate_identity(msp_id))
    }

    pub fn with_identity(endpoint: impl Into<String>, identity: SigningIdentity) -> Self {
        MockPeer {
            endpoint: endpoint.into(),
            identity,
            behavior: std::sync::Mutex::new(PeerBehavior::Endorse),
            state: Arc::new(Mutex::new(PeerState::default())),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn behaving(self, behavior: PeerBehavior) -> Self {
        self.set_behavior(behavior);
        self
    }

    pub fn set_behavior(&self, behavior: PeerBehavior) {
        if let Ok(mut current) = self.behavior.lock() {
            *current = behavior;
        }
    }

    /// Records an organization approval reported by readiness checks.
    pub async fn set_approval(&self, msp_id: &str, approved: bool) {
        self.state
            .lock()
            .await
            .approvals
            .insert(msp_id.to_string(), approved);
    }

    pub fn identity(&self) -> &SigningIdentity {
        &self.identity
    }

    pub async fn received(&self) -> Vec<SignedProposal> {
        self.state.lock().await.received.clone()
    }

    pub async fn installed(&self) -> Vec<InstalledChaincode> {
        self.state.lock().await.installed.clone()
    }

    /// Proposals whose processing has started and not yet finished or been dropped.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    fn behavior(&self) -> PeerBehavior {
        self.behavior
            .lock()
            .map(|behavior| behavior.clone())
            .unwrap_or(PeerBehavior::Endorse)
    }

    /// Runs the lifecycle function named by the proposal and returns its result payload.
    async fn simulate(&self, function: &str, args: &[u8]) -> Result<Vec<u8>, String> {
        let mut state = self.state.lock().await;
        match function {
            INSTALL_FUNCTION => {
                let args = InstallChaincodeArgs::decode(args).map_err(|e| e.to_string())?;
                let package = ChaincodePackage::parse(args.chaincode_install_package)
                    .map_err(|e| e.to_string())?;
                let installed = InstalledChaincode {
                    package_id: package.package_id(),
                    label: package.label().to_string(),
                };
                info!(peer = %self.endpoint, package_id = %installed.package_id, "Installed chaincode");
                if !state.installed.contains(&installed) {
                    state.installed.push(installed.clone());
                }
                Ok(InstallChaincodeResult {
                    package_id: installed.package_id,
                    label: installed.label,
                }
                .encode_to_vec())
            }
            QUERY_INSTALLED_FUNCTION => Ok(QueryInstalledChaincodesResult {
                installed_chaincodes: state.installed.clone(),
            }
            .encode_to_vec()),
            CHECK_COMMIT_READINESS_FUNCTION => Ok(CheckCommitReadinessResult {
                approvals: state.approvals.clone(),
            }
            .encode_to_vec()),
            _ => Ok(Vec::new()),
        }
    }

    /// Signs the response payload followed by the endorser identity.
    fn create_endorsement(&self, payload: &[u8]) -> Result<Endorsement, TransportError> {
        let endorser = self.identity.creator().to_vec();
        let mut message = payload.to_vec();
        message.extend_from_slice(&endorser);
        let signature = self
            .identity
            .sign(&message)
            .map_err(|e| TransportError(e.to_string()))?;
        Ok(Endorsement { endorser, signature })
    }
}

#[async_trait]
impl Endorser for MockPeer {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn process_proposal(
        &self,
        proposal: &SignedProposal,
    ) -> Result<ProposalResponse, TransportError> {
        let _guard = InFlight::enter(&self.in_flight);
        self.state.lock().await.received.push(proposal.clone());
        debug!(peer = %self.endpoint, "Received proposal");

        let behavior = self.behavior();
        match &behavior {
            PeerBehavior::Unreachable(cause) => return Err(TransportError(cause.clone())),
            PeerBehavior::Hang => std::future::pending::<()>().await,
            PeerBehavior::Reject { status, message } => {
                return Ok(ProposalResponse {
                    response: Some(Response {
                        status: *status,
                        message: message.clone(),
                        payload: Vec::new(),
                    }),
                    ..Default::default()
                })
            }
            _ => {}
        }

        let invocation = proposal
            .decode_proposal()
            .and_then(|p| p.decode_invocation())
            .map_err(|e| TransportError(format!("malformed proposal: {e}")))?;
        let args = invocation.args();
        let function = args
            .first()
            .map(|f| String::from_utf8_lossy(f).into_owned())
            .unwrap_or_default();
        let input = args.get(1).map(Vec::as_slice).unwrap_or_default();

        let result = match self.simulate(&function, input).await {
            Ok(result) => result,
            Err(message) => {
                return Ok(ProposalResponse {
                    response: Some(Response {
                        status: 500,
                        message,
                        payload: Vec::new(),
                    }),
                    ..Default::default()
                })
            }
        };

        let extension = match &behavior {
            PeerBehavior::Diverge(extension) => extension.clone(),
            _ => result.clone(),
        };
        let payload = ProposalResponsePayload {
            proposal_hash: Sha256::digest(&proposal.proposal_bytes).to_vec(),
            extension,
        }
        .encode_to_vec();

        let endorsement = match behavior {
            PeerBehavior::OmitEndorsement => None,
            PeerBehavior::BadSignature => Some(self.create_endorsement(b"something else")?),
            _ => Some(self.create_endorsement(&payload)?),
        };

        Ok(ProposalResponse {
            version: 1,
            timestamp: None,
            response: Some(Response {
                status: ENDORSEMENT_SUCCESS,
                message: String::new(),
                payload: result,
            }),
            payload,
            endorsement,
        })
    }
}
