use crate::metrics::ENDORSEMENT_FAILURES;
use futures_util::stream::{FuturesUnordered, StreamExt};
use lifecycle_common::protos::msp::SerializedIdentity;
use lifecycle_common::protos::peer::{ProposalResponse, SignedProposal};
use lifecycle_common::{
    decode_identity, CommitPhase, Endorsed, EndorsementError, EndorsementSet, Endorser,
    LifecycleError, LifecycleProposal, PeerFailure, ENDORSEMENT_SUCCESS,
};
use prost::Message;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How many endorsements a proposal needs before it can be assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "QuorumRepr", into = "QuorumRepr")]
pub enum EndorsementQuorum {
    /// Every supplied peer must endorse. The first failure aborts collection.
    #[default]
    All,
    /// Endorsements from at least this many distinct organizations. Failed
    /// peers are recorded and collection continues. Endorsement signatures
    /// are always verified under this quorum.
    Organizations(usize),
}

/// YAML form: `all` or `{ organizations: 2 }`.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum QuorumRepr {
    Keyword(String),
    Organizations { organizations: usize },
}

impl TryFrom<QuorumRepr> for EndorsementQuorum {
    type Error = String;

    fn try_from(repr: QuorumRepr) -> Result<Self, Self::Error> {
        match repr {
            QuorumRepr::Keyword(keyword) if keyword == "all" => Ok(EndorsementQuorum::All),
            QuorumRepr::Keyword(other) => Err(format!("unknown quorum '{other}'")),
            QuorumRepr::Organizations { organizations: 0 } => {
                Err("quorum needs at least one organization".to_string())
            }
            QuorumRepr::Organizations { organizations } => {
                Ok(EndorsementQuorum::Organizations(organizations))
            }
        }
    }
}

impl From<EndorsementQuorum> for QuorumRepr {
    fn from(quorum: EndorsementQuorum) -> Self {
        match quorum {
            EndorsementQuorum::All => QuorumRepr::Keyword("all".to_string()),
            EndorsementQuorum::Organizations(organizations) => {
                QuorumRepr::Organizations { organizations }
            }
        }
    }
}

impl EndorsementQuorum {
    /// Whether endorsement signatures must verify before they count.
    fn requires_verification(&self) -> bool {
        matches!(self, EndorsementQuorum::Organizations(_))
    }

    fn is_met(&self, set: &EndorsementSet) -> Result<(), EndorsementError> {
        match self {
            EndorsementQuorum::All => Ok(()),
            EndorsementQuorum::Organizations(required) => {
                let endorsed = endorsing_organizations(set).len();
                if endorsed >= *required {
                    Ok(())
                } else {
                    Err(EndorsementError::QuorumNotMet {
                        required: *required,
                        endorsed,
                        failed: set.failures.len(),
                    })
                }
            }
        }
    }
}

/// Distinct MSP ids found in the endorser identities of `set`.
pub fn endorsing_organizations(set: &EndorsementSet) -> HashSet<String> {
    set.iter()
        .filter_map(|endorsed| {
            SerializedIdentity::decode(endorsed.endorsement.endorser.as_slice()).ok()
        })
        .map(|identity| identity.mspid)
        .filter(|mspid| !mspid.is_empty())
        .collect()
}

#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Deadline for each individual peer call.
    pub timeout: Duration,
    pub quorum: EndorsementQuorum,
    /// Check every endorsement signature against the endorser certificate.
    /// Implied by [`EndorsementQuorum::Organizations`].
    pub verify_signatures: bool,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        CollectorConfig {
            timeout: Duration::from_secs(30),
            quorum: EndorsementQuorum::All,
            verify_signatures: false,
        }
    }
}

/// Sends `proposal` to every endorser concurrently and gathers the results.
///
/// With [`EndorsementQuorum::All`] the first failing peer ends collection and
/// the calls still in flight are dropped. Cancelling `cancel` drops all
/// outstanding calls and returns [`LifecycleError::Cancelled`].
pub async fn collect_endorsements(
    proposal: &LifecycleProposal,
    endorsers: &[Arc<dyn Endorser>],
    config: &CollectorConfig,
    cancel: &CancellationToken,
) -> Result<EndorsementSet, LifecycleError> {
    if endorsers.is_empty() {
        return Err(EndorsementError::NoEndorsers.into());
    }
    if cancel.is_cancelled() {
        return Err(LifecycleError::Cancelled {
            phase: CommitPhase::Endorsing,
        });
    }

    let signed = &proposal.signed;
    let verify = config.verify_signatures || config.quorum.requires_verification();
    let mut pending: FuturesUnordered<_> = endorsers
        .iter()
        .map(|endorser| endorse_one(endorser.as_ref(), signed, config.timeout, verify))
        .collect();
    debug!(tx_id = %proposal.tx_id, peers = endorsers.len(), "Collecting endorsements");

    let mut set = EndorsementSet::default();
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!(tx_id = %proposal.tx_id, outstanding = pending.len(), "Endorsement collection cancelled");
                return Err(LifecycleError::Cancelled { phase: CommitPhase::Endorsing });
            }
            next = pending.next() => next,
        };
        let Some(outcome) = next else { break };

        match outcome {
            Ok(endorsed) => {
                debug!(tx_id = %proposal.tx_id, peer = %endorsed.endpoint, "Received endorsement");
                set.endorsements.push(endorsed);
            }
            Err(error) => {
                ENDORSEMENT_FAILURES.inc();
                if config.quorum == EndorsementQuorum::All {
                    warn!(tx_id = %proposal.tx_id, outstanding = pending.len(), "Endorsement failed: {}", error);
                    return Err(error.into());
                }
                warn!(tx_id = %proposal.tx_id, "Endorsement failed, continuing: {}", error);
                set.failures.push(PeerFailure {
                    endpoint: error.endpoint().unwrap_or_default().to_string(),
                    error,
                });
            }
        }
    }

    config.quorum.is_met(&set)?;
    info!(
        tx_id = %proposal.tx_id,
        endorsements = set.len(),
        failures = set.failures.len(),
        "Collected endorsements"
    );
    Ok(set)
}

async fn endorse_one(
    endorser: &dyn Endorser,
    proposal: &SignedProposal,
    timeout: Duration,
    verify: bool,
) -> Result<Endorsed, EndorsementError> {
    let endpoint = endorser.endpoint().to_string();
    let response = match tokio::time::timeout(timeout, endorser.process_proposal(proposal)).await {
        Err(_) => {
            return Err(EndorsementError::Timeout {
                endpoint,
                timeout_ms: timeout.as_millis() as u64,
            })
        }
        Ok(Err(cause)) => return Err(EndorsementError::Transport { endpoint, cause }),
        Ok(Ok(response)) => response,
    };
    validate_response(endpoint, response, verify)
}

/// Accepts a peer response only when it succeeded and carries an endorsement.
pub fn validate_response(
    endpoint: String,
    response: ProposalResponse,
    verify_signature: bool,
) -> Result<Endorsed, EndorsementError> {
    let Some(result) = response.response else {
        return Err(EndorsementError::Rejected {
            endpoint,
            status: 0,
            message: "response is missing".to_string(),
        });
    };
    if result.status != ENDORSEMENT_SUCCESS {
        return Err(EndorsementError::Rejected {
            endpoint,
            status: result.status,
            message: result.message,
        });
    }
    let Some(endorsement) = response.endorsement else {
        return Err(EndorsementError::MissingEndorsement { endpoint });
    };

    if verify_signature {
        let invalid = |reason: String| EndorsementError::InvalidSignature {
            endpoint: endpoint.clone(),
            reason,
        };
        let (_, certificate) =
            decode_identity(&endorsement.endorser).map_err(|e| invalid(e.to_string()))?;
        let mut signed_bytes = response.payload.clone();
        signed_bytes.extend_from_slice(&endorsement.endorser);
        certificate
            .verify(&signed_bytes, &endorsement.signature)
            .map_err(|e| invalid(e.to_string()))?;
    }

    Ok(Endorsed {
        endpoint,
        response: result,
        payload: response.payload,
        endorsement,
    })
}
