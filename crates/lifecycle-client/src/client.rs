use crate::assembly::assemble_envelope;
use crate::broadcast::{submit, BroadcastConfig};
use crate::endorsement::{collect_endorsements, CollectorConfig};
use crate::metrics::init_metrics;
use crate::proposal::build_lifecycle_proposal;
use lifecycle_common::protos::lifecycle::{
    CheckCommitReadinessResult, InstallChaincodeResult, InstalledChaincode,
    QueryInstalledChaincodesResult,
};
use lifecycle_common::{
    AssemblyError, BroadcastAck, BroadcastStream, ChaincodeDefinition, CommitPhase, Endorsed,
    EndorsementError, EndorsementSet, Endorser, LifecycleError, LifecycleOperation, Signer,
    TransactionId,
};
use prost::Message;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Result of a definition transaction accepted by the ordering service.
#[derive(Debug, Clone)]
pub struct SubmittedTransaction {
    pub tx_id: TransactionId,
    pub endorsements: usize,
    pub ack: BroadcastAck,
}

/// A query answer from one peer.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerResult<T> {
    pub endpoint: String,
    pub result: T,
}

/// Drives lifecycle operations for one organization admin against a set of peers.
pub struct LifecycleClient {
    signer: Arc<dyn Signer>,
    endorsers: Vec<Arc<dyn Endorser>>,
    collector: CollectorConfig,
    broadcast: BroadcastConfig,
}

impl LifecycleClient {
    pub fn new(signer: Arc<dyn Signer>, endorsers: Vec<Arc<dyn Endorser>>) -> Self {
        init_metrics();
        LifecycleClient {
            signer,
            endorsers,
            collector: CollectorConfig::default(),
            broadcast: BroadcastConfig::default(),
        }
    }

    pub fn with_collector_config(mut self, collector: CollectorConfig) -> Self {
        self.collector = collector;
        self
    }

    pub fn with_broadcast_config(mut self, broadcast: BroadcastConfig) -> Self {
        self.broadcast = broadcast;
        self
    }

    /// Commits `definition` to its channel.
    pub async fn commit(
        &self,
        definition: &ChaincodeDefinition,
        orderer: &mut dyn BroadcastStream,
        cancel: &CancellationToken,
    ) -> Result<SubmittedTransaction, LifecycleError> {
        self.submit_transaction(LifecycleOperation::Commit(definition), orderer, cancel)
            .await
    }

    /// Approves `definition` on behalf of the signer's organization.
    pub async fn approve(
        &self,
        definition: &ChaincodeDefinition,
        orderer: &mut dyn BroadcastStream,
        cancel: &CancellationToken,
    ) -> Result<SubmittedTransaction, LifecycleError> {
        self.submit_transaction(LifecycleOperation::ApproveForMyOrg(definition), orderer, cancel)
            .await
    }

    /// Build, endorse, assemble and broadcast one transaction. Phases only move forward.
    async fn submit_transaction(
        &self,
        operation: LifecycleOperation<'_>,
        orderer: &mut dyn BroadcastStream,
        cancel: &CancellationToken,
    ) -> Result<SubmittedTransaction, LifecycleError> {
        let proposal = build_lifecycle_proposal(&operation, self.signer.as_ref())?;
        let tx_id = proposal.tx_id.clone();
        let mut phase = CommitPhase::Built;
        info!(%tx_id, function = proposal.function, channel = %proposal.channel_id, %phase, "Proposal built");

        advance(&mut phase, CommitPhase::Endorsing, &tx_id);
        let endorsements =
            collect_endorsements(&proposal, &self.endorsers, &self.collector, cancel).await?;
        advance(&mut phase, CommitPhase::Endorsed, &tx_id);

        let envelope = assemble_envelope(&proposal, &endorsements, self.signer.as_ref())?;
        advance(&mut phase, CommitPhase::Assembled, &tx_id);

        let ack = match submit(&envelope, orderer, &self.broadcast, cancel).await {
            Ok(ack) => ack,
            Err(error) => {
                warn!(%tx_id, phase = %error.phase(), "Transaction not submitted: {}", error);
                return Err(error);
            }
        };
        advance(&mut phase, CommitPhase::Submitted, &tx_id);

        Ok(SubmittedTransaction {
            tx_id,
            endorsements: endorsements.len(),
            ack,
        })
    }

    /// Asks the peers which organizations approved `definition`.
    ///
    /// Every peer must answer with the same approvals.
    pub async fn check_commit_readiness(
        &self,
        definition: &ChaincodeDefinition,
        cancel: &CancellationToken,
    ) -> Result<HashMap<String, bool>, LifecycleError> {
        let endorsements = self
            .evaluate(LifecycleOperation::CheckCommitReadiness(definition), cancel)
            .await?;
        let mut answers = endorsements.iter();
        let first = answers.next().ok_or(EndorsementError::NoEndorsers)?;
        let approvals = decode_result::<CheckCommitReadinessResult>(first, "commit readiness")?.approvals;
        for other in answers {
            let reported = decode_result::<CheckCommitReadinessResult>(other, "commit readiness")?.approvals;
            if reported != approvals {
                warn!(first = %first.endpoint, other = %other.endpoint, "Peers disagree on commit readiness");
                return Err(AssemblyError::PayloadMismatch {
                    first: first.endpoint.clone(),
                    other: other.endpoint.clone(),
                }
                .into());
            }
        }
        Ok(approvals)
    }

    /// Lists the chaincode packages installed on each peer.
    pub async fn query_installed(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<PeerResult<Vec<InstalledChaincode>>>, LifecycleError> {
        let endorsements = self
            .evaluate(LifecycleOperation::QueryInstalled, cancel)
            .await?;
        endorsements
            .iter()
            .map(|endorsed| -> Result<_, LifecycleError> {
                let result: QueryInstalledChaincodesResult =
                    decode_result(endorsed, "installed chaincodes")?;
                Ok(PeerResult {
                    endpoint: endorsed.endpoint.clone(),
                    result: result.installed_chaincodes,
                })
            })
            .collect()
    }

    /// Installs a chaincode package on every peer.
    pub async fn install(
        &self,
        package: &[u8],
        cancel: &CancellationToken,
    ) -> Result<Vec<PeerResult<InstallChaincodeResult>>, LifecycleError> {
        let endorsements = self
            .evaluate(LifecycleOperation::Install { package }, cancel)
            .await?;
        endorsements
            .iter()
            .map(|endorsed| -> Result<_, LifecycleError> {
                Ok(PeerResult {
                    endpoint: endorsed.endpoint.clone(),
                    result: decode_result::<InstallChaincodeResult>(endorsed, "install result")?,
                })
            })
            .collect()
    }

    /// Runs a proposal on the peers without ordering the result.
    async fn evaluate(
        &self,
        operation: LifecycleOperation<'_>,
        cancel: &CancellationToken,
    ) -> Result<EndorsementSet, LifecycleError> {
        let proposal = build_lifecycle_proposal(&operation, self.signer.as_ref())?;
        let endorsements =
            collect_endorsements(&proposal, &self.endorsers, &self.collector, cancel).await?;
        debug!(tx_id = %proposal.tx_id, function = proposal.function, "Evaluated proposal");
        Ok(endorsements)
    }
}

fn advance(phase: &mut CommitPhase, next: CommitPhase, tx_id: &TransactionId) {
    debug_assert!(next > *phase, "commit phase moved backwards: {phase} -> {next}");
    debug!(%tx_id, from = %phase, to = %next, "Commit phase transition");
    *phase = next;
}

fn decode_result<T: Message + Default>(
    endorsed: &Endorsed,
    what: &'static str,
) -> Result<T, LifecycleError> {
    T::decode(endorsed.response.payload.as_slice()).map_err(|e| LifecycleError::Decode {
        what,
        endpoint: endorsed.endpoint.clone(),
        cause: e.to_string(),
    })
}
