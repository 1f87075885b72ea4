use crate::errors::{EndorsementError, ValidationError};
use crate::protos::{common, peer};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of the system chaincode governing the chaincode lifecycle.
pub const LIFECYCLE_CHAINCODE_NAME: &str = "_lifecycle";

pub const INSTALL_FUNCTION: &str = "InstallChaincode";
pub const APPROVE_FUNCTION: &str = "ApproveChaincodeDefinitionForMyOrg";
pub const CHECK_COMMIT_READINESS_FUNCTION: &str = "CheckCommitReadiness";
pub const QUERY_INSTALLED_FUNCTION: &str = "QueryInstalledChaincodes";
pub const COMMIT_FUNCTION: &str = "CommitChaincodeDefinition";

/// Status code a peer returns for a successfully simulated proposal.
pub const ENDORSEMENT_SUCCESS: i32 = 200;

/// Describes the chaincode definition that is approved, checked or committed on a channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChaincodeDefinition {
    pub channel_id: String,
    /// Transaction id to reuse; a fresh one is derived from the nonce when empty.
    #[serde(default)]
    pub input_tx_id: Option<String>,
    #[serde(default)]
    pub package_id: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub endorsement_plugin: String,
    /// Serialized application policy. Used as validation parameter when that one is empty.
    #[serde(default, with = "hex::serde")]
    pub endorsement_policy: Vec<u8>,
    #[serde(default)]
    pub validation_plugin: String,
    pub sequence: i64,
    #[serde(default, with = "hex::serde")]
    pub validation_parameter_bytes: Vec<u8>,
    #[serde(default)]
    pub init_required: bool,
    #[serde(skip)]
    pub collection_config: Option<common::CollectionConfigPackage>,
}

impl ChaincodeDefinition {
    pub fn new(
        channel_id: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
        sequence: i64,
    ) -> Result<Self, ValidationError> {
        let definition = ChaincodeDefinition {
            channel_id: channel_id.into(),
            name: name.into(),
            version: version.into(),
            sequence,
            ..Default::default()
        };
        definition.validate()?;
        Ok(definition)
    }

    pub fn with_package_id(mut self, package_id: impl Into<String>) -> Self {
        self.package_id = package_id.into();
        self
    }

    pub fn with_init_required(mut self, init_required: bool) -> Self {
        self.init_required = init_required;
        self
    }

    pub fn with_collection_config(mut self, collections: common::CollectionConfigPackage) -> Self {
        self.collection_config = Some(collections);
        self
    }

    /// Checks the fields every lifecycle operation on a channel depends on.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.channel_id.is_empty() {
            return Err(ValidationError::EmptyChannelId);
        }
        if self.name.is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if self.version.is_empty() {
            return Err(ValidationError::EmptyVersion);
        }
        if self.sequence <= 0 {
            return Err(ValidationError::InvalidSequence(self.sequence));
        }
        Ok(())
    }

    /// The validation parameter committed with the definition.
    pub fn validation_parameter(&self) -> &[u8] {
        if self.validation_parameter_bytes.is_empty() {
            &self.endorsement_policy
        } else {
            &self.validation_parameter_bytes
        }
    }
}

/// The lifecycle functions a proposal can invoke. Each variant carries the
/// arguments that function is built from.
#[derive(Debug, Clone, Copy)]
pub enum LifecycleOperation<'a> {
    Install { package: &'a [u8] },
    ApproveForMyOrg(&'a ChaincodeDefinition),
    CheckCommitReadiness(&'a ChaincodeDefinition),
    QueryInstalled,
    Commit(&'a ChaincodeDefinition),
}

impl<'a> LifecycleOperation<'a> {
    pub fn function_name(&self) -> &'static str {
        match self {
            LifecycleOperation::Install { .. } => INSTALL_FUNCTION,
            LifecycleOperation::ApproveForMyOrg(_) => APPROVE_FUNCTION,
            LifecycleOperation::CheckCommitReadiness(_) => CHECK_COMMIT_READINESS_FUNCTION,
            LifecycleOperation::QueryInstalled => QUERY_INSTALLED_FUNCTION,
            LifecycleOperation::Commit(_) => COMMIT_FUNCTION,
        }
    }

    pub fn definition(&self) -> Option<&'a ChaincodeDefinition> {
        match self {
            LifecycleOperation::ApproveForMyOrg(definition)
            | LifecycleOperation::CheckCommitReadiness(definition)
            | LifecycleOperation::Commit(definition) => Some(definition),
            LifecycleOperation::Install { .. } | LifecycleOperation::QueryInstalled => None,
        }
    }

    /// Channel the proposal is addressed to. Install and query are peer-local.
    pub fn channel_id(&self) -> &'a str {
        self.definition().map_or("", |d| d.channel_id.as_str())
    }

    /// Whether the endorsed result has to be ordered into the channel ledger.
    pub fn requires_ordering(&self) -> bool {
        matches!(
            self,
            LifecycleOperation::ApproveForMyOrg(_) | LifecycleOperation::Commit(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransactionId(String);

impl TransactionId {
    pub fn new(id: impl Into<String>) -> Self {
        TransactionId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// States of a single commit attempt. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CommitPhase {
    Built,
    Endorsing,
    Endorsed,
    Assembled,
    Submitted,
    Committed,
    Rejected,
}

impl fmt::Display for CommitPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommitPhase::Built => "build",
            CommitPhase::Endorsing => "endorsing",
            CommitPhase::Endorsed => "endorsed",
            CommitPhase::Assembled => "assembled",
            CommitPhase::Submitted => "submitted",
            CommitPhase::Committed => "committed",
            CommitPhase::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

/// A signed lifecycle proposal together with the unsigned message it was built from.
#[derive(Debug, Clone)]
pub struct LifecycleProposal {
    pub tx_id: TransactionId,
    pub channel_id: String,
    pub function: &'static str,
    pub proposal: peer::Proposal,
    pub signed: peer::SignedProposal,
}

/// One successful peer endorsement.
#[derive(Debug, Clone, PartialEq)]
pub struct Endorsed {
    pub endpoint: String,
    pub response: peer::Response,
    pub payload: Vec<u8>,
    pub endorsement: peer::Endorsement,
}

#[derive(Debug)]
pub struct PeerFailure {
    pub endpoint: String,
    pub error: EndorsementError,
}

/// Endorsements gathered for one proposal, plus the peers that failed when the
/// quorum tolerated failures.
#[derive(Debug, Default)]
pub struct EndorsementSet {
    pub endorsements: Vec<Endorsed>,
    pub failures: Vec<PeerFailure>,
}

impl EndorsementSet {
    pub fn len(&self) -> usize {
        self.endorsements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endorsements.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Endorsed> {
        self.endorsements.iter()
    }
}

/// Acknowledgement of an envelope accepted by the ordering service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastAck {
    pub status: common::Status,
    pub info: String,
}
