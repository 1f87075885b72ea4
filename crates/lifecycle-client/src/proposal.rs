use crate::metrics::PROPOSALS_BUILT;
use lifecycle_common::protos::{common, lifecycle, peer};
use lifecycle_common::{
    compute_tx_id, create_nonce, ChaincodeDefinition, CommitPhase, LifecycleError,
    LifecycleOperation, LifecycleProposal, Signer, TransactionId, ValidationError,
    LIFECYCLE_CHAINCODE_NAME,
};
use prost::Message;
use std::time::SystemTime;
use tracing::debug;

/// Builds and signs the proposal invoking `operation` on the lifecycle chaincode.
///
/// Definitions are validated before anything is encoded or signed, so an
/// invalid request never reaches the signer.
pub fn build_lifecycle_proposal(
    operation: &LifecycleOperation<'_>,
    signer: &dyn Signer,
) -> Result<LifecycleProposal, LifecycleError> {
    validate(operation)?;

    let function = operation.function_name();
    let args = encode_args(operation);
    let invocation = peer::ChaincodeInvocationSpec {
        chaincode_spec: Some(peer::ChaincodeSpec {
            r#type: peer::ChaincodeType::Golang as i32,
            chaincode_id: Some(lifecycle_chaincode_id()),
            input: Some(peer::ChaincodeInput {
                args: vec![function.as_bytes().to_vec(), args],
                ..Default::default()
            }),
            timeout: 0,
        }),
    };

    let creator = signer.creator().to_vec();
    let nonce = create_nonce();
    let tx_id = match operation.definition().and_then(|d| d.input_tx_id.as_deref()) {
        Some(tx_id) if !tx_id.is_empty() => TransactionId::new(tx_id),
        _ => compute_tx_id(&nonce, &creator),
    };
    let channel_id = operation.channel_id().to_string();

    let channel_header = common::ChannelHeader {
        r#type: common::HeaderType::EndorserTransaction as i32,
        version: 0,
        timestamp: Some(prost_types::Timestamp::from(SystemTime::now())),
        channel_id: channel_id.clone(),
        tx_id: tx_id.as_str().to_string(),
        epoch: 0,
        extension: peer::ChaincodeHeaderExtension {
            chaincode_id: Some(lifecycle_chaincode_id()),
        }
        .encode_to_vec(),
        tls_cert_hash: Vec::new(),
    };
    let header = common::Header {
        channel_header: channel_header.encode_to_vec(),
        signature_header: common::SignatureHeader { creator, nonce }.encode_to_vec(),
    };
    let proposal = peer::Proposal {
        header: header.encode_to_vec(),
        payload: peer::ChaincodeProposalPayload {
            input: invocation.encode_to_vec(),
            transient_map: Default::default(),
        }
        .encode_to_vec(),
        extension: Vec::new(),
    };

    let proposal_bytes = proposal.encode_to_vec();
    let signature = signer
        .sign(&proposal_bytes)
        .map_err(|source| LifecycleError::Signing {
            phase: CommitPhase::Built,
            operation: "proposal",
            source,
        })?;

    PROPOSALS_BUILT.inc();
    debug!(%tx_id, function, channel = %channel_id, "Built lifecycle proposal");

    Ok(LifecycleProposal {
        tx_id,
        channel_id,
        function,
        proposal,
        signed: peer::SignedProposal {
            proposal_bytes,
            signature,
        },
    })
}

fn validate(operation: &LifecycleOperation<'_>) -> Result<(), ValidationError> {
    match operation {
        LifecycleOperation::Install { package } if package.is_empty() => {
            Err(ValidationError::EmptyPackage)
        }
        LifecycleOperation::Install { .. } | LifecycleOperation::QueryInstalled => Ok(()),
        LifecycleOperation::ApproveForMyOrg(definition)
        | LifecycleOperation::CheckCommitReadiness(definition)
        | LifecycleOperation::Commit(definition) => definition.validate(),
    }
}

fn lifecycle_chaincode_id() -> peer::ChaincodeId {
    peer::ChaincodeId {
        name: LIFECYCLE_CHAINCODE_NAME.to_string(),
        ..Default::default()
    }
}

/// Encodes the argument message the lifecycle function expects.
fn encode_args(operation: &LifecycleOperation<'_>) -> Vec<u8> {
    match operation {
        LifecycleOperation::Install { package } => lifecycle::InstallChaincodeArgs {
            chaincode_install_package: package.to_vec(),
        }
        .encode_to_vec(),
        LifecycleOperation::QueryInstalled => {
            lifecycle::QueryInstalledChaincodesArgs {}.encode_to_vec()
        }
        LifecycleOperation::ApproveForMyOrg(definition) => {
            approve_args(definition).encode_to_vec()
        }
        LifecycleOperation::CheckCommitReadiness(definition)
        | LifecycleOperation::Commit(definition) => definition_args(definition).encode_to_vec(),
    }
}

fn approve_args(definition: &ChaincodeDefinition) -> lifecycle::ApproveChaincodeDefinitionForMyOrgArgs {
    let source = if definition.package_id.is_empty() {
        lifecycle::chaincode_source::Type::Unavailable(lifecycle::chaincode_source::Unavailable {})
    } else {
        lifecycle::chaincode_source::Type::LocalPackage(lifecycle::chaincode_source::Local {
            package_id: definition.package_id.clone(),
        })
    };
    lifecycle::ApproveChaincodeDefinitionForMyOrgArgs {
        sequence: definition.sequence,
        name: definition.name.clone(),
        version: definition.version.clone(),
        endorsement_plugin: definition.endorsement_plugin.clone(),
        validation_plugin: definition.validation_plugin.clone(),
        validation_parameter: definition.validation_parameter().to_vec(),
        collections: definition.collection_config.clone(),
        init_required: definition.init_required,
        source: Some(lifecycle::ChaincodeSource { r#type: Some(source) }),
    }
}

fn definition_args(definition: &ChaincodeDefinition) -> lifecycle::ChaincodeDefinitionArgs {
    lifecycle::ChaincodeDefinitionArgs {
        sequence: definition.sequence,
        name: definition.name.clone(),
        version: definition.version.clone(),
        endorsement_plugin: definition.endorsement_plugin.clone(),
        validation_plugin: definition.validation_plugin.clone(),
        validation_parameter: definition.validation_parameter().to_vec(),
        collections: definition.collection_config.clone(),
        init_required: definition.init_required,
    }
}
