use lifecycle_common::protos::common::{Envelope, Payload};
use lifecycle_common::protos::peer::{
    ChaincodeActionPayload, ChaincodeEndorsedAction, ChaincodeProposalPayload, Transaction,
    TransactionAction,
};
use lifecycle_common::{AssemblyError, Endorsed, EndorsementSet, LifecycleProposal, Signer};
use prost::Message;
use tracing::debug;

/// Ensures every peer endorsed byte-identical response payloads.
pub fn check_consistent_payloads(endorsements: &[Endorsed]) -> Result<(), AssemblyError> {
    let (first, rest) = endorsements.split_first().ok_or(AssemblyError::Empty)?;
    match rest.iter().find(|other| other.payload != first.payload) {
        Some(other) => Err(AssemblyError::PayloadMismatch {
            first: first.endpoint.clone(),
            other: other.endpoint.clone(),
        }),
        None => Ok(()),
    }
}

/// Combines the proposal and its endorsements into a signed transaction envelope.
///
/// The signer must be the creator recorded in the proposal header. The
/// transient map never leaves the proposal: the payload embedded in the
/// transaction carries only the chaincode input.
pub fn assemble_envelope(
    proposal: &LifecycleProposal,
    endorsements: &EndorsementSet,
    signer: &dyn Signer,
) -> Result<Envelope, AssemblyError> {
    check_consistent_payloads(&endorsements.endorsements)?;

    let decode_error = |what: &str, e: prost::DecodeError| AssemblyError::Decode(format!("{what}: {e}"));
    let header = proposal
        .proposal
        .decode_header()
        .map_err(|e| decode_error("header", e))?;
    let signature_header = header
        .decode_signature_header()
        .map_err(|e| decode_error("signature header", e))?;
    if signature_header.creator != signer.creator() {
        return Err(AssemblyError::CreatorMismatch);
    }
    let proposal_payload = proposal
        .proposal
        .decode_payload()
        .map_err(|e| decode_error("payload", e))?;

    let endorsed_action = ChaincodeEndorsedAction {
        proposal_response_payload: endorsements.endorsements[0].payload.clone(),
        endorsements: endorsements
            .iter()
            .map(|endorsed| endorsed.endorsement.clone())
            .collect(),
    };
    let action_payload = ChaincodeActionPayload {
        chaincode_proposal_payload: ChaincodeProposalPayload {
            input: proposal_payload.input,
            transient_map: Default::default(),
        }
        .encode_to_vec(),
        action: Some(endorsed_action),
    };
    let transaction = Transaction {
        actions: vec![TransactionAction {
            header: header.signature_header.clone(),
            payload: action_payload.encode_to_vec(),
        }],
    };

    let payload = Payload {
        header: Some(header),
        data: transaction.encode_to_vec(),
    }
    .encode_to_vec();
    let signature = signer.sign(&payload)?;
    debug!(
        tx_id = %proposal.tx_id,
        endorsements = endorsements.len(),
        "Assembled transaction envelope"
    );
    Ok(Envelope { payload, signature })
}
