use crate::errors::TransportError;
use crate::protos::common::Envelope;
use crate::protos::orderer::BroadcastResponse;
use crate::protos::peer::{ProposalResponse, SignedProposal};
use async_trait::async_trait;

/// A peer endorsement endpoint.
#[async_trait]
pub trait Endorser: Send + Sync {
    /// Address used to identify the peer in logs and errors.
    fn endpoint(&self) -> &str;

    async fn process_proposal(
        &self,
        proposal: &SignedProposal,
    ) -> Result<ProposalResponse, TransportError>;
}

/// An open broadcast stream to the ordering service.
#[async_trait]
pub trait BroadcastStream: Send {
    fn endpoint(&self) -> &str;

    async fn send(&mut self, envelope: &Envelope) -> Result<(), TransportError>;

    /// Next acknowledgement, `None` once the orderer closed the stream.
    async fn recv(&mut self) -> Result<Option<BroadcastResponse>, TransportError>;
}
