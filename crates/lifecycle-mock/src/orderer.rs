use async_trait::async_trait;
use lifecycle_common::protos::common::{Envelope, Status};
use lifecycle_common::protos::orderer::BroadcastResponse;
use lifecycle_common::{BroadcastStream, TransportError};
use std::collections::VecDeque;
use tracing::debug;

/// How a [`MockOrderer`] reacts to broadcast envelopes.
#[derive(Debug, Clone)]
pub enum OrdererBehavior {
    Accept,
    /// Acknowledge with this status.
    Respond(Status),
    /// Fail every send at the transport level.
    SendFails(String),
    /// Accept the envelope, then close the stream without answering.
    Close,
    /// Accept the envelope and never answer.
    Hang,
    /// Never complete the send.
    Stall,
    /// Accept the envelope, then fail the receive at the transport level.
    RecvFails(String),
}

/// One open broadcast stream to an in-process ordering service.
pub struct MockOrderer {
    endpoint: String,
    behavior: OrdererBehavior,
    envelopes: Vec<Envelope>,
    sends: usize,
    pending: VecDeque<BroadcastResponse>,
}

impl MockOrderer {
    pub fn new(endpoint: impl Into<String>, behavior: OrdererBehavior) -> Self {
        MockOrderer {
            endpoint: endpoint.into(),
            behavior,
            envelopes: Vec::new(),
            sends: 0,
            pending: VecDeque::new(),
        }
    }

    /// Envelopes the orderer received, in order.
    pub fn envelopes(&self) -> &[Envelope] {
        &self.envelopes
    }

    /// Number of send attempts, failed ones included.
    pub fn sends(&self) -> usize {
        self.sends
    }
}

#[async_trait]
impl BroadcastStream for MockOrderer {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send(&mut self, envelope: &Envelope) -> Result<(), TransportError> {
        self.sends += 1;
        match &self.behavior {
            OrdererBehavior::SendFails(cause) => return Err(TransportError(cause.clone())),
            OrdererBehavior::Stall => std::future::pending::<()>().await,
            _ => {}
        }
        debug!(orderer = %self.endpoint, "Received envelope");
        self.envelopes.push(envelope.clone());
        let status = match &self.behavior {
            OrdererBehavior::Accept => Status::Success,
            OrdererBehavior::Respond(status) => *status,
            _ => return Ok(()),
        };
        self.pending.push_back(BroadcastResponse {
            status: status as i32,
            info: String::new(),
        });
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<BroadcastResponse>, TransportError> {
        match &self.behavior {
            OrdererBehavior::Hang => std::future::pending::<()>().await,
            OrdererBehavior::RecvFails(cause) => return Err(TransportError(cause.clone())),
            _ => {}
        }
        Ok(self.pending.pop_front())
    }
}
