use crate::metrics::{TRANSACTIONS_REJECTED, TRANSACTIONS_SUBMITTED};
use lifecycle_common::protos::common::{Envelope, Status};
use lifecycle_common::{BroadcastAck, BroadcastError, BroadcastStream, CommitPhase, LifecycleError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct BroadcastConfig {
    /// Deadline for sending the envelope and receiving its acknowledgement.
    pub timeout: Duration,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        BroadcastConfig {
            timeout: Duration::from_secs(30),
        }
    }
}

/// Sends `envelope` on `stream` and waits for the ordering service to acknowledge it.
///
/// The envelope is sent exactly once. Any status other than success is a
/// rejection.
pub async fn submit(
    envelope: &Envelope,
    stream: &mut dyn BroadcastStream,
    config: &BroadcastConfig,
    cancel: &CancellationToken,
) -> Result<BroadcastAck, LifecycleError> {
    if cancel.is_cancelled() {
        return Err(LifecycleError::Cancelled {
            phase: CommitPhase::Assembled,
        });
    }
    let endpoint = stream.endpoint().to_string();
    let sent = AtomicBool::new(false);

    let exchange = async {
        stream
            .send(envelope)
            .await
            .map_err(|cause| BroadcastError::Transport {
                endpoint: endpoint.clone(),
                cause,
                sent: false,
            })?;
        sent.store(true, Ordering::SeqCst);
        stream
            .recv()
            .await
            .map_err(|cause| BroadcastError::Transport {
                endpoint: endpoint.clone(),
                cause,
                sent: true,
            })?
            .ok_or_else(|| BroadcastError::StreamClosed {
                endpoint: endpoint.clone(),
            })
    };

    let response = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            let phase = if sent.load(Ordering::SeqCst) {
                CommitPhase::Submitted
            } else {
                CommitPhase::Assembled
            };
            warn!(orderer = %endpoint, %phase, "Broadcast cancelled before acknowledgement");
            return Err(LifecycleError::Cancelled { phase });
        }
        outcome = tokio::time::timeout(config.timeout, exchange) => match outcome {
            Ok(response) => response?,
            Err(_) => {
                return Err(BroadcastError::Timeout {
                    endpoint,
                    timeout_ms: config.timeout.as_millis() as u64,
                    sent: sent.load(Ordering::SeqCst),
                }
                .into())
            }
        },
    };

    match Status::try_from(response.status) {
        Ok(Status::Success) => {
            TRANSACTIONS_SUBMITTED.inc();
            info!(orderer = %endpoint, "Envelope accepted");
            Ok(BroadcastAck {
                status: Status::Success,
                info: response.info,
            })
        }
        _ => {
            TRANSACTIONS_REJECTED.inc();
            warn!(orderer = %endpoint, status = response.status, "Envelope rejected: {}", response.info);
            Err(BroadcastError::Rejected {
                endpoint,
                status: response.status,
                info: response.info,
            }
            .into())
        }
    }
}
