use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, Registry, TextEncoder};
use std::sync::Once;

lazy_static! {
    static ref REGISTRY: Registry = Registry::new();
    pub static ref PROPOSALS_BUILT: IntCounter = IntCounter::new(
        "lifecycle_proposals_built_total",
        "Total lifecycle proposals built and signed"
    )
    .unwrap();
    pub static ref ENDORSEMENT_FAILURES: IntCounter = IntCounter::new(
        "lifecycle_endorsement_failures_total",
        "Total peer endorsement calls that failed"
    )
    .unwrap();
    pub static ref TRANSACTIONS_SUBMITTED: IntCounter = IntCounter::new(
        "lifecycle_transactions_submitted_total",
        "Total transactions acknowledged by the ordering service"
    )
    .unwrap();
    pub static ref TRANSACTIONS_REJECTED: IntCounter = IntCounter::new(
        "lifecycle_transactions_rejected_total",
        "Total transactions rejected by the ordering service"
    )
    .unwrap();
}

static INIT: Once = Once::new();

pub fn init_metrics() {
    INIT.call_once(|| {
        REGISTRY.register(Box::new(PROPOSALS_BUILT.clone())).unwrap();
        REGISTRY.register(Box::new(ENDORSEMENT_FAILURES.clone())).unwrap();
        REGISTRY.register(Box::new(TRANSACTIONS_SUBMITTED.clone())).unwrap();
        REGISTRY.register(Box::new(TRANSACTIONS_REJECTED.clone())).unwrap();
    });
}

/// Renders every lifecycle counter in the Prometheus text format.
pub fn gather() -> String {
    init_metrics();
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        tracing::warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
