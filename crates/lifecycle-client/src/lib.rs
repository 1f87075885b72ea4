pub mod assembly;
pub mod broadcast;
pub mod client;
pub mod config;
pub mod endorsement;
pub mod metrics;
pub mod proposal;

pub use assembly::{assemble_envelope, check_consistent_payloads};
pub use broadcast::{submit, BroadcastConfig};
pub use client::{LifecycleClient, PeerResult, SubmittedTransaction};
pub use config::{ClientProfile, ConfigError};
pub use endorsement::{collect_endorsements, CollectorConfig, EndorsementQuorum};
pub use proposal::build_lifecycle_proposal;
