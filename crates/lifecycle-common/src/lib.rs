pub mod crypto;
pub mod errors;
pub mod keys;
pub mod network;
pub mod package;
pub mod protos;
pub mod types;

pub use crypto::{compute_tx_id, create_nonce, decode_identity, Signer, SigningIdentity};
pub use errors::*;
pub use keys::{load_certificate, load_private_key, Certificate, PrivateKey};
pub use network::{BroadcastStream, Endorser};
pub use package::{ChaincodePackage, PackageMetadata, CODE_PACKAGE_FILE, METADATA_FILE};
pub use types::*;
