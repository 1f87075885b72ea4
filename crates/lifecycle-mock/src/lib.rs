//! In-process peers and ordering service that speak the lifecycle wire format.
//! They back the client tests and let the admin tool run without a network.

pub mod orderer;
pub mod peer;

pub use orderer::{MockOrderer, OrdererBehavior};
pub use peer::{MockPeer, PeerBehavior};

use lifecycle_common::SigningIdentity;

/// Generates a fresh P-256 key and self-signed certificate for `msp_id`.
///
/// Panics if key generation fails; only meant for tests and demos.
pub fn generate_identity(msp_id: &str) -> SigningIdentity {
    let key_pair = rcgen::KeyPair::generate_for(&rcgen::PKCS_ECDSA_P256_SHA256)
        .expect("P-256 key generation");
    let mut params = rcgen::CertificateParams::new(vec![format!("peer.{}", msp_id.to_lowercase())])
        .expect("certificate parameters");
    params
        .distinguished_name
        .push(rcgen::DnType::OrganizationName, msp_id);
    let cert = params.self_signed(&key_pair).expect("self-signed certificate");
    SigningIdentity::new(
        msp_id,
        cert.pem().as_bytes(),
        key_pair.serialize_pem().as_bytes(),
        None,
    )
    .expect("generated identity is consistent")
}
