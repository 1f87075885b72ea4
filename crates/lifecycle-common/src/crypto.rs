use crate::errors::{IdentityError, SignError, SignatureError};
use crate::keys::{load_certificate, load_private_key, Certificate, PrivateKey};
use crate::protos::msp::SerializedIdentity;
use crate::types::TransactionId;
use p256::ecdsa::signature::Signer as _;
use p256::ecdsa::{Signature, VerifyingKey};
use prost::Message;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Size of the random nonce placed in every signature header.
pub const NONCE_SIZE: usize = 24;

/// Anything able to sign lifecycle messages on behalf of an organization.
///
/// Implementations must be usable concurrently: signing never mutates state.
pub trait Signer: Send + Sync {
    fn msp_id(&self) -> &str;

    /// Serialized identity placed as the creator of every proposal and transaction.
    fn creator(&self) -> &[u8];

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, SignError>;
}

/// An organization-scoped signing identity built from PEM trust material.
#[derive(Debug)]
pub struct SigningIdentity {
    msp_id: String,
    certificate: Certificate,
    private_key: PrivateKey,
    creator: Vec<u8>,
}

impl SigningIdentity {
    pub fn new(
        msp_id: impl Into<String>,
        cert_pem: &[u8],
        key_pem: &[u8],
        password: Option<&[u8]>,
    ) -> Result<Self, IdentityError> {
        let msp_id = msp_id.into();
        let private_key = load_private_key(key_pem, password)?;
        let (certificate, cert_bytes) = load_certificate(cert_pem)?;

        let verifying_key = private_key
            .verifying_key()
            .ok_or(IdentityError::NotEcdsa(private_key.kind()))?;
        match certificate.public_key() {
            Some(public_key) if *public_key == verifying_key => {}
            Some(_) => return Err(IdentityError::KeyMismatch),
            None => {
                return Err(IdentityError::Cert(
                    crate::errors::CertFormatError::UnsupportedPublicKey(
                        certificate.subject().to_string(),
                    ),
                ))
            }
        }

        let creator = SerializedIdentity {
            mspid: msp_id.clone(),
            id_bytes: cert_bytes,
        }
        .encode_to_vec();

        Ok(SigningIdentity {
            msp_id,
            certificate,
            private_key,
            creator,
        })
    }

    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    pub fn verifying_key(&self) -> Option<VerifyingKey> {
        self.private_key.verifying_key()
    }

    /// Verifies a signature produced by this identity.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<(), SignatureError> {
        self.certificate.verify(message, signature)
    }
}

impl Signer for SigningIdentity {
    fn msp_id(&self) -> &str {
        &self.msp_id
    }

    fn creator(&self) -> &[u8] {
        &self.creator
    }

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, SignError> {
        sign_with(&self.private_key, message)
    }
}

/// Signs `message` with SHA-256/ECDSA. The signature is DER encoded with a low S value,
/// which is what peer and orderer validators accept.
pub fn sign_with(private_key: &PrivateKey, message: &[u8]) -> Result<Vec<u8>, SignError> {
    let key = match private_key {
        PrivateKey::Ecdsa(key) => key,
        PrivateKey::Rsa { .. } => return Err(SignError::UnsupportedKey(private_key.kind())),
    };
    let signature: Signature = key
        .try_sign(message)
        .map_err(|e| SignError::Backend(e.to_string()))?;
    let signature = signature.normalize_s().unwrap_or(signature);
    Ok(signature.to_der().as_bytes().to_vec())
}

pub fn create_nonce() -> Vec<u8> {
    let mut nonce = vec![0u8; NONCE_SIZE];
    rand::rng().fill_bytes(&mut nonce);
    nonce
}

/// Transaction ids are the hex encoded SHA-256 of nonce followed by creator.
pub fn compute_tx_id(nonce: &[u8], creator: &[u8]) -> TransactionId {
    let mut hasher = Sha256::new();
    hasher.update(nonce);
    hasher.update(creator);
    TransactionId::new(hex::encode(hasher.finalize()))
}

/// Decodes the creator/endorser bytes found in headers and endorsements.
pub fn decode_identity(bytes: &[u8]) -> Result<(SerializedIdentity, Certificate), IdentityError> {
    let identity = SerializedIdentity::decode(bytes)
        .map_err(|e| IdentityError::Encoding(e.to_string()))?;
    let (certificate, _) = load_certificate(&identity.id_bytes)?;
    Ok((identity, certificate))
}
