use crate::errors::{CertFormatError, KeyFormatError, SignatureError};
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, KeyIvInit};
use md5::{Digest, Md5};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::ecdsa::signature::Verifier;
use p256::pkcs8::DecodePrivateKey;
use pkcs8::ObjectIdentifier;
use std::fmt;
use tracing::debug;

/// id-ecPublicKey, the only algorithm accepted inside a PKCS#8 wrapping.
const EC_PUBLIC_KEY_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");

const ENCRYPTED_PKCS8_TAG: &str = "ENCRYPTED PRIVATE KEY";
const CERTIFICATE_TAG: &str = "CERTIFICATE";

/// A decoded private key.
pub enum PrivateKey {
    Ecdsa(SigningKey),
    /// PKCS#1 key. Recognised so callers get a precise error, never used to sign.
    Rsa { modulus_bits: usize },
}

impl PrivateKey {
    pub fn kind(&self) -> &'static str {
        match self {
            PrivateKey::Ecdsa(_) => "ECDSA P-256",
            PrivateKey::Rsa { .. } => "RSA",
        }
    }

    pub fn verifying_key(&self) -> Option<VerifyingKey> {
        match self {
            PrivateKey::Ecdsa(key) => Some(*key.verifying_key()),
            PrivateKey::Rsa { .. } => None,
        }
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrivateKey::Ecdsa(_) => f.write_str("PrivateKey::Ecdsa(..)"),
            PrivateKey::Rsa { modulus_bits } => write!(f, "PrivateKey::Rsa({modulus_bits} bits)"),
        }
    }
}

/// A parsed X.509 certificate. Only the parts the client needs are kept.
#[derive(Debug, Clone)]
pub struct Certificate {
    der: Vec<u8>,
    subject: String,
    issuer: String,
    public_key: Option<VerifyingKey>,
}

impl Certificate {
    pub fn from_der(der: &[u8]) -> Result<Self, CertFormatError> {
        let (_, cert) = x509_parser::parse_x509_certificate(der)
            .map_err(|e| CertFormatError::InvalidDer(e.to_string()))?;
        let public_key =
            VerifyingKey::from_sec1_bytes(&cert.public_key().subject_public_key.data[..]).ok();
        Ok(Certificate {
            der: der.to_vec(),
            subject: cert.subject().to_string(),
            issuer: cert.issuer().to_string(),
            public_key,
        })
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// The P-256 public key, if the certificate carries one.
    pub fn public_key(&self) -> Option<&VerifyingKey> {
        self.public_key.as_ref()
    }

    /// Verifies a DER-encoded ECDSA signature made by the certificate's key.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<(), SignatureError> {
        let public_key = self.public_key.as_ref().ok_or(SignatureError::NoPublicKey)?;
        verify_signature(public_key, message, signature)
    }
}

pub fn verify_signature(
    public_key: &VerifyingKey,
    message: &[u8],
    signature: &[u8],
) -> Result<(), SignatureError> {
    let signature =
        Signature::from_der(signature).map_err(|e| SignatureError::Malformed(e.to_string()))?;
    public_key
        .verify(message, &signature)
        .map_err(|_| SignatureError::Invalid)
}

/// Decodes a PEM private key, decrypting it first when the block is encrypted.
pub fn load_private_key(raw: &[u8], password: Option<&[u8]>) -> Result<PrivateKey, KeyFormatError> {
    if raw.is_empty() {
        return Err(KeyFormatError::Empty);
    }
    let block = pem::parse(raw).map_err(|e| KeyFormatError::MalformedPem(e.to_string()))?;

    if block.tag() == ENCRYPTED_PKCS8_TAG {
        let password = require_password(password)?;
        let info = pkcs8::EncryptedPrivateKeyInfo::try_from(block.contents())
            .map_err(|e| KeyFormatError::Decryption(e.to_string()))?;
        let document = info
            .decrypt(password)
            .map_err(|e| KeyFormatError::Decryption(e.to_string()))?;
        return der_to_private_key(document.as_bytes());
    }

    if let Some(dek_info) = block.headers().get("DEK-Info") {
        let password = require_password(password)?;
        let der = decrypt_legacy_block(dek_info, block.contents(), password)?;
        return der_to_private_key(&der);
    }

    der_to_private_key(block.contents())
}

fn require_password(password: Option<&[u8]>) -> Result<&[u8], KeyFormatError> {
    match password {
        Some(password) if !password.is_empty() => Ok(password),
        _ => Err(KeyFormatError::PasswordRequired),
    }
}

/// Tries PKCS#1, PKCS#8 and SEC1 in that order; the first encoding that parses wins.
pub fn der_to_private_key(der: &[u8]) -> Result<PrivateKey, KeyFormatError> {
    if let Ok(rsa) = pkcs1::RsaPrivateKey::try_from(der) {
        debug!("Decoded PKCS#1 private key");
        return Ok(PrivateKey::Rsa {
            modulus_bits: rsa.modulus.as_bytes().len() * 8,
        });
    }

    if let Ok(info) = pkcs8::PrivateKeyInfo::try_from(der) {
        if info.algorithm.oid != EC_PUBLIC_KEY_OID {
            return Err(KeyFormatError::UnsupportedKeyType);
        }
        let secret = p256::SecretKey::from_pkcs8_der(der)
            .map_err(|e| KeyFormatError::UnsupportedCurve(e.to_string()))?;
        debug!("Decoded PKCS#8 EC private key");
        return Ok(PrivateKey::Ecdsa(SigningKey::from(secret)));
    }

    if let Ok(secret) = p256::SecretKey::from_sec1_der(der) {
        debug!("Decoded SEC1 EC private key");
        return Ok(PrivateKey::Ecdsa(SigningKey::from(secret)));
    }

    Err(KeyFormatError::InvalidDer)
}

/// Decodes a single PEM certificate. The raw input is returned alongside the
/// parsed certificate; it is what identifies the signer on the wire.
pub fn load_certificate(raw: &[u8]) -> Result<(Certificate, Vec<u8>), CertFormatError> {
    let block = pem::parse(raw).map_err(|e| CertFormatError::MalformedPem(e.to_string()))?;
    if block.tag() != CERTIFICATE_TAG {
        return Err(CertFormatError::MalformedPem(format!(
            "expected a {CERTIFICATE_TAG} block, found {}",
            block.tag()
        )));
    }
    let certificate = Certificate::from_der(block.contents())?;
    Ok((certificate, raw.to_vec()))
}

/// Decrypts a block carrying OpenSSL `Proc-Type`/`DEK-Info` headers.
fn decrypt_legacy_block(
    dek_info: &str,
    data: &[u8],
    password: &[u8],
) -> Result<Vec<u8>, KeyFormatError> {
    let (cipher, iv_hex) = dek_info
        .split_once(',')
        .ok_or_else(|| KeyFormatError::Decryption("malformed DEK-Info header".to_string()))?;
    let iv = hex::decode(iv_hex.trim())
        .map_err(|e| KeyFormatError::Decryption(format!("malformed DEK-Info IV: {e}")))?;

    let (key_size, block_size) = match cipher.trim() {
        "DES-CBC" => (8, 8),
        "DES-EDE3-CBC" => (24, 8),
        "AES-128-CBC" => (16, 16),
        "AES-192-CBC" => (24, 16),
        "AES-256-CBC" => (32, 16),
        other => return Err(KeyFormatError::UnsupportedEncryption(other.to_string())),
    };
    if iv.len() != block_size {
        return Err(KeyFormatError::Decryption(format!(
            "IV must be {block_size} bytes, got {}",
            iv.len()
        )));
    }
    if data.is_empty() || data.len() % block_size != 0 {
        return Err(KeyFormatError::Decryption(
            "encrypted data is not a multiple of the block size".to_string(),
        ));
    }

    // The first 8 bytes of the IV double as the key derivation salt.
    let key = derive_legacy_key(password, &iv[..8], key_size);
    let decrypted = match cipher.trim() {
        "DES-CBC" => cbc_decrypt::<des::Des>(&key, &iv, data),
        "DES-EDE3-CBC" => cbc_decrypt::<des::TdesEde3>(&key, &iv, data),
        "AES-128-CBC" => cbc_decrypt::<aes::Aes128>(&key, &iv, data),
        "AES-192-CBC" => cbc_decrypt::<aes::Aes192>(&key, &iv, data),
        _ => cbc_decrypt::<aes::Aes256>(&key, &iv, data),
    };
    decrypted.ok_or_else(|| KeyFormatError::Decryption("decryption password incorrect".to_string()))
}

fn cbc_decrypt<C>(key: &[u8], iv: &[u8], data: &[u8]) -> Option<Vec<u8>>
where
    C: BlockDecryptMut + cbc::cipher::BlockCipher + cbc::cipher::KeyInit,
{
    cbc::Decryptor::<C>::new_from_slices(key, iv)
        .ok()?
        .decrypt_padded_vec_mut::<Pkcs7>(data)
        .ok()
}

/// OpenSSL's EVP_BytesToKey with MD5 and a single iteration.
fn derive_legacy_key(password: &[u8], salt: &[u8], key_size: usize) -> Vec<u8> {
    let mut key = Vec::with_capacity(key_size + 16);
    let mut digest: Vec<u8> = Vec::new();
    while key.len() < key_size {
        let mut hasher = Md5::new();
        hasher.update(&digest);
        hasher.update(password);
        hasher.update(salt);
        digest = hasher.finalize().to_vec();
        key.extend_from_slice(&digest);
    }
    key.truncate(key_size);
    key
}
