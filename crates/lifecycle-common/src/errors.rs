use crate::types::CommitPhase;

/// A chaincode definition or lifecycle request that must never reach the network.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("The required parameter 'channel_id' is empty. Rerun the command with a channel id")]
    EmptyChannelId,
    #[error("The required parameter 'name' is empty. Rerun the command with a chaincode name")]
    EmptyName,
    #[error("The required parameter 'version' is empty. Rerun the command with a chaincode version")]
    EmptyVersion,
    #[error("The sequence must be a positive integer, got {0}")]
    InvalidSequence(i64),
    #[error("The chaincode install package is empty")]
    EmptyPackage,
}

#[derive(thiserror::Error, Debug)]
pub enum KeyFormatError {
    #[error("Invalid PEM. It must be different from nil")]
    Empty,
    #[error("Failed decoding PEM: {0}")]
    MalformedPem(String),
    #[error("Encrypted key. Need a password")]
    PasswordRequired,
    #[error("Failed PEM decryption: {0}")]
    Decryption(String),
    #[error("Unsupported PEM encryption: {0}")]
    UnsupportedEncryption(String),
    #[error("Found unknown private key type in PKCS#8 wrapping")]
    UnsupportedKeyType,
    #[error("Unsupported elliptic curve: {0}")]
    UnsupportedCurve(String),
    #[error("Invalid key type. The DER must contain an ecdsa private key")]
    InvalidDer,
}

#[derive(thiserror::Error, Debug)]
pub enum CertFormatError {
    #[error("Failed decoding certificate PEM: {0}")]
    MalformedPem(String),
    #[error("Failed parsing X.509 certificate: {0}")]
    InvalidDer(String),
    #[error("Unsupported certificate public key: {0}")]
    UnsupportedPublicKey(String),
}

#[derive(thiserror::Error, Debug)]
pub enum SignError {
    #[error("Private key of type {0} cannot produce signatures")]
    UnsupportedKey(&'static str),
    #[error("Signing failed: {0}")]
    Backend(String),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Malformed signature: {0}")]
    Malformed(String),
    #[error("Signature does not verify")]
    Invalid,
    #[error("Certificate carries no P-256 public key")]
    NoPublicKey,
}

#[derive(thiserror::Error, Debug)]
pub enum IdentityError {
    #[error(transparent)]
    Key(#[from] KeyFormatError),
    #[error(transparent)]
    Cert(#[from] CertFormatError),
    #[error("Expecting ecdsa key, found {0}")]
    NotEcdsa(&'static str),
    #[error("Private key does not match the certificate public key")]
    KeyMismatch,
    #[error("Malformed serialized identity: {0}")]
    Encoding(String),
}

#[derive(thiserror::Error, Debug)]
pub enum PackageError {
    #[error("Failed reading chaincode package: {0}")]
    Archive(String),
    #[error("Chaincode package is missing {0}")]
    MissingEntry(&'static str),
    #[error("Invalid chaincode package metadata: {0}")]
    Metadata(String),
}

/// Failure of a transport call against a peer or the ordering service.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct TransportError(pub String);

impl From<&str> for TransportError {
    fn from(error: &str) -> Self {
        TransportError(error.to_string())
    }
}

impl From<String> for TransportError {
    fn from(error: String) -> Self {
        TransportError(error)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum EndorsementError {
    #[error("No endorsing peers were supplied")]
    NoEndorsers,
    #[error("Failed to send proposal to peer {endpoint}: {cause}")]
    Transport {
        endpoint: String,
        cause: TransportError,
    },
    #[error("Peer {endpoint} rejected the proposal with status {status}: {message}")]
    Rejected {
        endpoint: String,
        status: i32,
        message: String,
    },
    #[error("Peer {endpoint} returned a response without an endorsement")]
    MissingEndorsement { endpoint: String },
    #[error("Endorsement from peer {endpoint} does not verify: {reason}")]
    InvalidSignature { endpoint: String, reason: String },
    #[error("Peer {endpoint} did not respond within {timeout_ms}ms")]
    Timeout { endpoint: String, timeout_ms: u64 },
    #[error("Endorsed by {endorsed} organizations, {required} required ({failed} peers failed)")]
    QuorumNotMet {
        required: usize,
        endorsed: usize,
        failed: usize,
    },
}

impl EndorsementError {
    /// Endpoint of the peer the error originates from, if any.
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            EndorsementError::Transport { endpoint, .. }
            | EndorsementError::Rejected { endpoint, .. }
            | EndorsementError::MissingEndorsement { endpoint }
            | EndorsementError::InvalidSignature { endpoint, .. }
            | EndorsementError::Timeout { endpoint, .. } => Some(endpoint),
            EndorsementError::NoEndorsers | EndorsementError::QuorumNotMet { .. } => None,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum AssemblyError {
    #[error("At least one endorsement is required to assemble a transaction")]
    Empty,
    #[error("Response payload from {other} differs from the payload endorsed by {first}")]
    PayloadMismatch { first: String, other: String },
    #[error("Signer must be the same as the one referenced in the proposal header")]
    CreatorMismatch,
    #[error("Failed to decode proposal {0}")]
    Decode(String),
    #[error("Failed to sign transaction envelope: {0}")]
    Signing(#[from] SignError),
}

/// `sent` records whether the envelope had been handed to the orderer when the
/// failure occurred. A sent envelope may already be ordered.
#[derive(thiserror::Error, Debug)]
pub enum BroadcastError {
    #[error("Broadcast to orderer {endpoint} failed (envelope sent: {sent}): {cause}")]
    Transport {
        endpoint: String,
        cause: TransportError,
        sent: bool,
    },
    #[error("Orderer {endpoint} rejected the transaction with status {status}: {info}")]
    Rejected {
        endpoint: String,
        status: i32,
        info: String,
    },
    #[error("Orderer {endpoint} closed the stream without an acknowledgement")]
    StreamClosed { endpoint: String },
    #[error("Orderer {endpoint} did not acknowledge within {timeout_ms}ms (envelope sent: {sent})")]
    Timeout {
        endpoint: String,
        timeout_ms: u64,
        sent: bool,
    },
}

impl BroadcastError {
    /// Whether the envelope reached the ordering service before the failure.
    pub fn envelope_sent(&self) -> bool {
        match self {
            BroadcastError::Transport { sent, .. } | BroadcastError::Timeout { sent, .. } => *sent,
            BroadcastError::Rejected { .. } | BroadcastError::StreamClosed { .. } => true,
        }
    }
}

/// Terminal error of a lifecycle operation, tagged with the phase it failed in.
#[derive(thiserror::Error, Debug)]
pub enum LifecycleError {
    #[error("Invalid chaincode definition: {0}")]
    Validation(#[from] ValidationError),
    #[error("Failed to sign {operation} in phase {phase}: {source}")]
    Signing {
        phase: CommitPhase,
        operation: &'static str,
        #[source]
        source: SignError,
    },
    #[error("Endorsement failed: {0}")]
    Endorsement(#[from] EndorsementError),
    #[error("Transaction assembly failed: {0}")]
    Assembly(#[from] AssemblyError),
    #[error("Broadcast failed: {0}")]
    Broadcast(#[from] BroadcastError),
    #[error("Failed to decode {what} returned by {endpoint}: {cause}")]
    Decode {
        what: &'static str,
        endpoint: String,
        cause: String,
    },
    #[error("Cancelled during {phase}")]
    Cancelled { phase: CommitPhase },
}

impl LifecycleError {
    /// The phase of the commit attempt this error terminated.
    pub fn phase(&self) -> CommitPhase {
        match self {
            LifecycleError::Validation(_) => CommitPhase::Built,
            LifecycleError::Signing { phase, .. } | LifecycleError::Cancelled { phase } => *phase,
            LifecycleError::Endorsement(_) | LifecycleError::Decode { .. } => {
                CommitPhase::Endorsing
            }
            LifecycleError::Assembly(_) => CommitPhase::Endorsed,
            LifecycleError::Broadcast(BroadcastError::Rejected { .. }) => CommitPhase::Rejected,
            LifecycleError::Broadcast(error) if error.envelope_sent() => CommitPhase::Submitted,
            LifecycleError::Broadcast(_) => CommitPhase::Assembled,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, LifecycleError::Cancelled { .. })
    }
}
