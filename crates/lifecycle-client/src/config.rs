use crate::broadcast::BroadcastConfig;
use crate::endorsement::{CollectorConfig, EndorsementQuorum};
use lifecycle_common::{ChaincodeDefinition, IdentityError, SigningIdentity, ValidationError};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse client profile: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Environment variable {0} holding the key password is not set")]
    MissingPassword(String),
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error("Invalid chaincode definition in client profile: {0}")]
    Definition(#[from] ValidationError),
}

fn default_timeout_ms() -> u64 {
    30_000
}

/// Everything an organization admin needs to drive the lifecycle: trust
/// material, timeouts and optionally the definition to operate on.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientProfile {
    pub msp_id: String,
    pub certificate: PathBuf,
    pub private_key: PathBuf,
    /// Name of the environment variable holding the key password.
    #[serde(default)]
    pub key_password_env: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub endorse_timeout_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub broadcast_timeout_ms: u64,
    #[serde(default)]
    pub quorum: EndorsementQuorum,
    #[serde(default)]
    pub verify_endorsements: bool,
    #[serde(default)]
    pub definition: Option<ChaincodeDefinition>,
    /// Directory relative trust material paths resolve against.
    #[serde(skip)]
    base_dir: PathBuf,
}

impl ClientProfile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut profile = Self::from_yaml(&content)?;
        profile.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(profile)
    }

    /// Parses a profile and checks its chaincode definition, if any.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let profile: ClientProfile = serde_yaml::from_str(content)?;
        if let Some(definition) = &profile.definition {
            definition.validate()?;
        }
        Ok(profile)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>, ConfigError> {
        let path = self.resolve(path);
        std::fs::read(&path).map_err(|source| ConfigError::Io { path, source })
    }

    /// Loads the certificate and private key into a signing identity.
    pub fn signing_identity(&self) -> Result<SigningIdentity, ConfigError> {
        let certificate = self.read(&self.certificate)?;
        let private_key = self.read(&self.private_key)?;
        let password = match &self.key_password_env {
            Some(variable) => Some(
                std::env::var(variable)
                    .map_err(|_| ConfigError::MissingPassword(variable.clone()))?,
            ),
            None => None,
        };
        let identity = SigningIdentity::new(
            self.msp_id.clone(),
            &certificate,
            &private_key,
            password.as_deref().map(str::as_bytes),
        )?;
        info!(msp_id = %self.msp_id, subject = %identity.certificate().subject(), "Loaded signing identity");
        Ok(identity)
    }

    pub fn collector_config(&self) -> CollectorConfig {
        CollectorConfig {
            timeout: Duration::from_millis(self.endorse_timeout_ms),
            quorum: self.quorum,
            verify_signatures: self.verify_endorsements,
        }
    }

    pub fn broadcast_config(&self) -> BroadcastConfig {
        BroadcastConfig {
            timeout: Duration::from_millis(self.broadcast_timeout_ms),
        }
    }
}
