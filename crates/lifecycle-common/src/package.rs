//! Chaincode install packages: a gzipped tar holding `metadata.json` and `code.tar.gz`.

use crate::errors::PackageError;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::Read;

/// Location of the metadata document at the top level of the package.
pub const METADATA_FILE: &str = "metadata.json";

/// Location of the code archive at the top level of the package.
pub const CODE_PACKAGE_FILE: &str = "code.tar.gz";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageMetadata {
    pub path: String,
    #[serde(rename = "type")]
    pub chaincode_type: String,
    pub label: String,
}

#[derive(Debug, Clone)]
pub struct ChaincodePackage {
    bytes: Vec<u8>,
    metadata: PackageMetadata,
}

impl ChaincodePackage {
    /// Parses and validates a package as produced by the packaging tools.
    pub fn parse(bytes: Vec<u8>) -> Result<Self, PackageError> {
        let mut archive = tar::Archive::new(GzDecoder::new(bytes.as_slice()));
        let mut metadata = None;
        let mut has_code = false;

        let entries = archive
            .entries()
            .map_err(|e| PackageError::Archive(e.to_string()))?;
        for entry in entries {
            let mut entry = entry.map_err(|e| PackageError::Archive(e.to_string()))?;
            let path = entry
                .path()
                .map_err(|e| PackageError::Archive(e.to_string()))?
                .to_string_lossy()
                .into_owned();
            if entry.header().entry_type() != tar::EntryType::Regular {
                return Err(PackageError::Archive(format!(
                    "tar entry {path} is not a regular file"
                )));
            }
            match path.as_str() {
                METADATA_FILE => {
                    let mut document = Vec::new();
                    entry
                        .read_to_end(&mut document)
                        .map_err(|e| PackageError::Archive(e.to_string()))?;
                    let parsed: PackageMetadata = serde_json::from_slice(&document)
                        .map_err(|e| PackageError::Metadata(e.to_string()))?;
                    metadata = Some(parsed);
                }
                CODE_PACKAGE_FILE => has_code = true,
                _ => {}
            }
        }

        let metadata = metadata.ok_or(PackageError::MissingEntry(METADATA_FILE))?;
        if !has_code {
            return Err(PackageError::MissingEntry(CODE_PACKAGE_FILE));
        }
        validate_label(&metadata.label)?;
        Ok(ChaincodePackage { bytes, metadata })
    }

    /// Writes a package around an already built code archive.
    pub fn build(metadata: PackageMetadata, code_archive: &[u8]) -> Result<Self, PackageError> {
        validate_label(&metadata.label)?;
        let document =
            serde_json::to_vec(&metadata).map_err(|e| PackageError::Metadata(e.to_string()))?;

        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        append_file(&mut builder, METADATA_FILE, &document)?;
        append_file(&mut builder, CODE_PACKAGE_FILE, code_archive)?;
        let bytes = builder
            .into_inner()
            .and_then(|encoder| encoder.finish())
            .map_err(|e| PackageError::Archive(e.to_string()))?;

        Ok(ChaincodePackage { bytes, metadata })
    }

    pub fn metadata(&self) -> &PackageMetadata {
        &self.metadata
    }

    pub fn label(&self) -> &str {
        &self.metadata.label
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// `label:hex(sha256(package))`, the id peers report once the package is installed.
    pub fn package_id(&self) -> String {
        let digest = Sha256::digest(&self.bytes);
        format!("{}:{}", self.metadata.label, hex::encode(digest))
    }
}

fn append_file<W: std::io::Write>(
    builder: &mut tar::Builder<W>,
    name: &str,
    contents: &[u8],
) -> Result<(), PackageError> {
    let mut header = tar::Header::new_gnu();
    header.set_size(contents.len() as u64);
    header.set_mode(0o644);
    header.set_entry_type(tar::EntryType::Regular);
    builder
        .append_data(&mut header, name, contents)
        .map_err(|e| PackageError::Archive(e.to_string()))
}

fn validate_label(label: &str) -> Result<(), PackageError> {
    let mut chars = label.chars();
    let valid = match chars.next() {
        Some(first) => {
            first.is_ascii_alphanumeric()
                && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '+' | '-'))
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(PackageError::Metadata(format!("invalid label '{label}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(label: &str) -> PackageMetadata {
        PackageMetadata {
            path: "github.com/example/basic".to_string(),
            chaincode_type: "golang".to_string(),
            label: label.to_string(),
        }
    }

    #[test]
    fn built_package_parses_back() {
        let package = ChaincodePackage::build(metadata("basic_1.0"), b"not really gzip").unwrap();
        let parsed = ChaincodePackage::parse(package.bytes().to_vec()).unwrap();
        assert_eq!(parsed.metadata(), package.metadata());
        assert_eq!(parsed.package_id(), package.package_id());
        assert!(parsed.package_id().starts_with("basic_1.0:"));
        assert_eq!(parsed.package_id().len(), "basic_1.0:".len() + 64);
    }

    #[test]
    fn metadata_uses_type_key() {
        let json = serde_json::to_string(&metadata("cc")).unwrap();
        assert!(json.contains("\"type\":\"golang\""));
    }

    #[test]
    fn missing_code_archive_is_rejected() {
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        let document = serde_json::to_vec(&metadata("cc")).unwrap();
        append_file(&mut builder, METADATA_FILE, &document).unwrap();
        let bytes = builder.into_inner().unwrap().finish().unwrap();

        assert!(matches!(
            ChaincodePackage::parse(bytes),
            Err(PackageError::MissingEntry(CODE_PACKAGE_FILE))
        ));
    }

    #[test]
    fn labels_are_validated() {
        assert!(ChaincodePackage::build(metadata("basic_1.0+rc-1"), b"code").is_ok());
        for label in ["", "_basic", "has space", "semi;colon"] {
            assert!(matches!(
                ChaincodePackage::build(metadata(label), b"code"),
                Err(PackageError::Metadata(_))
            ));
        }
    }

    #[test]
    fn garbage_is_not_a_package() {
        assert!(matches!(
            ChaincodePackage::parse(b"definitely not gzip".to_vec()),
            Err(PackageError::Archive(_))
        ));
    }
}
