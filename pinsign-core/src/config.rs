// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Hyperpolymath

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{SignError, SignResult};

/// Default file name of the encrypted private key on the removable medium
pub const DEFAULT_PRIVATE_KEY_FILE: &str = "private_encrypted.key";

/// Default file name of the public key artifact
pub const DEFAULT_PUBLIC_KEY_FILE: &str = "public_key.pem";

/// Default signer identity written into signed documents
pub const DEFAULT_SIGNER_ID: &str = "User A";

/// Signer configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignerConfig {
    /// Encrypted private key, normally on removable media
    pub private_key_path: PathBuf,
    /// PEM public key written at generation time
    pub public_key_path: PathBuf,
    /// Identity recorded in the `SignedBy` metadata entry
    pub signer_id: String,
    /// RSA modulus size for new keys
    pub rsa_key_bits: usize,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            private_key_path: PathBuf::from(DEFAULT_PRIVATE_KEY_FILE),
            public_key_path: PathBuf::from(DEFAULT_PUBLIC_KEY_FILE),
            signer_id: DEFAULT_SIGNER_ID.to_string(),
            rsa_key_bits: crate::RSA_KEY_BITS,
        }
    }
}

impl SignerConfig {
    /// Defaults with the private key placed under `media_root`
    pub fn for_media_root(media_root: &Path) -> Self {
        Self {
            private_key_path: media_root.join(DEFAULT_PRIVATE_KEY_FILE),
            ..Self::default()
        }
    }

    /// Load from a JSON file; absent fields keep their defaults
    pub fn load(path: &Path) -> SignResult<Self> {
        let bytes = std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                SignError::NotFound(format!("config {}", path.display()))
            }
            _ => SignError::IoError(format!("cannot read {}: {e}", path.display())),
        })?;
        let config: Self = serde_json::from_slice(&bytes)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SignResult<()> {
        if self.signer_id.is_empty() {
            return Err(SignError::InvalidInput("signer_id must not be empty".to_string()));
        }
        if self.rsa_key_bits < 1024 || self.rsa_key_bits % 8 != 0 {
            return Err(SignError::InvalidInput(format!(
                "unsupported RSA key size {}",
                self.rsa_key_bits
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = SignerConfig::default();
        assert_eq!(config.rsa_key_bits, 4096);
        assert_eq!(config.signer_id, "User A");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_partial_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("pinsign.json");
        std::fs::write(&path, r#"{"signer_id": "Jan Kowalski"}"#).unwrap();

        let config = SignerConfig::load(&path).unwrap();
        assert_eq!(config.signer_id, "Jan Kowalski");
        assert_eq!(config.public_key_path, PathBuf::from(DEFAULT_PUBLIC_KEY_FILE));
    }

    #[test]
    fn test_config_errors() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("pinsign.json");
        assert_eq!(SignerConfig::load(&path).unwrap_err().kind(), ErrorKind::NotFound);

        std::fs::write(&path, "not json").unwrap();
        assert_eq!(SignerConfig::load(&path).unwrap_err().kind(), ErrorKind::FormatError);

        std::fs::write(&path, r#"{"rsa_key_bits": 100}"#).unwrap();
        assert_eq!(SignerConfig::load(&path).unwrap_err().kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_for_media_root() {
        let config = SignerConfig::for_media_root(Path::new("/media/usb"));
        assert_eq!(
            config.private_key_path,
            PathBuf::from("/media/usb/private_encrypted.key")
        );
    }
}
