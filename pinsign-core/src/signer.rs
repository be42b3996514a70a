// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Hyperpolymath
//
// Document signing
//
// Decrypts the private key with the PIN, hashes the document content and
// attaches a detached PKCS#1 v1.5 signature as metadata. The private key is
// dropped (and zeroized) before the signed document is returned.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::crypto::{RsaSigner, Sha256Hasher};
use crate::document::{signed_output_path, Document, SignedDocument};
use crate::error::SignResult;
use crate::keyvault::{EncryptedPrivateKeyBlob, KeyVault};
use crate::storage::KeyStore;

#[derive(Debug, Clone)]
pub struct Signer {
    signer_id: String,
    vault: KeyVault,
}

impl Default for Signer {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_SIGNER_ID)
    }
}

impl Signer {
    pub fn new(signer_id: impl Into<String>) -> Self {
        Self {
            signer_id: signer_id.into(),
            vault: KeyVault::default(),
        }
    }

    pub fn signer_id(&self) -> &str {
        &self.signer_id
    }

    /// Sign `document` with the key in `blob`.
    ///
    /// Existing signature metadata is ignored, so re-signing an already
    /// signed document covers the same bytes as signing the original.
    pub fn sign(
        &self,
        document: &Document,
        pin: &str,
        blob: &EncryptedPrivateKeyBlob,
    ) -> SignResult<SignedDocument> {
        let mut unsigned = document.clone();
        unsigned.strip_signature();

        let digest = Sha256Hasher::digest(unsigned.canonical_bytes());
        debug!(digest = %hex::encode(&digest[..8]), "computed document digest");

        let signature = {
            let private_key = self.vault.decrypt(pin, blob)?;
            RsaSigner::sign(&private_key, &digest)?
        };

        info!(signer = %self.signer_id, len = unsigned.content.len(), "signed document");
        Ok(unsigned.with_signature(&self.signer_id, &signature))
    }

    /// Sign the document at `document_path` and write `<stem>_signed.json`
    /// beside it. The input file is never modified.
    pub fn sign_file(&self, document_path: &Path, pin: &str, key_store: &KeyStore) -> SignResult<PathBuf> {
        let blob = key_store.load_blob()?;
        let document = Document::load(document_path)?;

        let signed = self.sign(&document, pin, &blob)?;

        let out_path = signed_output_path(document_path);
        signed.save(&out_path)?;
        info!(path = %out_path.display(), "wrote signed document");
        Ok(out_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::tests::test_key;
    use crate::error::ErrorKind;

    fn blob() -> EncryptedPrivateKeyBlob {
        KeyVault::default().encrypt("1234", test_key()).unwrap()
    }

    #[test]
    fn test_sign_attaches_metadata() {
        let signer = Signer::default();
        let signed = signer.sign(&Document::new(b"hello".to_vec()), "1234", &blob()).unwrap();

        assert_eq!(signed.content, b"hello");
        assert_eq!(signed.signer(), Some("User A"));

        let signature = signed.signature_hex().unwrap();
        // 2048-bit test key: 256 bytes
        assert_eq!(signature.len(), 512);
        assert!(signature.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn test_resign_is_idempotent() {
        let signer = Signer::new("Signer B");
        let blob = blob();
        let original = Document::new(b"contract".to_vec());

        let first = signer.sign(&original, "1234", &blob).unwrap();
        let second = signer.sign(&first, "1234", &blob).unwrap();

        // PKCS#1 v1.5 is deterministic
        assert_eq!(first, second);
    }

    #[test]
    fn test_sign_wrong_pin_propagates() {
        let err = Signer::default()
            .sign(&Document::new(b"hello".to_vec()), "0000", &blob())
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::CryptoError | ErrorKind::FormatError));
    }
}
