// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Hyperpolymath
//
// Signature verification
//
// Missing signature metadata is an error. Everything past that point
// (hex decoding, key parsing, the RSA check) collapses to `false`, so a
// malformed signature is indistinguishable from a forged one.

use std::path::Path;

use rsa::RsaPublicKey;
use tracing::{debug, info, warn};

use crate::crypto::{RsaSigner, Sha256Hasher};
use crate::document::{Document, SignedDocument};
use crate::error::{SignError, SignResult};
use crate::keyvault::PublicKeyArtifact;
use crate::storage::load_public_key;

#[derive(Debug, Clone, Copy, Default)]
pub struct Verifier;

impl Verifier {
    pub fn new() -> Self {
        Self
    }

    /// Check the detached signature of `document` against `public_key`
    pub fn verify(&self, document: &SignedDocument, public_key: &PublicKeyArtifact) -> SignResult<bool> {
        match public_key.to_public_key() {
            Ok(public_key) => self.verify_with_key(document, &public_key),
            Err(_) => {
                Self::signature_hex(document)?;
                debug!("public key did not parse");
                Ok(Self::report(document, false))
            }
        }
    }

    /// Same as [`Self::verify`] with an already parsed key
    pub fn verify_with_key(&self, document: &SignedDocument, public_key: &RsaPublicKey) -> SignResult<bool> {
        let signature_hex = Self::signature_hex(document)?;
        let valid = Self::check(document, signature_hex, public_key);
        Ok(Self::report(document, valid))
    }

    /// Signature metadata; an empty entry counts as absent
    fn signature_hex(document: &SignedDocument) -> SignResult<&str> {
        document
            .signature_hex()
            .ok_or_else(|| SignError::ValidationError("document carries no signature".to_string()))
    }

    fn report(document: &SignedDocument, valid: bool) -> bool {
        let signer = document.signer().unwrap_or("unknown");
        if valid {
            info!(signer, "signature valid");
        } else {
            warn!(signer, "signature rejected");
        }
        valid
    }

    fn check(document: &SignedDocument, signature_hex: &str, public_key: &RsaPublicKey) -> bool {
        let Ok(signature) = hex::decode(signature_hex) else {
            debug!("signature is not valid hex");
            return false;
        };

        let mut unsigned = document.clone();
        unsigned.strip_signature();
        let digest = Sha256Hasher::digest(unsigned.canonical_bytes());

        RsaSigner::verify(public_key, &digest, &signature)
    }

    /// Verify the signed document at `signed_path` with the PEM key at `public_key_path`.
    ///
    /// A public key file that does not parse is a `FormatError`.
    pub fn verify_file(&self, signed_path: &Path, public_key_path: &Path) -> SignResult<bool> {
        let public_key = load_public_key(public_key_path)?.to_public_key()?;

        let document = Document::load(signed_path)?;
        self.verify_with_key(&document, &public_key)
    }
}
