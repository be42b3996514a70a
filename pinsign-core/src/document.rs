// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Hyperpolymath
//
// Document model
//
// A document is opaque content plus a string metadata map. Signatures live in
// the metadata and never touch the content, so the digest is always taken
// over the content bytes alone.
//
// On disk a document is either raw bytes (unsigned input) or a JSON container
// carrying base64 content and the metadata map.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{SignError, SignResult};
use crate::storage::write_atomic;

/// Metadata key holding the signer identity
pub const SIGNED_BY_KEY: &str = "SignedBy";

/// Metadata key holding the lowercase hex signature
pub const SIGNATURE_KEY: &str = "Signature";

/// Container format tag
pub const CONTAINER_FORMAT: &str = "pinsign-document/1";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub content: Vec<u8>,
    pub metadata: BTreeMap<String, String>,
}

/// A document carrying (or expected to carry) signature metadata
pub type SignedDocument = Document;

#[derive(Serialize, Deserialize)]
struct DocumentContainer {
    format: String,
    content: String,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
}

impl Document {
    pub fn new(content: impl Into<Vec<u8>>) -> Self {
        Self {
            content: content.into(),
            metadata: BTreeMap::new(),
        }
    }

    /// Bytes covered by the signature: the content, never the metadata
    pub fn canonical_bytes(&self) -> &[u8] {
        &self.content
    }

    pub fn signer(&self) -> Option<&str> {
        self.metadata.get(SIGNED_BY_KEY).map(String::as_str)
    }

    /// Hex signature; an empty entry is treated as no signature
    pub fn signature_hex(&self) -> Option<&str> {
        self.metadata
            .get(SIGNATURE_KEY)
            .map(String::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn is_signed(&self) -> bool {
        self.signature_hex().is_some()
    }

    /// Remove signature metadata, keeping any other entries
    pub fn strip_signature(&mut self) {
        self.metadata.remove(SIGNED_BY_KEY);
        self.metadata.remove(SIGNATURE_KEY);
    }

    /// Copy of this document with the given signature attached
    pub fn with_signature(&self, signer_id: &str, signature: &[u8]) -> Self {
        let mut signed = self.clone();
        signed.strip_signature();
        signed
            .metadata
            .insert(SIGNED_BY_KEY.to_string(), signer_id.to_string());
        signed
            .metadata
            .insert(SIGNATURE_KEY.to_string(), hex::encode(signature));
        signed
    }

    /// Serialize as the JSON container
    pub fn to_container_bytes(&self) -> SignResult<Vec<u8>> {
        let container = DocumentContainer {
            format: CONTAINER_FORMAT.to_string(),
            content: BASE64.encode(&self.content),
            metadata: self.metadata.clone(),
        };
        Ok(serde_json::to_vec_pretty(&container)?)
    }

    /// Parse bytes read from disk.
    ///
    /// A JSON container tagged with [`CONTAINER_FORMAT`] is unpacked; anything
    /// else is taken as raw content with no metadata.
    pub fn from_file_bytes(bytes: Vec<u8>) -> SignResult<Self> {
        match serde_json::from_slice::<DocumentContainer>(&bytes) {
            Ok(container) if container.format == CONTAINER_FORMAT => {
                let content = BASE64.decode(container.content.as_bytes()).map_err(|e| {
                    SignError::FormatError(format!("document content is not base64: {e}"))
                })?;
                Ok(Self {
                    content,
                    metadata: container.metadata,
                })
            }
            _ => Ok(Self::new(bytes)),
        }
    }

    pub fn load(path: &Path) -> SignResult<Self> {
        let bytes = std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                SignError::NotFound(format!("document {}", path.display()))
            }
            _ => SignError::IoError(format!("cannot read {}: {e}", path.display())),
        })?;
        debug!(path = %path.display(), len = bytes.len(), "loaded document");
        Self::from_file_bytes(bytes)
    }

    /// Write the container atomically
    pub fn save(&self, path: &Path) -> SignResult<()> {
        write_atomic(path, &self.to_container_bytes()?)
    }
}

/// `<dir>/<stem>_signed.json` next to the input
pub fn signed_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    input.with_file_name(format!("{stem}_signed.json"))
}
