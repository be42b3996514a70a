// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Hyperpolymath
//
// Key vault: RSA keypair lifecycle
//
// - Generates an RSA keypair
// - Encrypts the PKCS#8 DER private key under a PIN-derived AES-256-CBC key
// - Decrypts it again given the same PIN
//
// Blob layout: salt (16) || iv (16) || ciphertext (multiple of 16).
// There is no MAC; a wrong PIN is detected by padding or DER parse failure.

use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::crypto::{AesCbcCipher, Pbkdf2Kdf, RsaSigner};
use crate::error::{SignError, SignResult};
use crate::{AES_BLOCK_SIZE, IV_SIZE, RSA_KEY_BITS, RSA_PUBLIC_EXPONENT, SALT_SIZE};

/// Minimum blob length: salt plus IV
pub const BLOB_HEADER_SIZE: usize = SALT_SIZE + IV_SIZE;

/// Public half of a keypair as a PEM (SubjectPublicKeyInfo) document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyArtifact {
    pem: String,
}

impl PublicKeyArtifact {
    pub fn from_public_key(public_key: &RsaPublicKey) -> SignResult<Self> {
        let pem = public_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| SignError::FormatError(format!("cannot encode public key: {e}")))?;
        Ok(Self { pem })
    }

    /// Wrap PEM text read from storage. Parsing is deferred to [`Self::to_public_key`].
    pub fn from_pem(pem: impl Into<String>) -> Self {
        Self { pem: pem.into() }
    }

    pub fn as_pem(&self) -> &str {
        &self.pem
    }

    pub fn to_public_key(&self) -> SignResult<RsaPublicKey> {
        RsaPublicKey::from_public_key_pem(&self.pem)
            .map_err(|e| SignError::FormatError(format!("invalid public key: {e}")))
    }
}

/// `salt || iv || ciphertext`, never mutated after creation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedPrivateKeyBlob {
    bytes: Vec<u8>,
}

impl EncryptedPrivateKeyBlob {
    /// Validate the framing of raw blob bytes
    pub fn from_bytes(bytes: Vec<u8>) -> SignResult<Self> {
        if bytes.len() < BLOB_HEADER_SIZE {
            return Err(SignError::FormatError(format!(
                "encrypted key is {} bytes, need at least {BLOB_HEADER_SIZE}",
                bytes.len()
            )));
        }
        let ciphertext_len = bytes.len() - BLOB_HEADER_SIZE;
        if ciphertext_len == 0 || ciphertext_len % AES_BLOCK_SIZE != 0 {
            return Err(SignError::FormatError(format!(
                "encrypted key ciphertext length {ciphertext_len} is not a positive multiple of {AES_BLOCK_SIZE}"
            )));
        }
        Ok(Self { bytes })
    }

    fn assemble(salt: &[u8], iv: &[u8], ciphertext: &[u8]) -> Self {
        let mut bytes = Vec::with_capacity(salt.len() + iv.len() + ciphertext.len());
        bytes.extend_from_slice(salt);
        bytes.extend_from_slice(iv);
        bytes.extend_from_slice(ciphertext);
        Self { bytes }
    }

    pub fn salt(&self) -> &[u8] {
        &self.bytes[..SALT_SIZE]
    }

    pub fn iv(&self) -> &[u8] {
        &self.bytes[SALT_SIZE..BLOB_HEADER_SIZE]
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.bytes[BLOB_HEADER_SIZE..]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Append `p` bytes of value `p`, where `p = block - len % block`
pub fn pad(data: &[u8]) -> Zeroizing<Vec<u8>> {
    let pad_len = AES_BLOCK_SIZE - (data.len() % AES_BLOCK_SIZE);
    let mut padded = Zeroizing::new(Vec::with_capacity(data.len() + pad_len));
    padded.extend_from_slice(data);
    // pad_len is in 1..=16
    padded.resize(data.len() + pad_len, pad_len as u8);
    padded
}

/// Validate and strip trailing-byte-count padding
pub fn unpad(padded: &[u8]) -> SignResult<&[u8]> {
    let pad_len = match padded.last() {
        Some(&last) => usize::from(last),
        None => return Err(SignError::CryptoError("empty plaintext".to_string())),
    };
    if pad_len == 0 || pad_len > AES_BLOCK_SIZE || pad_len > padded.len() {
        return Err(SignError::CryptoError(
            "invalid padding (wrong PIN or corrupted key)".to_string(),
        ));
    }
    let (data, padding) = padded.split_at(padded.len() - pad_len);
    if padding.iter().any(|&b| usize::from(b) != pad_len) {
        return Err(SignError::CryptoError(
            "invalid padding (wrong PIN or corrupted key)".to_string(),
        ));
    }
    Ok(data)
}

/// Generates and unlocks PIN-protected RSA keys.
///
/// Holds only the generation parameters; no key material or PIN outlives a call.
#[derive(Debug, Clone)]
pub struct KeyVault {
    key_bits: usize,
}

impl Default for KeyVault {
    fn default() -> Self {
        Self::new(RSA_KEY_BITS)
    }
}

impl KeyVault {
    pub fn new(key_bits: usize) -> Self {
        Self { key_bits }
    }

    pub fn key_bits(&self) -> usize {
        self.key_bits
    }

    /// Generate a keypair and encrypt the private half under `pin`
    pub fn generate(&self, pin: &str) -> SignResult<(PublicKeyArtifact, EncryptedPrivateKeyBlob)> {
        if pin.is_empty() {
            return Err(SignError::InvalidInput("PIN must not be empty".to_string()));
        }

        debug!(bits = self.key_bits, "generating RSA keypair");
        let private_key = RsaSigner::generate_keypair(self.key_bits, RSA_PUBLIC_EXPONENT)?;
        let public_key = PublicKeyArtifact::from_public_key(&private_key.to_public_key())?;

        let blob = self.encrypt(pin, &private_key)?;
        info!(bits = self.key_bits, blob_len = blob.len(), "generated encrypted keypair");
        Ok((public_key, blob))
    }

    /// Encrypt an existing private key under `pin` with a fresh salt and IV
    pub fn encrypt(&self, pin: &str, private_key: &RsaPrivateKey) -> SignResult<EncryptedPrivateKeyBlob> {
        if pin.is_empty() {
            return Err(SignError::InvalidInput("PIN must not be empty".to_string()));
        }

        let der = private_key
            .to_pkcs8_der()
            .map_err(|e| SignError::FormatError(format!("cannot encode private key: {e}")))?;

        let salt = Pbkdf2Kdf::generate_salt();
        let iv = AesCbcCipher::generate_iv();
        let key = Pbkdf2Kdf::default().derive(pin.as_bytes(), &salt);

        let padded = pad(der.as_bytes());
        let ciphertext = AesCbcCipher::new(&key)?.encrypt(&iv, &padded)?;

        Ok(EncryptedPrivateKeyBlob::assemble(&salt, &iv, &ciphertext))
    }

    /// Recover the private key from `blob` using `pin`
    pub fn decrypt(&self, pin: &str, blob: &EncryptedPrivateKeyBlob) -> SignResult<RsaPrivateKey> {
        debug!(blob_len = blob.len(), "decrypting private key");
        let key = Pbkdf2Kdf::default().derive(pin.as_bytes(), blob.salt());
        let padded = Zeroizing::new(AesCbcCipher::new(&key)?.decrypt(blob.iv(), blob.ciphertext())?);

        let der = unpad(&padded).inspect_err(|_| warn!("private key padding check failed"))?;

        RsaPrivateKey::from_pkcs8_der(der).map_err(|e| {
            warn!("decrypted private key did not parse");
            SignError::FormatError(format!("invalid private key encoding: {e}"))
        })
    }
}

/// PKCS#8 DER encoding of a private key, for equality checks
pub fn private_key_der(private_key: &RsaPrivateKey) -> SignResult<Zeroizing<Vec<u8>>> {
    let der = private_key
        .to_pkcs8_der()
        .map_err(|e| SignError::FormatError(format!("cannot encode private key: {e}")))?;
    Ok(Zeroizing::new(der.as_bytes().to_vec()))
}
