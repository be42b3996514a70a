// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Hyperpolymath
//
// Cryptographic primitives layer
//
// Implements:
// - PBKDF2-HMAC-SHA256: PIN-based key derivation
// - AES-256-CBC: raw block encryption (caller handles padding)
// - SHA-256: document digests
// - RSA: key generation and PKCS#1 v1.5 signatures over digests
//
// Everything here is stateless; functions map byte buffers to byte buffers.

use aes::Aes256;
use cbc::cipher::{block_padding::NoPadding, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::{BigUint, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{SignError, SignResult};
use crate::{AES_BLOCK_SIZE, AES_KEY_SIZE, DIGEST_SIZE, IV_SIZE, PBKDF2_ITERATIONS, SALT_SIZE};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Secure key material that zeroizes on drop
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecureKey {
    bytes: Vec<u8>,
}

impl SecureKey {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
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

/// PBKDF2 key derivation with HMAC-SHA256
pub struct Pbkdf2Kdf {
    iterations: u32,
}

impl Default for Pbkdf2Kdf {
    fn default() -> Self {
        Self {
            iterations: PBKDF2_ITERATIONS,
        }
    }
}

impl Pbkdf2Kdf {
    /// Derive a 256-bit key from a PIN and salt
    pub fn derive(&self, pin: &[u8], salt: &[u8]) -> SecureKey {
        let mut output = vec![0u8; AES_KEY_SIZE];
        pbkdf2::pbkdf2_hmac::<Sha256>(pin, salt, self.iterations, &mut output);
        SecureKey::from_bytes(output)
    }

    /// Generate a fresh random salt
    pub fn generate_salt() -> [u8; SALT_SIZE] {
        let mut salt = [0u8; SALT_SIZE];
        OsRng.fill_bytes(&mut salt);
        salt
    }
}

/// AES-256 in CBC mode without padding.
///
/// Input lengths must already be a multiple of the block size; padding is
/// applied and stripped by the key vault.
pub struct AesCbcCipher<'a> {
    key: &'a SecureKey,
}

impl<'a> AesCbcCipher<'a> {
    pub fn new(key: &'a SecureKey) -> SignResult<Self> {
        if key.len() != AES_KEY_SIZE {
            return Err(SignError::CryptoError(format!(
                "expected a {AES_KEY_SIZE}-byte key, got {}",
                key.len()
            )));
        }
        Ok(Self { key })
    }

    /// Generate a random initialization vector
    pub fn generate_iv() -> [u8; IV_SIZE] {
        let mut iv = [0u8; IV_SIZE];
        OsRng.fill_bytes(&mut iv);
        iv
    }

    /// Encrypt block-aligned plaintext
    pub fn encrypt(&self, iv: &[u8], plaintext: &[u8]) -> SignResult<Vec<u8>> {
        Self::check_aligned(plaintext.len())?;
        let cipher = Aes256CbcEnc::new_from_slices(self.key.as_bytes(), iv)
            .map_err(|_| SignError::CryptoError("invalid key or IV length".to_string()))?;
        Ok(cipher.encrypt_padded_vec_mut::<NoPadding>(plaintext))
    }

    /// Decrypt block-aligned ciphertext, returning the still-padded plaintext
    pub fn decrypt(&self, iv: &[u8], ciphertext: &[u8]) -> SignResult<Vec<u8>> {
        Self::check_aligned(ciphertext.len())?;
        let cipher = Aes256CbcDec::new_from_slices(self.key.as_bytes(), iv)
            .map_err(|_| SignError::CryptoError("invalid key or IV length".to_string()))?;
        cipher
            .decrypt_padded_vec_mut::<NoPadding>(ciphertext)
            .map_err(|_| SignError::CryptoError("ciphertext is not block aligned".to_string()))
    }

    fn check_aligned(len: usize) -> SignResult<()> {
        if len == 0 || len % AES_BLOCK_SIZE != 0 {
            return Err(SignError::CryptoError(format!(
                "length {len} is not a positive multiple of {AES_BLOCK_SIZE}"
            )));
        }
        Ok(())
    }
}

/// SHA-256 hasher
pub struct Sha256Hasher;

impl Sha256Hasher {
    pub fn digest(data: &[u8]) -> [u8; DIGEST_SIZE] {
        Sha256::digest(data).into()
    }
}

/// RSA key generation and PKCS#1 v1.5 signatures.
///
/// The message handed to the signature scheme is the precomputed document
/// digest; the scheme hashes it once more with SHA-256 into its DigestInfo.
pub struct RsaSigner;

impl RsaSigner {
    /// Generate an RSA key pair with the given modulus size and public exponent
    pub fn generate_keypair(bits: usize, exponent: u64) -> SignResult<RsaPrivateKey> {
        RsaPrivateKey::new_with_exp(&mut OsRng, bits, &BigUint::from(exponent))
            .map_err(|e| SignError::CryptoError(format!("RSA key generation failed: {e}")))
    }

    /// Sign a digest
    pub fn sign(private_key: &RsaPrivateKey, digest: &[u8; DIGEST_SIZE]) -> SignResult<Vec<u8>> {
        let signing_key = SigningKey::<Sha256>::new(private_key.clone());
        let signature = signing_key
            .try_sign(digest)
            .map_err(|e| SignError::CryptoError(format!("signing failed: {e}")))?;
        Ok(signature.to_vec())
    }

    /// Verify a signature over a digest. Any failure is `false`.
    pub fn verify(public_key: &RsaPublicKey, digest: &[u8; DIGEST_SIZE], signature: &[u8]) -> bool {
        let Ok(signature) = Signature::try_from(signature) else {
            return false;
        };
        VerifyingKey::<Sha256>::new(public_key.clone())
            .verify(digest, &signature)
            .is_ok()
    }
}
