// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Hyperpolymath
//
// Pinsign Core - PIN-protected RSA keys and detached document signatures
//
// Layers:
// - PBKDF2-HMAC-SHA256: PIN to AES key derivation (100k iterations)
// - AES-256-CBC: encryption of the PKCS#8 private key at rest
// - RSA-4096: key generation
// - SHA-256 + PKCS#1 v1.5: document signatures
//
// Flow: KeyVault::generate -> (public PEM, encrypted blob) persisted by the
// caller; Signer::sign decrypts the blob with the PIN and signs the document
// content; Verifier::verify checks it with nothing but the public key.
// No session state is kept between calls.

pub mod config;
pub mod crypto;
pub mod document;
pub mod error;
pub mod keyvault;
pub mod signer;
pub mod storage;
pub mod verifier;

pub use config::*;
pub use crypto::*;
pub use document::*;
pub use error::*;
pub use keyvault::*;
pub use signer::*;
pub use storage::*;
pub use verifier::*;

/// RSA modulus size in bits
pub const RSA_KEY_BITS: usize = 4096;

/// RSA public exponent
pub const RSA_PUBLIC_EXPONENT: u64 = 65537;

/// AES-256 key size in bytes
pub const AES_KEY_SIZE: usize = 32;

/// AES block size in bytes
pub const AES_BLOCK_SIZE: usize = 16;

/// CBC initialization vector size in bytes
pub const IV_SIZE: usize = 16;

/// PBKDF2 salt size in bytes
pub const SALT_SIZE: usize = 16;

/// PBKDF2 iteration count
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// SHA-256 output size
pub const DIGEST_SIZE: usize = 32;
