// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Hyperpolymath
//
// Artifact persistence
//
// Every write goes to a temp file in the target directory and is renamed
// over the target once flushed, so readers see either the old file or the
// complete new one. The key store only uses the paths it is handed; locating
// removable media is the caller's job.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::config::SignerConfig;
use crate::error::{SignError, SignResult};
use crate::keyvault::{EncryptedPrivateKeyBlob, KeyVault, PublicKeyArtifact};

/// Owner read/write only for the encrypted private key
#[cfg(unix)]
const PRIVATE_KEY_MODE: u32 = 0o600;

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Write `bytes` to a temp file beside `path`, flushed but not yet visible
fn stage(path: &Path, bytes: &[u8]) -> SignResult<NamedTempFile> {
    let io_err = |e: std::io::Error| SignError::IoError(format!("cannot write {}: {e}", path.display()));

    let mut tmp = NamedTempFile::new_in(parent_dir(path)).map_err(io_err)?;
    tmp.write_all(bytes).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    Ok(tmp)
}

/// Rename a staged file over `path`
fn publish(tmp: NamedTempFile, path: &Path) -> SignResult<()> {
    tmp.persist(path)
        .map_err(|e| SignError::IoError(format!("cannot write {}: {}", path.display(), e.error)))?;
    Ok(())
}

/// Write `bytes` to `path` all-or-nothing
pub fn write_atomic(path: &Path, bytes: &[u8]) -> SignResult<()> {
    publish(stage(path, bytes)?, path)
}

fn read_artifact(path: &Path, what: &str) -> SignResult<Vec<u8>> {
    std::fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => SignError::NotFound(format!("{what} {}", path.display())),
        _ => SignError::IoError(format!("cannot read {}: {e}", path.display())),
    })
}

/// Locations of the encrypted private key and the public key artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyStore {
    pub private_key_path: PathBuf,
    pub public_key_path: PathBuf,
}

impl KeyStore {
    pub fn new(private_key_path: impl Into<PathBuf>, public_key_path: impl Into<PathBuf>) -> Self {
        Self {
            private_key_path: private_key_path.into(),
            public_key_path: public_key_path.into(),
        }
    }

    pub fn from_config(config: &SignerConfig) -> Self {
        Self::new(config.private_key_path.clone(), config.public_key_path.clone())
    }

    /// Generate a keypair under `pin` and persist both halves.
    ///
    /// Fails with `NotFound` if the directory meant to hold the private key
    /// (the removable medium) is absent. Both files are staged first; if the
    /// public key still fails to land, the previous encrypted key (or its
    /// absence) is restored.
    pub fn generate(&self, pin: &str, vault: &KeyVault) -> SignResult<PublicKeyArtifact> {
        let media_root = parent_dir(&self.private_key_path);
        if !media_root.is_dir() {
            return Err(SignError::NotFound(format!(
                "storage medium not found at {}",
                media_root.display()
            )));
        }

        let (public_key, blob) = vault.generate(pin)?;

        // Both halves are on disk before either replaces an existing file
        let staged_blob = stage(&self.private_key_path, blob.as_bytes())?;
        let staged_public = stage(&self.public_key_path, public_key.as_pem().as_bytes())?;

        let previous_blob = match std::fs::read(&self.private_key_path) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        publish(staged_blob, &self.private_key_path)?;
        restrict_permissions(&self.private_key_path);

        if let Err(err) = publish(staged_public, &self.public_key_path) {
            warn!(path = %self.private_key_path.display(), "restoring previous encrypted key after failed public key write");
            self.restore_blob(previous_blob);
            return Err(err);
        }

        info!(
            private_key = %self.private_key_path.display(),
            public_key = %self.public_key_path.display(),
            "stored keypair"
        );
        Ok(public_key)
    }

    fn restore_blob(&self, previous: Option<Vec<u8>>) {
        let restored = match previous {
            Some(bytes) => write_atomic(&self.private_key_path, &bytes).map(|()| {
                restrict_permissions(&self.private_key_path);
            }),
            None => std::fs::remove_file(&self.private_key_path).map_err(SignError::from),
        };
        if let Err(e) = restored {
            warn!(error = %e, "could not restore encrypted key");
        }
    }

    pub fn load_blob(&self) -> SignResult<EncryptedPrivateKeyBlob> {
        let bytes = read_artifact(&self.private_key_path, "encrypted private key")?;
        EncryptedPrivateKeyBlob::from_bytes(bytes)
    }

    pub fn load_public_key(&self) -> SignResult<PublicKeyArtifact> {
        load_public_key(&self.public_key_path)
    }
}

/// Read a PEM public key artifact from `path`
pub fn load_public_key(path: &Path) -> SignResult<PublicKeyArtifact> {
    let bytes = read_artifact(path, "public key")?;
    let pem = String::from_utf8(bytes)
        .map_err(|_| SignError::FormatError(format!("{} is not PEM text", path.display())))?;
    Ok(PublicKeyArtifact::from_pem(pem))
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) {
    use std::fs::Permissions;
    use std::os::unix::fs::PermissionsExt;

    if let Err(e) = std::fs::set_permissions(path, Permissions::from_mode(PRIVATE_KEY_MODE)) {
        warn!(path = %path.display(), error = %e, "could not restrict key file permissions");
    }
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    #[test]
    fn test_write_atomic_replaces_contents() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("artifact.bin");

        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"second");
        // No stray temp files left behind
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_write_atomic_missing_dir_fails() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("absent").join("artifact.bin");
        assert_eq!(write_atomic(&path, b"x").unwrap_err().kind(), ErrorKind::IoError);
    }

    #[test]
    fn test_load_blob_missing_and_short() {
        let temp = TempDir::new().unwrap();
        let store = KeyStore::new(temp.path().join("private_encrypted.key"), temp.path().join("public_key.pem"));

        assert_eq!(store.load_blob().unwrap_err().kind(), ErrorKind::NotFound);

        std::fs::write(&store.private_key_path, [0u8; 20]).unwrap();
        assert_eq!(store.load_blob().unwrap_err().kind(), ErrorKind::FormatError);
    }

    #[test]
    fn test_generate_requires_medium() {
        let temp = TempDir::new().unwrap();
        let store = KeyStore::new(
            temp.path().join("usb").join("private_encrypted.key"),
            temp.path().join("public_key.pem"),
        );

        let err = store.generate("1234", &KeyVault::new(1024)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(!store.public_key_path.exists());
    }

    #[test]
    fn test_generate_rolls_back_on_public_key_failure() {
        let temp = TempDir::new().unwrap();
        let store = KeyStore::new(
            temp.path().join("private_encrypted.key"),
            temp.path().join("no-such-dir").join("public_key.pem"),
        );

        let err = store.generate("1234", &KeyVault::new(1024)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IoError);
        assert!(!store.private_key_path.exists());
    }

    #[test]
    fn test_failed_rekey_keeps_previous_key() {
        let temp = TempDir::new().unwrap();
        let store = KeyStore::new(temp.path().join("private_encrypted.key"), temp.path().join("public_key.pem"));
        let vault = KeyVault::new(1024);
        store.generate("1234", &vault).unwrap();
        let old_blob = std::fs::read(&store.private_key_path).unwrap();
        let old_public = std::fs::read(&store.public_key_path).unwrap();

        let broken = KeyStore::new(
            store.private_key_path.clone(),
            temp.path().join("no-such-dir").join("public_key.pem"),
        );
        let err = broken.generate("5678", &vault).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IoError);

        assert_eq!(std::fs::read(&store.private_key_path).unwrap(), old_blob);
        assert_eq!(std::fs::read(&store.public_key_path).unwrap(), old_public);
        // Staged temp files are cleaned up
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 2);
        assert!(vault.decrypt("1234", &store.load_blob().unwrap()).is_ok());
    }

    #[test]
    fn test_failed_public_persist_restores_previous_key() {
        let temp = TempDir::new().unwrap();
        let store = KeyStore::new(temp.path().join("private_encrypted.key"), temp.path().join("public_key.pem"));
        let vault = KeyVault::new(1024);
        store.generate("1234", &vault).unwrap();
        let old_blob = std::fs::read(&store.private_key_path).unwrap();

        // A directory in the way lets staging succeed but the final rename fail
        let occupied = temp.path().join("occupied");
        std::fs::create_dir(&occupied).unwrap();
        let broken = KeyStore::new(store.private_key_path.clone(), occupied.clone());
        assert!(broken.generate("5678", &vault).is_err());

        assert_eq!(std::fs::read(&store.private_key_path).unwrap(), old_blob);
        assert!(occupied.is_dir());
        assert!(vault.decrypt("1234", &store.load_blob().unwrap()).is_ok());

        // No previous key: the new blob is removed again
        let fresh = KeyStore::new(temp.path().join("fresh.key"), occupied);
        assert!(fresh.generate("5678", &vault).is_err());
        assert!(!temp.path().join("fresh.key").exists());
    }

    #[test]
    fn test_generate_empty_pin_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let store = KeyStore::new(temp.path().join("private_encrypted.key"), temp.path().join("public_key.pem"));

        let err = store.generate("", &KeyVault::new(1024)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_generate_and_reload() {
        let temp = TempDir::new().unwrap();
        let store = KeyStore::new(temp.path().join("private_encrypted.key"), temp.path().join("public_key.pem"));
        let vault = KeyVault::new(1024);

        let public_key = store.generate("1234", &vault).unwrap();
        assert_eq!(store.load_public_key().unwrap(), public_key);

        let blob = store.load_blob().unwrap();
        let private_key = vault.decrypt("1234", &blob).unwrap();
        assert_eq!(private_key.to_public_key(), public_key.to_public_key().unwrap());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&store.private_key_path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, PRIVATE_KEY_MODE);
        }
    }
}
