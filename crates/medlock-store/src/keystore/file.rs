//! File-backed keystore.
//!
//! One JSON file per key under a private directory, `0600` on Unix.
//! Stands in for a hardware-backed platform keystore on targets without
//! one; the directory should live inside OS-protected application storage.
//!
//! Writes go to a temp file first and are renamed into place, so a crash
//! mid-write never leaves a truncated key file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use medlock_crypto::KeyMaterial;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::{Result, StoreError};
use crate::types::KeyId;

use super::Keystore;

#[derive(Serialize, Deserialize)]
struct KeyFile {
    material: String,
}

pub struct FileKeystore {
    dir: PathBuf,
}

impl FileKeystore {
    /// Open (creating if needed) a keystore directory.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(map_io)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&dir, fs::Permissions::from_mode(0o700)).map_err(map_io)?;
        }
        Ok(Self { dir })
    }

    fn key_path(&self, key_id: &KeyId) -> PathBuf {
        self.dir.join(format!("{}.key", key_id))
    }

    fn meta_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.meta", name))
    }

    fn write_atomic(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, contents).map_err(map_io)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600)).map_err(map_io)?;
        }
        fs::rename(&tmp, path).map_err(map_io)?;
        Ok(())
    }
}

fn map_io(err: io::Error) -> StoreError {
    match err.kind() {
        io::ErrorKind::PermissionDenied => StoreError::KeystoreUnavailable(err.to_string()),
        _ => StoreError::StorageOperationFailed(err.to_string()),
    }
}

impl Keystore for FileKeystore {
    fn put_key(&self, key_id: &KeyId, material: &KeyMaterial) -> Result<()> {
        let file = KeyFile {
            material: BASE64.encode(material.as_bytes()),
        };
        let json = serde_json::to_vec(&file)
            .map_err(|e| StoreError::StorageOperationFailed(e.to_string()))?;
        self.write_atomic(&self.key_path(key_id), &json)
    }

    fn get_key(&self, key_id: &KeyId) -> Result<Option<KeyMaterial>> {
        let path = self.key_path(key_id);
        let json = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(map_io(e)),
        };
        let file: KeyFile = serde_json::from_slice(&json)
            .map_err(|e| StoreError::StorageOperationFailed(e.to_string()))?;
        let decoded = Zeroizing::new(
            BASE64
                .decode(&file.material)
                .map_err(|e| StoreError::StorageOperationFailed(e.to_string()))?,
        );
        let material = KeyMaterial::from_slice(&decoded)
            .map_err(|e| StoreError::StorageOperationFailed(e.to_string()))?;
        Ok(Some(material))
    }

    fn delete_key(&self, key_id: &KeyId) -> Result<()> {
        match fs::remove_file(self.key_path(key_id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(map_io(e)),
        }
    }

    fn get_meta(&self, name: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.meta_path(name)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(map_io(e)),
        }
    }

    fn set_meta(&self, name: &str, value: &str) -> Result<()> {
        self.write_atomic(&self.meta_path(name), value.as_bytes())
    }
}
