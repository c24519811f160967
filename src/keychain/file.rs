//! File-backed secret store
//!
//! One file per key under a private directory. On unix the directory is
//! created 0700 and each secret file 0600.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::trace;

use super::{validate_key, SecretStore};
use crate::error::{Error, Result};

const SECRET_EXTENSION: &str = "secret";

/// Secret store that keeps each entry in its own owner-only file
#[derive(Debug, Clone)]
pub struct FileSecretStore {
    dir: PathBuf,
}

impl FileSecretStore {
    /// The directory is created on first write
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> Result<PathBuf> {
        validate_key(key).map_err(|reason| Error::store_operation("resolve", key, reason))?;
        Ok(self.dir.join(format!("{}.{}", key, SECRET_EXTENSION)))
    }

    fn ensure_dir(&self) -> Result<()> {
        if self.dir.is_dir() {
            return Ok(());
        }

        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o700);
        }
        builder.create(&self.dir).map_err(|e| Error::StoreUnavailable {
            path: self.dir.clone(),
            message: e.to_string(),
        })
    }
}

impl SecretStore for FileSecretStore {
    fn name(&self) -> &'static str {
        "file"
    }

    fn delete(&self, key: &str) -> Result<()> {
        let path = self.entry_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                trace!(path = %path.display(), "Secret removed");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::store_operation("delete", key, e)),
        }
    }

    fn write(&self, key: &str, secret: &[u8]) -> Result<()> {
        let path = self.entry_path(key)?;
        self.ensure_dir()?;

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options
            .open(&path)
            .map_err(|e| Error::store_operation("write", key, e))?;
        file.write_all(secret)
            .and_then(|()| file.sync_all())
            .map_err(|e| Error::store_operation("write", key, e))?;

        trace!(path = %path.display(), bytes = secret.len(), "Secret written");
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.entry_path(key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::store_operation("read", key, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_round_trip_creates_directory() {
        let temp = TempDir::new().unwrap();
        let store = FileSecretStore::new(temp.path().join("keychain"));

        store.write("test", b"test").unwrap();
        assert_eq!(store.read("test").unwrap(), Some(b"test".to_vec()));
        assert!(store.dir().join("test.secret").exists());
    }

    #[test]
    fn test_read_missing_is_none() {
        let temp = TempDir::new().unwrap();
        let store = FileSecretStore::new(temp.path());
        assert!(store.read("absent").unwrap().is_none());
        assert!(store.delete("absent").is_ok());
    }

    #[test]
    fn test_rejects_path_like_keys() {
        let temp = TempDir::new().unwrap();
        let store = FileSecretStore::new(temp.path());
        assert!(store.write("../escape", b"x").is_err());
        assert!(store.write("", b"x").is_err());
        assert!(store.read(".hidden").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_secret_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let store = FileSecretStore::new(temp.path().join("private"));
        store.write("test", b"test").unwrap();

        let file_mode = fs::metadata(store.dir().join("test.secret"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(file_mode & 0o777, 0o600);
    }

    #[test]
    fn test_unwritable_location_is_an_error() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("not-a-dir");
        fs::write(&blocker, b"file").unwrap();

        let store = FileSecretStore::new(blocker.join("keychain"));
        let err = store.write("test", b"test").unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::StoreUnavailable);
    }
}
