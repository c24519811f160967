//! Secure storage and the keychain capability probe
//!
//! Provides:
//! - The `SecretStore` trait (delete / write / read by key)
//! - A file-backed store with owner-only permissions
//! - An in-memory store
//! - `KeychainProbe`, the memoized write/read self-test

mod file;
mod memory;
mod probe;

pub use file::*;
pub use memory::*;
pub use probe::*;

use std::sync::Arc;

use crate::config::{KeychainSettings, StoreBackend};
use crate::error::Result;

/// Minimal secure-storage contract used by the probe
pub trait SecretStore: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Remove the entry for `key`; removing a missing entry succeeds
    fn delete(&self, key: &str) -> Result<()>;

    /// Store `secret` under `key`, replacing any previous value
    fn write(&self, key: &str, secret: &[u8]) -> Result<()>;

    /// Fetch the bytes stored under `key`, or `None` if absent
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>>;
}

impl<S: SecretStore + ?Sized> SecretStore for Box<S> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn delete(&self, key: &str) -> Result<()> {
        (**self).delete(key)
    }

    fn write(&self, key: &str, secret: &[u8]) -> Result<()> {
        (**self).write(key, secret)
    }

    fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        (**self).read(key)
    }
}

impl<S: SecretStore + ?Sized> SecretStore for Arc<S> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn delete(&self, key: &str) -> Result<()> {
        (**self).delete(key)
    }

    fn write(&self, key: &str, secret: &[u8]) -> Result<()> {
        (**self).write(key, secret)
    }

    fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        (**self).read(key)
    }
}

/// Check that `key` is usable as an entry name by every store
///
/// Keys are non-empty, ASCII `[A-Za-z0-9._-]` only, and never start with `.`
pub fn validate_key(key: &str) -> std::result::Result<(), &'static str> {
    if key.is_empty() {
        return Err("key cannot be empty");
    }
    if key.starts_with('.') {
        return Err("key must not start with '.'");
    }
    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err("key may only contain letters, digits, '.', '-' and '_'");
    }
    Ok(())
}

/// Build the store selected by `[keychain]`
pub fn open_store(settings: &KeychainSettings) -> Box<dyn SecretStore> {
    match settings.backend {
        StoreBackend::File => Box::new(FileSecretStore::new(&settings.store_dir)),
        StoreBackend::Memory => Box::new(MemorySecretStore::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_store_backend_selection() {
        let mut settings = KeychainSettings::default();
        settings.backend = StoreBackend::Memory;
        assert_eq!(open_store(&settings).name(), "memory");

        settings.backend = StoreBackend::File;
        assert_eq!(open_store(&settings).name(), "file");
    }

    #[test]
    fn test_validate_key() {
        assert!(validate_key("test").is_ok());
        assert!(validate_key("overlay-probe_v1.2").is_ok());

        assert!(validate_key("").is_err());
        assert!(validate_key(".hidden").is_err());
        assert!(validate_key("debug probe").is_err());
        assert!(validate_key("../escape").is_err());
        assert!(validate_key("a\\b").is_err());
        assert!(validate_key("naïve").is_err());
    }

    #[test]
    fn test_shared_store_round_trip() {
        let store = Arc::new(MemorySecretStore::new());
        let shared: Box<dyn SecretStore> = Box::new(store.clone());

        shared.write("test", b"test").unwrap();
        assert_eq!(store.read("test").unwrap(), Some(b"test".to_vec()));
    }
}
