//! In-memory secret store
//!
//! Process-local and never persisted. Failure switches let tests model a
//! keychain that rejects writes or returns different bytes than were stored.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

use super::SecretStore;
use crate::error::{Error, Result};

/// Secret store backed by a map
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
    fail_writes: AtomicBool,
    corrupt_reads: AtomicBool,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent read return altered bytes
    pub fn set_corrupt_reads(&self, corrupt: bool) {
        self.corrupt_reads.store(corrupt, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl SecretStore for MemorySecretStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn write(&self, key: &str, secret: &[u8]) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::store_operation("write", key, "write rejected"));
        }
        self.entries.write().insert(key.to_string(), secret.to_vec());
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let value = self.entries.read().get(key).cloned();
        if self.corrupt_reads.load(Ordering::SeqCst) {
            return Ok(value.map(|mut bytes| {
                bytes.push(0);
                bytes
            }));
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read_round_trips() {
        let store = MemorySecretStore::new();
        store.write("test", b"test").unwrap();
        assert_eq!(store.read("test").unwrap().as_deref(), Some(&b"test"[..]));
    }

    #[test]
    fn test_delete_is_idempotent() {
        let store = MemorySecretStore::new();
        store.write("test", b"test").unwrap();
        store.delete("test").unwrap();
        store.delete("test").unwrap();
        assert!(store.read("test").unwrap().is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_write_failure_switch() {
        let store = MemorySecretStore::new();
        store.set_fail_writes(true);
        assert!(store.write("test", b"test").is_err());
        assert_eq!(store.len(), 0);

        store.set_fail_writes(false);
        assert!(store.write("test", b"test").is_ok());
    }
}
