//! Keychain capability probe
//!
//! Clean slate, write, read back, compare. The outcome is cached on the
//! first run and returned unchanged for the lifetime of the probe.

use thiserror::Error;
use tracing::{debug, info, warn};

use super::SecretStore;
use crate::types::ProbeResult;

/// Bytes written by the probe
pub const PROBE_SECRET: &[u8] = b"test";

/// Why a probe run ended `Incapable`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeFailure {
    #[error("write failed: {0}")]
    Write(String),

    #[error("read failed: {0}")]
    Read(String),

    #[error("entry missing after write")]
    Missing,

    #[error("read back {actual} bytes that differ from the {expected} written")]
    Mismatch { expected: usize, actual: usize },
}

/// Memoized write/read self-test against a secret store
pub struct KeychainProbe {
    store: Box<dyn SecretStore>,
    account: String,
    cached: Option<ProbeResult>,
}

impl KeychainProbe {
    pub fn new(store: Box<dyn SecretStore>, account: impl Into<String>) -> Self {
        Self {
            store,
            account: account.into(),
            cached: None,
        }
    }

    /// The cached outcome, `Untested` before the first run
    pub fn result(&self) -> ProbeResult {
        self.cached.unwrap_or_default()
    }

    pub fn has_run(&self) -> bool {
        self.cached.is_some()
    }

    /// Run the probe once; later calls return the cached outcome
    pub fn ensure(&mut self) -> ProbeResult {
        if let Some(result) = self.cached {
            return result;
        }

        let result = match self.round_trip() {
            Ok(()) => ProbeResult::Capable,
            Err(failure) => {
                warn!(
                    store = self.store.name(),
                    account = %self.account,
                    error = %failure,
                    "Keychain probe failed"
                );
                ProbeResult::Incapable
            }
        };

        info!(store = self.store.name(), result = %result, "Keychain probe complete");
        self.cached = Some(result);
        result
    }

    fn round_trip(&self) -> std::result::Result<(), ProbeFailure> {
        // Stale entries from an earlier run must not satisfy the read
        if let Err(e) = self.store.delete(&self.account) {
            debug!(error = %e, "Pre-probe delete failed");
        }

        self.store
            .write(&self.account, PROBE_SECRET)
            .map_err(|e| ProbeFailure::Write(e.to_string()))?;

        let outcome = self.verify();

        // Once written, the entry is removed whatever the read-back says
        if let Err(e) = self.store.delete(&self.account) {
            debug!(error = %e, "Post-probe cleanup failed");
        }

        outcome
    }

    fn verify(&self) -> std::result::Result<(), ProbeFailure> {
        let read_back = self
            .store
            .read(&self.account)
            .map_err(|e| ProbeFailure::Read(e.to_string()))?
            .ok_or(ProbeFailure::Missing)?;

        if read_back != PROBE_SECRET {
            return Err(ProbeFailure::Mismatch {
                expected: PROBE_SECRET.len(),
                actual: read_back.len(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::{Error, Result};
    use crate::keychain::MemorySecretStore;

    /// Store whose reads always come back empty
    struct ForgetfulStore;

    impl SecretStore for ForgetfulStore {
        fn name(&self) -> &'static str {
            "forgetful"
        }

        fn delete(&self, _key: &str) -> Result<()> {
            Ok(())
        }

        fn write(&self, _key: &str, _secret: &[u8]) -> Result<()> {
            Ok(())
        }

        fn read(&self, _key: &str) -> Result<Option<Vec<u8>>> {
            Ok(None)
        }
    }

    /// Store whose deletes fail but which otherwise works
    struct StickyStore(MemorySecretStore);

    impl SecretStore for StickyStore {
        fn name(&self) -> &'static str {
            "sticky"
        }

        fn delete(&self, key: &str) -> Result<()> {
            Err(Error::store_operation("delete", key, "locked"))
        }

        fn write(&self, key: &str, secret: &[u8]) -> Result<()> {
            self.0.write(key, secret)
        }

        fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
            self.0.read(key)
        }
    }

    #[test]
    fn test_round_trip_is_capable() {
        let store = Arc::new(MemorySecretStore::new());
        let mut probe = KeychainProbe::new(Box::new(store.clone()), "test");

        assert_eq!(probe.result(), ProbeResult::Untested);
        assert_eq!(probe.ensure(), ProbeResult::Capable);
        assert!(probe.has_run());
        // cleaned up after itself
        assert!(store.read("test").unwrap().is_none());
    }

    #[test]
    fn test_failing_write_is_incapable_without_error() {
        let store = MemorySecretStore::new();
        store.set_fail_writes(true);
        let mut probe = KeychainProbe::new(Box::new(store), "test");

        assert_eq!(probe.ensure(), ProbeResult::Incapable);
    }

    #[test]
    fn test_missing_entry_is_incapable() {
        let mut probe = KeychainProbe::new(Box::new(ForgetfulStore), "test");
        assert_eq!(probe.round_trip(), Err(ProbeFailure::Missing));
        assert_eq!(probe.ensure(), ProbeResult::Incapable);
    }

    #[test]
    fn test_corrupted_read_is_mismatch() {
        let store = Arc::new(MemorySecretStore::new());
        store.set_corrupt_reads(true);
        let probe = KeychainProbe::new(Box::new(store.clone()), "test");

        assert_eq!(
            probe.round_trip(),
            Err(ProbeFailure::Mismatch {
                expected: 4,
                actual: 5
            })
        );
        // entry removed even though the read-back failed
        store.set_corrupt_reads(false);
        assert!(store.read("test").unwrap().is_none());
    }

    #[test]
    fn test_stale_entry_does_not_mask_failed_write() {
        let store = Arc::new(MemorySecretStore::new());
        store.write("test", PROBE_SECRET).unwrap();
        store.set_fail_writes(true);

        let mut probe = KeychainProbe::new(Box::new(store), "test");
        assert_eq!(probe.ensure(), ProbeResult::Incapable);
    }

    #[test]
    fn test_delete_failure_alone_does_not_fail_probe() {
        let mut probe = KeychainProbe::new(Box::new(StickyStore(MemorySecretStore::new())), "test");
        assert_eq!(probe.ensure(), ProbeResult::Capable);
    }

    #[test]
    fn test_result_is_memoized_when_store_changes() {
        let store = Arc::new(MemorySecretStore::new());
        let mut probe = KeychainProbe::new(Box::new(store.clone()), "test");

        assert_eq!(probe.ensure(), ProbeResult::Capable);
        store.set_fail_writes(true);
        assert_eq!(probe.ensure(), ProbeResult::Capable);
        assert_eq!(probe.result(), ProbeResult::Capable);
    }
}
