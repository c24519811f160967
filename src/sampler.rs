//! Snapshot sampler
//!
//! Turns one batch of host facts into a `Snapshot`. A capture never fails:
//! each unreadable field is carried as `Sampled::Unavailable` and the rest
//! of the snapshot is unaffected.

use tracing::{debug, trace};

use crate::config::{OverlayConfig, ProbeMode};
use crate::host::{FieldResult, HostFactsProvider, SystemHostFacts};
use crate::keychain::{self, KeychainProbe};
use crate::types::{ProbeResult, Sampled, Snapshot};

/// Produces snapshots from a host provider and a memoized keychain probe
pub struct Sampler {
    host: Box<dyn HostFactsProvider>,
    probe: KeychainProbe,
    probe_mode: ProbeMode,
}

impl Sampler {
    pub fn new(host: Box<dyn HostFactsProvider>, probe: KeychainProbe, probe_mode: ProbeMode) -> Self {
        Self {
            host,
            probe,
            probe_mode,
        }
    }

    /// Sampler wired to the real host and the configured secret store
    pub fn from_config(config: &OverlayConfig) -> Self {
        let store = keychain::open_store(&config.keychain);
        debug!(
            store = store.name(),
            probe = ?config.keychain.probe,
            "Secret store selected"
        );
        Self::new(
            Box::new(SystemHostFacts::new(&config.sampler)),
            KeychainProbe::new(store, config.keychain.account.clone()),
            config.keychain.probe,
        )
    }

    pub fn probe_mode(&self) -> ProbeMode {
        self.probe_mode
    }

    /// Run the keychain probe ahead of the first capture
    pub fn prime(&mut self) -> ProbeResult {
        match self.probe_mode {
            ProbeMode::Disabled => ProbeResult::Untested,
            ProbeMode::Lazy | ProbeMode::Eager => self.probe.ensure(),
        }
    }

    /// Current probe outcome without running it
    pub fn probe_result(&self) -> ProbeResult {
        self.probe.result()
    }

    /// Capture one snapshot numbered `previous_index + 1`
    pub fn capture(&mut self, previous_index: u64) -> Snapshot {
        let facts = self.host.collect();
        let keychain_probe = self.prime();

        let snapshot = Snapshot {
            sequence_index: previous_index + 1,
            timestamp: facts.now,
            display_metrics: sampled(facts.display),
            device_info: sampled(facts.device),
            process_info: sampled(facts.process),
            loaded_libraries: sampled(facts.libraries),
            keychain_probe,
        };

        trace!(
            index = snapshot.sequence_index,
            host = self.host.name(),
            unavailable = snapshot.unavailable_fields(),
            "Snapshot captured"
        );
        snapshot
    }
}

fn sampled<T>(field: FieldResult<T>) -> Sampled<T> {
    match field {
        Ok(value) => Sampled::Value(value),
        Err(unavailable) => {
            debug!(field = unavailable.field, reason = %unavailable.reason, "Host field unavailable");
            Sampled::Unavailable(unavailable.reason)
        }
    }
}
