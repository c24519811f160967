//! Snapshot type definitions
//!
//! A `Snapshot` is one immutable capture of host facts plus its sequence
//! index. Host-sourced fields are wrapped in `Sampled` so a single failed
//! read is carried as an explicit marker instead of aborting the capture.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// String sentinel for a single value that could not be read
pub const UNAVAILABLE: &str = "unavailable";

/// Key/value facts with deterministic ordering
pub type FactMap = BTreeMap<String, String>;

// ─────────────────────────────────────────────────────────────────
// Sampled Field
// ─────────────────────────────────────────────────────────────────

/// A host field as it was observed at capture time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "data", rename_all = "lowercase")]
pub enum Sampled<T> {
    /// The field was read
    Value(T),
    /// The field could not be read; the reason is kept for display
    Unavailable(String),
}

impl<T> Sampled<T> {
    pub fn is_available(&self) -> bool {
        matches!(self, Sampled::Value(_))
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Sampled::Value(v) => Some(v),
            Sampled::Unavailable(_) => None,
        }
    }
}

impl<T, E: fmt::Display> From<std::result::Result<T, E>> for Sampled<T> {
    fn from(result: std::result::Result<T, E>) -> Self {
        match result {
            Ok(v) => Sampled::Value(v),
            Err(e) => Sampled::Unavailable(e.to_string()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Probe Result
// ─────────────────────────────────────────────────────────────────

/// Outcome of the secure-storage write/read probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeResult {
    /// The probe has not run (or is disabled)
    #[default]
    Untested,
    /// Write then read returned the exact bytes
    Capable,
    /// Some step failed or the bytes differed
    Incapable,
}

impl fmt::Display for ProbeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProbeResult::Untested => "untested",
            ProbeResult::Capable => "capable",
            ProbeResult::Incapable => "incapable",
        };
        f.write_str(s)
    }
}

// ─────────────────────────────────────────────────────────────────
// Snapshot
// ─────────────────────────────────────────────────────────────────

/// One capture of host and environment state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Position in the capture sequence, starting at 1 for the first capture
    pub sequence_index: u64,

    /// Wall-clock time of capture
    pub timestamp: DateTime<Utc>,

    /// Display geometry (terminal size in cells and pixels)
    pub display_metrics: Sampled<FactMap>,

    /// Device identity (host name, OS, CPU, memory)
    pub device_info: Sampled<FactMap>,

    /// Process metadata (pid, name, arguments, environment)
    pub process_info: Sampled<FactMap>,

    /// Dynamic libraries mapped into this process, in load order
    pub loaded_libraries: Sampled<Vec<String>>,

    /// Secure-storage capability, memoized for the sampler's lifetime
    pub keychain_probe: ProbeResult,
}

impl Snapshot {
    /// Number of host fields that could not be read
    pub fn unavailable_fields(&self) -> usize {
        [
            self.display_metrics.is_available(),
            self.device_info.is_available(),
            self.process_info.is_available(),
            self.loaded_libraries.is_available(),
        ]
        .iter()
        .filter(|available| !**available)
        .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sampled_from_result() {
        let ok: Sampled<u32> = Ok::<_, std::io::Error>(7).into();
        assert_eq!(ok.value(), Some(&7));

        let err: Sampled<u32> =
            Err::<u32, _>(std::io::Error::new(std::io::ErrorKind::Other, "no tty")).into();
        assert!(!err.is_available());
        assert_eq!(err, Sampled::Unavailable("no tty".to_string()));
    }

    #[test]
    fn test_sampled_serialization_marks_status() {
        let field: Sampled<Vec<String>> = Sampled::Unavailable("not supported".to_string());
        let json = serde_json::to_value(&field).unwrap();
        assert_eq!(json["status"], "unavailable");
        assert_eq!(json["data"], "not supported");
    }

    #[test]
    fn test_probe_result_display() {
        assert_eq!(ProbeResult::default(), ProbeResult::Untested);
        assert_eq!(ProbeResult::Capable.to_string(), "capable");
        assert_eq!(
            serde_json::to_string(&ProbeResult::Incapable).unwrap(),
            "\"incapable\""
        );
    }

    #[test]
    fn test_unavailable_fields() {
        let snapshot = Snapshot {
            sequence_index: 1,
            timestamp: Utc::now(),
            display_metrics: Sampled::Unavailable("no terminal".to_string()),
            device_info: Sampled::Value(FactMap::new()),
            process_info: Sampled::Value(FactMap::new()),
            loaded_libraries: Sampled::Unavailable("not supported".to_string()),
            keychain_probe: ProbeResult::Untested,
        };
        assert_eq!(snapshot.unavailable_fields(), 2);
    }
}
