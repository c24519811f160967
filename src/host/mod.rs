//! Host facts collection
//!
//! Provides:
//! - The `HostFactsProvider` capability trait with a single batched accessor
//! - `SystemHostFacts`, backed by sysinfo, crossterm and `/proc`
//! - A fake provider for tests

mod system;
#[cfg(test)]
mod fake;

pub use system::*;
#[cfg(test)]
pub use fake::*;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::types::FactMap;

/// One host field could not be read
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field} unavailable: {reason}")]
pub struct FieldUnavailable {
    pub field: &'static str,
    pub reason: String,
}

impl FieldUnavailable {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Result of reading one host field
pub type FieldResult<T> = std::result::Result<T, FieldUnavailable>;

/// Everything the host reports in one batch
#[derive(Debug, Clone)]
pub struct HostFacts {
    pub now: DateTime<Utc>,
    pub display: FieldResult<FactMap>,
    pub device: FieldResult<FactMap>,
    pub process: FieldResult<FactMap>,
    pub libraries: FieldResult<Vec<String>>,
}

/// Read-only access to host platform facts
///
/// Implementations must not panic on a missing field; they report it as
/// `FieldUnavailable` and carry on with the rest of the batch.
pub trait HostFactsProvider {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Read all facts at once
    fn collect(&mut self) -> HostFacts;
}

impl<P: HostFactsProvider + ?Sized> HostFactsProvider for Box<P> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn collect(&mut self) -> HostFacts {
        (**self).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_unavailable_display() {
        let err = FieldUnavailable::new("display_metrics", "stdout is not a terminal");
        assert_eq!(
            err.to_string(),
            "display_metrics unavailable: stdout is not a terminal"
        );
    }

    #[test]
    fn test_boxed_provider_delegates() {
        let mut provider: Box<dyn HostFactsProvider> = Box::new(FakeHostFacts::new());
        assert_eq!(provider.name(), "fake");
        assert!(provider.collect().device.is_ok());
    }
}
