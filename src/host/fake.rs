//! Fake host facts provider for unit testing

use chrono::{DateTime, TimeZone, Utc};

use super::{FieldResult, FieldUnavailable, HostFacts, HostFactsProvider};
use crate::types::FactMap;

/// Deterministic provider; each field can be switched to unavailable
#[derive(Debug, Clone)]
pub struct FakeHostFacts {
    pub now: DateTime<Utc>,
    pub display: FieldResult<FactMap>,
    pub device: FieldResult<FactMap>,
    pub process: FieldResult<FactMap>,
    pub libraries: FieldResult<Vec<String>>,
}

impl FakeHostFacts {
    pub fn new() -> Self {
        Self {
            now: Utc.with_ymd_and_hms(2023, 1, 29, 12, 0, 0).unwrap(),
            display: Ok(facts(&[("columns", "120"), ("rows", "40")])),
            device: Ok(facts(&[("name", "test-host"), ("system_name", "Linux")])),
            process: Ok(facts(&[("pid", "4242"), ("process_name", "debuginfo")])),
            libraries: Ok(vec![
                "/usr/lib/libc.so.6".to_string(),
                "/usr/lib/libm.so.6".to_string(),
            ]),
        }
    }

    pub fn with_unavailable_display(mut self, reason: &str) -> Self {
        self.display = Err(FieldUnavailable::new("display_metrics", reason));
        self
    }

    pub fn with_unavailable_libraries(mut self, reason: &str) -> Self {
        self.libraries = Err(FieldUnavailable::new("loaded_libraries", reason));
        self
    }
}

impl Default for FakeHostFacts {
    fn default() -> Self {
        Self::new()
    }
}

impl HostFactsProvider for FakeHostFacts {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn collect(&mut self) -> HostFacts {
        HostFacts {
            now: self.now,
            display: self.display.clone(),
            device: self.device.clone(),
            process: self.process.clone(),
            libraries: self.libraries.clone(),
        }
    }
}

fn facts(pairs: &[(&str, &str)]) -> FactMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
