//! Snapshot rendering
//!
//! The text screen mirrors the overlay layout: a time block, then one
//! section per host field, then the keychain probe result.

use std::fmt::{Display, Write as _};

use chrono::{Local, TimeZone};

use crate::error::Result;
use crate::refresh::LoopState;
use crate::types::{FactMap, Sampled, Snapshot, UNAVAILABLE};
use crate::version;

const LABEL_WIDTH: usize = 15;

/// Render a snapshot as text, with local time shown in the host timezone
pub fn render_text(snapshot: &Snapshot) -> String {
    render_text_in(snapshot, &Local)
}

/// Render a snapshot as text, with local time shown in `tz`
pub fn render_text_in<Tz>(snapshot: &Snapshot, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut out = String::new();
    let local = snapshot.timestamp.with_timezone(tz);

    let _ = writeln!(out, "{}", version::build_info().header_line());
    let _ = writeln!(out, "{}", "═".repeat(60));
    line(&mut out, "Index", snapshot.sequence_index);
    line(&mut out, "Date", snapshot.timestamp.format("%Y-%m-%d %H:%M:%S %z"));
    line(&mut out, "Time", snapshot.timestamp.timestamp());
    line(&mut out, "Readable Time", local.format("%a %b %e %H:%M:%S %Y"));
    line(&mut out, "TimeZone", local.format("%:z"));

    facts_section(&mut out, "Display", &snapshot.display_metrics);
    facts_section(&mut out, "Device", &snapshot.device_info);
    facts_section(&mut out, "Process", &snapshot.process_info);

    match &snapshot.loaded_libraries {
        Sampled::Value(libraries) => {
            let _ = writeln!(out, "\n[Libraries] ({})", libraries.len());
            for library in libraries {
                let _ = writeln!(out, "  {}", library);
            }
        }
        Sampled::Unavailable(reason) => {
            let _ = writeln!(out, "\n[Libraries]");
            let _ = writeln!(out, "  {} ({})", UNAVAILABLE, reason);
        }
    }

    let _ = writeln!(out, "\n[Keychain]");
    let _ = writeln!(out, "  probe: {}", snapshot.keychain_probe);

    out
}

/// Status line shown under the interactive screen
pub fn render_footer(state: LoopState, status: Option<&str>) -> String {
    let mut out = format!(
        "\n[p] pause/resume  [r] refresh  [s] export  [q] quit    ({})\n",
        state
    );
    if let Some(status) = status {
        let _ = writeln!(out, "{}", status);
    }
    out
}

/// Render a snapshot as JSON, one line unless `pretty`
pub fn render_json(snapshot: &Snapshot, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(snapshot)?
    } else {
        serde_json::to_string(snapshot)?
    };
    Ok(json)
}

fn line(out: &mut String, label: &str, value: impl Display) {
    let label = format!("{}:", label);
    let _ = writeln!(out, "{:<width$}{}", label, value, width = LABEL_WIDTH);
}

fn facts_section(out: &mut String, title: &str, facts: &Sampled<FactMap>) {
    let _ = writeln!(out, "\n[{}]", title);
    match facts {
        Sampled::Value(facts) if facts.is_empty() => {
            let _ = writeln!(out, "  (none)");
        }
        Sampled::Value(facts) => {
            for (key, value) in facts {
                let _ = writeln!(out, "  {}: {}", key, value);
            }
        }
        Sampled::Unavailable(reason) => {
            let _ = writeln!(out, "  {} ({})", UNAVAILABLE, reason);
        }
    }
}
