//! Build script for debuginfo
//!
//! Embeds the git revision, build timestamp, target and compiler version
//! so `debuginfo version` and the overlay header can report them.

use std::env;
use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/index");

    let git_hash = run_trimmed("git", &["rev-parse", "--short=8", "HEAD"]);
    let git_branch = run_trimmed("git", &["rev-parse", "--abbrev-ref", "HEAD"]);
    let git_dirty = match run_trimmed("git", &["status", "--porcelain"]).as_str() {
        "unknown" => "unknown",
        "" => "false",
        _ => "true",
    };

    let vars = [
        ("DEBUGINFO_GIT_HASH", git_hash),
        ("DEBUGINFO_GIT_BRANCH", git_branch),
        ("DEBUGINFO_GIT_DIRTY", git_dirty.to_string()),
        (
            "DEBUGINFO_BUILD_TIMESTAMP",
            chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        ),
        ("DEBUGINFO_TARGET", env_or_unknown("TARGET")),
        ("DEBUGINFO_PROFILE", env_or_unknown("PROFILE")),
        ("DEBUGINFO_HOST", env_or_unknown("HOST")),
        ("DEBUGINFO_RUSTC_VERSION", run_trimmed("rustc", &["--version"])),
    ];

    for (key, value) in &vars {
        println!("cargo:rustc-env={}={}", key, value);
    }
}

fn env_or_unknown(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| "unknown".to_string())
}

/// Run a command and return its trimmed stdout, or "unknown" on any failure.
/// A successful command with empty output yields an empty string.
fn run_trimmed(program: &str, args: &[&str]) -> String {
    Command::new(program)
        .args(args)
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
