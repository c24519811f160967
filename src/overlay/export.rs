//! Screen export
//!
//! Writes the rendered text of one snapshot to
//! `<dir>/debuginfo-<index>-<timestamp>.txt`. Each export is a new file;
//! nothing is ever read back.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{Error, Result};
use crate::types::Snapshot;

/// File name for an exported screen
pub fn export_file_name(snapshot: &Snapshot) -> String {
    format!(
        "debuginfo-{}-{}.txt",
        snapshot.sequence_index,
        snapshot.timestamp.format("%Y%m%dT%H%M%SZ")
    )
}

/// Write `screen` for `snapshot` into `dir`, returning the file path
pub fn export_screen(dir: &Path, snapshot: &Snapshot, screen: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir).map_err(|e| Error::ExportFailed {
        path: dir.to_path_buf(),
        message: e.to_string(),
    })?;

    let path = dir.join(export_file_name(snapshot));
    fs::write(&path, screen).map_err(|e| Error::ExportFailed {
        path: path.clone(),
        message: e.to_string(),
    })?;

    info!(
        path = %path.display(),
        index = snapshot.sequence_index,
        bytes = screen.len(),
        "Screen exported"
    );
    Ok(path)
}
