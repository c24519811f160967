//! Configuration system for debuginfo
//!
//! Supports multiple configuration sources with the following precedence (highest to lowest):
//! 1. CLI arguments
//! 2. Environment variables (DEBUGINFO_* prefix)
//! 3. Configuration file (TOML)
//! 4. Default values

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::keychain;

/// Main overlay configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Sampling and refresh settings
    pub sampler: SamplerSettings,

    /// Secure storage probe settings
    pub keychain: KeychainSettings,

    /// Rendering settings
    pub display: DisplaySettings,

    /// Screen export settings
    pub export: ExportSettings,

    /// Logging configuration
    pub logging: LoggingSettings,
}

/// Sampling and refresh settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerSettings {
    /// Refresh period in milliseconds
    pub interval_ms: u64,

    /// Include the full process environment in process info
    pub include_environment: bool,

    /// Enumerate loaded dynamic libraries on every capture
    pub include_libraries: bool,

    /// Maximum number of libraries to keep per snapshot (0 = no limit)
    pub max_libraries: usize,
}

/// Which secure store backs the keychain probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Owner-only files under `store_dir`
    File,
    /// Process-local map, useful where no writable location exists
    Memory,
}

/// When the keychain probe runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeMode {
    /// On the first capture
    Lazy,
    /// When the refresh loop starts
    Eager,
    /// Never; snapshots report `untested`
    Disabled,
}

/// Secure storage probe settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeychainSettings {
    /// Store backend: file or memory
    pub backend: StoreBackend,

    /// Probe timing: lazy, eager or disabled
    pub probe: ProbeMode,

    /// Fixed account key used by the probe
    pub account: String,

    /// Directory for the file backend
    pub store_dir: String,
}

/// Output format for rendered snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Text,
    Json,
}

/// Rendering settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    /// Output format
    pub format: OutputFormat,

    /// Clear the terminal before each redraw
    pub clear_screen: bool,
}

/// Screen export settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    /// Directory that receives exported screens
    pub dir: String,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level: trace, debug, info, warn, error
    pub level: String,

    /// Log file path (empty = no file logging)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Number of rotated log files to keep
    pub max_files: u32,

    /// Enable JSON formatted logging
    pub json_format: bool,
}

impl Default for SamplerSettings {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            include_environment: true,
            include_libraries: true,
            max_libraries: 0,
        }
    }
}

impl Default for KeychainSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::File,
            probe: ProbeMode::Lazy,
            account: "test".to_string(),
            store_dir: "~/.debuginfo/keychain".to_string(),
        }
    }
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            clear_screen: true,
        }
    }
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            dir: ".".to_string(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            max_files: 5,
            json_format: false,
        }
    }
}

impl SamplerSettings {
    /// Refresh period as a duration
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl OverlayConfig {
    /// Load configuration from file with environment variable overrides
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = Self::find_config_file(config_path)? {
            debug!(path = %path.display(), "Loading configuration file");
            config = Self::from_file(&path)?;
            info!(path = %path.display(), "Configuration loaded from file");
        }

        config.apply_env_overrides();
        config.expand_paths();
        config.validate()?;

        Ok(config)
    }

    /// Parse a configuration file without applying overrides
    fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::IoRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| Error::ConfigParse {
            message: format!("{}: {}", path.display(), e.message()),
            source: Some(e),
        })
    }

    /// Find the configuration file to use
    fn find_config_file(explicit_path: Option<&str>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit_path {
            let path = PathBuf::from(expand_path(path));
            if path.exists() {
                return Ok(Some(path));
            }
            return Err(Error::config_not_found(path));
        }

        let search_paths = [
            Some(PathBuf::from("debuginfo.toml")),
            dirs::config_dir().map(|p| p.join("debuginfo").join("config.toml")),
            dirs::home_dir().map(|p| p.join(".debuginfo").join("config.toml")),
        ];

        for path in search_paths.iter().flatten() {
            if path.exists() {
                debug!(path = %path.display(), "Found configuration file");
                return Ok(Some(path.clone()));
            }
        }

        debug!("No configuration file found, using defaults");
        Ok(None)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // Sampler settings
        if let Some(n) = env_parse("DEBUGINFO_INTERVAL_MS") {
            self.sampler.interval_ms = n;
        }
        if let Some(b) = env_bool("DEBUGINFO_INCLUDE_ENVIRONMENT") {
            self.sampler.include_environment = b;
        }
        if let Some(b) = env_bool("DEBUGINFO_INCLUDE_LIBRARIES") {
            self.sampler.include_libraries = b;
        }
        if let Some(n) = env_parse("DEBUGINFO_MAX_LIBRARIES") {
            self.sampler.max_libraries = n;
        }

        // Keychain settings
        if let Ok(val) = std::env::var("DEBUGINFO_KEYCHAIN_BACKEND") {
            match val.to_lowercase().as_str() {
                "file" => self.keychain.backend = StoreBackend::File,
                "memory" => self.keychain.backend = StoreBackend::Memory,
                other => debug!(value = other, "Ignoring unknown DEBUGINFO_KEYCHAIN_BACKEND"),
            }
        }
        if let Ok(val) = std::env::var("DEBUGINFO_KEYCHAIN_PROBE") {
            match val.to_lowercase().as_str() {
                "lazy" => self.keychain.probe = ProbeMode::Lazy,
                "eager" => self.keychain.probe = ProbeMode::Eager,
                "disabled" => self.keychain.probe = ProbeMode::Disabled,
                other => debug!(value = other, "Ignoring unknown DEBUGINFO_KEYCHAIN_PROBE"),
            }
        }
        if let Ok(val) = std::env::var("DEBUGINFO_KEYCHAIN_DIR") {
            self.keychain.store_dir = val;
        }

        // Display and export settings
        if let Some(b) = env_bool("DEBUGINFO_JSON") {
            self.display.format = if b { OutputFormat::Json } else { OutputFormat::Text };
        }
        if let Some(b) = env_bool("DEBUGINFO_CLEAR_SCREEN") {
            self.display.clear_screen = b;
        }
        if let Ok(val) = std::env::var("DEBUGINFO_EXPORT_DIR") {
            self.export.dir = val;
        }

        // Logging settings
        if let Ok(val) = std::env::var("DEBUGINFO_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("DEBUGINFO_LOG_FILE") {
            self.logging.file = Some(val);
        }
        if let Some(b) = env_bool("DEBUGINFO_LOG_JSON") {
            self.logging.json_format = b;
        }
    }

    /// Expand ~ and other path variables
    fn expand_paths(&mut self) {
        self.keychain.store_dir = expand_path(&self.keychain.store_dir);
        self.export.dir = expand_path(&self.export.dir);

        if let Some(ref file) = self.logging.file {
            self.logging.file = Some(expand_path(file));
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.sampler.interval_ms == 0 {
            return Err(Error::config_field_invalid(
                "sampler.interval_ms",
                "interval_ms must be greater than 0",
            ));
        }

        if let Err(reason) = keychain::validate_key(&self.keychain.account) {
            return Err(Error::config_field_invalid(
                "keychain.account",
                format!("account '{}' is not a valid key: {}", self.keychain.account, reason),
            ));
        }
        if self.keychain.backend == StoreBackend::File && self.keychain.store_dir.is_empty() {
            return Err(Error::config_field_invalid(
                "keychain.store_dir",
                "store_dir is required for the file backend",
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(Error::config_field_invalid(
                "logging.level",
                format!(
                    "Invalid log level '{}'. Must be one of: {}",
                    self.logging.level,
                    valid_levels.join(", ")
                ),
            ));
        }

        Ok(())
    }

    /// Get the keychain store directory as a PathBuf
    pub fn store_dir(&self) -> PathBuf {
        PathBuf::from(&self.keychain.store_dir)
    }

    /// Get the export directory as a PathBuf
    pub fn export_dir(&self) -> PathBuf {
        PathBuf::from(&self.export.dir)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|val| val.parse().ok())
}

fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .map(|val| val.to_lowercase() == "true" || val == "1")
}

/// Expand ~ and environment variables in paths
fn expand_path(path: &str) -> String {
    shellexpand::full(path)
        .unwrap_or(std::borrow::Cow::Borrowed(path))
        .into_owned()
}

/// Initialize a new configuration file
pub fn init_config(path: Option<&str>, force: bool) -> Result<PathBuf> {
    let config_path = path
        .map(|p| PathBuf::from(expand_path(p)))
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".debuginfo")
                .join("config.toml")
        });

    if config_path.exists() && !force {
        return Err(Error::config_field_invalid(
            "path",
            format!(
                "Configuration file already exists: {}. Use --force to overwrite.",
                config_path.display()
            ),
        ));
    }

    if let Some(parent) = config_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| Error::IoWrite {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
    }

    fs::write(&config_path, DEFAULT_CONFIG).map_err(|e| Error::IoWrite {
        path: config_path.clone(),
        source: e,
    })?;

    Ok(config_path)
}

/// Default configuration content with comments
const DEFAULT_CONFIG: &str = r#"# debuginfo configuration

[sampler]
# Refresh period in milliseconds
interval_ms = 1000

# Include the full process environment in process info
include_environment = true

# Enumerate loaded dynamic libraries on every capture
include_libraries = true

# Maximum number of libraries to keep per snapshot (0 = no limit)
max_libraries = 0

[keychain]
# Secure store backend: "file" or "memory"
backend = "file"

# When to run the write/read probe: "lazy", "eager" or "disabled"
probe = "lazy"

# Fixed account key used by the probe
account = "test"

# Directory for the file backend
store_dir = "~/.debuginfo/keychain"

[display]
# Output format: "text" or "json"
format = "text"

# Clear the terminal before each redraw
clear_screen = true

[export]
# Directory that receives exported screens
dir = "."

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log file path (comment out to disable file logging)
# file = "~/.debuginfo/logs/debuginfo.log"

# Number of rotated log files to keep
max_files = 5

# Enable JSON formatted logging
json_format = false
"#;
