//! Error types for debuginfo
//!
//! Provides structured error handling with:
//! - Numeric error codes for machine parsing
//! - User-friendly messages with suggestions
//! - Exit codes for CLI
//!
//! Failures inside a single capture never reach this type: an unreadable
//! host field becomes a sentinel and a failed secure-storage probe becomes
//! `Incapable`. What remains here are the errors a command can actually
//! return to the user.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::refresh::LoopState;

/// Result type alias for debuginfo operations
pub type Result<T> = std::result::Result<T, Error>;

/// Numeric error codes for machine parsing and documentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    // Configuration errors (1xx)
    ConfigNotFound = 100,
    ConfigParseError = 101,
    ConfigValidation = 102,

    // IO errors (2xx)
    IoRead = 200,
    IoWrite = 201,
    IoPermission = 202,
    IoNotFound = 203,

    // Secure storage errors (3xx)
    StoreUnavailable = 300,
    StoreOperation = 301,

    // Refresh loop errors (4xx)
    InvalidTransition = 400,

    // Export errors (5xx)
    ExportFailed = 500,
    SerializeFailed = 501,

    // Internal errors (9xx)
    InternalError = 900,
}

impl ErrorCode {
    /// Get the string code (e.g., "E100")
    pub fn as_str(&self) -> String {
        format!("E{}", *self as u16)
    }

    /// Get the exit code for CLI
    pub fn exit_code(&self) -> i32 {
        match *self as u16 {
            100..=199 => 10,
            200..=299 => 20,
            300..=399 => 30,
            400..=499 => 40,
            500..=599 => 50,
            900..=999 => 90,
            _ => 1,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type
#[derive(Error, Debug)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Configuration parse error
    #[error("Failed to parse configuration: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<toml::de::Error>,
    },

    /// Configuration validation error
    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String, field: Option<String> },

    // ─────────────────────────────────────────────────────────────
    // IO Errors
    // ─────────────────────────────────────────────────────────────

    /// File read error
    #[error("Failed to read file: {path}")]
    IoRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File write error
    #[error("Failed to write file: {path}")]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    Toml(#[from] toml::ser::Error),

    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // ─────────────────────────────────────────────────────────────
    // Secure Storage Errors
    // ─────────────────────────────────────────────────────────────

    /// The secure store could not be opened at all
    #[error("Secure storage unavailable at {path}: {message}")]
    StoreUnavailable { path: PathBuf, message: String },

    /// A single store operation failed
    #[error("Secure storage {operation} failed for '{key}': {message}")]
    StoreOperation {
        operation: &'static str,
        key: String,
        message: String,
    },

    // ─────────────────────────────────────────────────────────────
    // Refresh Loop Errors
    // ─────────────────────────────────────────────────────────────

    /// A command is not valid in the loop's current state
    #[error("Cannot {command} a refresh loop that is {state}")]
    InvalidTransition {
        command: &'static str,
        state: LoopState,
    },

    // ─────────────────────────────────────────────────────────────
    // Export Errors
    // ─────────────────────────────────────────────────────────────

    /// Screen export failed
    #[error("Failed to export screen to {path}: {message}")]
    ExportFailed { path: PathBuf, message: String },

    // ─────────────────────────────────────────────────────────────
    // Internal Errors
    // ─────────────────────────────────────────────────────────────

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Get the numeric error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::ConfigNotFound { .. } => ErrorCode::ConfigNotFound,
            Error::ConfigParse { .. } => ErrorCode::ConfigParseError,
            Error::ConfigValidation { .. } => ErrorCode::ConfigValidation,

            Error::IoRead { .. } => ErrorCode::IoRead,
            Error::IoWrite { .. } => ErrorCode::IoWrite,
            Error::Io(e) => match e.kind() {
                std::io::ErrorKind::NotFound => ErrorCode::IoNotFound,
                std::io::ErrorKind::PermissionDenied => ErrorCode::IoPermission,
                _ => ErrorCode::IoRead,
            },
            Error::Toml(_) => ErrorCode::ConfigParseError,
            Error::Json(_) => ErrorCode::SerializeFailed,

            Error::StoreUnavailable { .. } => ErrorCode::StoreUnavailable,
            Error::StoreOperation { .. } => ErrorCode::StoreOperation,

            Error::InvalidTransition { .. } => ErrorCode::InvalidTransition,

            Error::ExportFailed { .. } => ErrorCode::ExportFailed,

            Error::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Check if the error should end the process
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::ConfigNotFound { .. }
                | Error::ConfigParse { .. }
                | Error::ConfigValidation { .. }
                | Error::Internal(_)
        )
    }

    /// Get the exit code for CLI
    pub fn exit_code(&self) -> i32 {
        self.code().exit_code()
    }

    /// Get a user-friendly suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Error::ConfigNotFound { .. } => {
                Some("Run 'debuginfo config init' to create a default configuration file.")
            }
            Error::ConfigParse { .. } => Some(
                "Check your configuration file syntax. Run 'debuginfo config validate' to see details.",
            ),
            Error::ConfigValidation { .. } => {
                Some("Review the configuration file and fix the invalid values.")
            }
            Error::StoreUnavailable { .. } => Some(
                "Check that keychain.store_dir is writable, or set keychain.backend = \"memory\".",
            ),
            Error::InvalidTransition { .. } => Some("Start the refresh loop before pausing or resuming it."),
            Error::ExportFailed { .. } => Some("Check that export.dir exists and is writable."),
            _ => None,
        }
    }

    /// Format the error for terminal display with colors
    pub fn format_for_terminal(&self) -> String {
        let mut output = format!("\x1b[31mError [{}]\x1b[0m: {}\n", self.code().as_str(), self);

        if let Some(hint) = self.suggestion() {
            output.push_str(&format!("\n\x1b[33mHint\x1b[0m: {}\n", hint));
        }

        output
    }

    /// Format the error for logging (no colors)
    pub fn format_for_log(&self) -> String {
        format!("[{}] {}", self.code().as_str(), self)
    }
}

impl Error {
    /// Create a config not found error
    pub fn config_not_found(path: impl Into<PathBuf>) -> Self {
        Error::ConfigNotFound { path: path.into() }
    }

    /// Create a config validation error with field name
    pub fn config_field_invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ConfigValidation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a store operation error
    pub fn store_operation(
        operation: &'static str,
        key: impl Into<String>,
        message: impl ToString,
    ) -> Self {
        Error::StoreOperation {
            operation,
            key: key.into(),
            message: message.to_string(),
        }
    }
}
