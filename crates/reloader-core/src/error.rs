//! Application error types with rich context

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Application error types organized by layer/domain
#[derive(Debug, Error)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Common/Infrastructure Errors
    // ─────────────────────────────────────────────────────────────
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Operation interrupted by user")]
    Interrupted,

    // ─────────────────────────────────────────────────────────────
    // Transfer Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Timed out connecting to {address} after {timeout_ms}ms")]
    ConnectTimeout { address: String, timeout_ms: u64 },

    #[error("Failed to connect to {address}: {reason}")]
    Connect { address: String, reason: String },

    #[error("Transfer to {address} failed: {reason}")]
    Transfer { address: String, reason: String },

    #[error("Artifact not found: {path}")]
    ArtifactNotFound { path: PathBuf },

    // ─────────────────────────────────────────────────────────────
    // Subprocess Errors
    // ─────────────────────────────────────────────────────────────
    #[error("'{tool}' not found. Ensure it is installed and in your PATH.")]
    ToolNotFound { tool: String },

    #[error("Failed to spawn '{program}': {reason}")]
    ProcessSpawn { program: String, reason: String },

    #[error("'{command}' exited with code {code:?}: {stderr}")]
    Subprocess {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Process error: {message}")]
    Process { message: String },

    // ─────────────────────────────────────────────────────────────
    // Screen / Hot Reload Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Invalid screen name '{name}': {reason}")]
    ScreenName { name: String, reason: String },

    #[error("Screen not registered: {name}")]
    UnknownScreen { name: String },

    #[error("Failed to reload screen '{screen}': {message}")]
    Reload { screen: String, message: String },

    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid configuration: {message}")]
    ConfigInvalid { message: String },
}

// ─────────────────────────────────────────────────────────────────
// Convenience Constructors
// ─────────────────────────────────────────────────────────────────

impl Error {
    pub fn connect(address: impl Into<String>, reason: impl ToString) -> Self {
        Self::Connect {
            address: address.into(),
            reason: reason.to_string(),
        }
    }

    pub fn transfer(address: impl Into<String>, reason: impl ToString) -> Self {
        Self::Transfer {
            address: address.into(),
            reason: reason.to_string(),
        }
    }

    pub fn tool_not_found(tool: impl Into<String>) -> Self {
        Self::ToolNotFound { tool: tool.into() }
    }

    pub fn process(message: impl Into<String>) -> Self {
        Self::Process {
            message: message.into(),
        }
    }

    pub fn screen_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ScreenName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn reload(screen: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Reload {
            screen: screen.into(),
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn config_invalid(message: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            message: message.into(),
        }
    }

    /// Check if this is a recoverable error
    ///
    /// Recoverable errors are isolated to one device, one subprocess step or
    /// one screen and never abort sibling operations.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::ConnectTimeout { .. }
                | Error::Connect { .. }
                | Error::Transfer { .. }
                | Error::Subprocess { .. }
                | Error::Process { .. }
                | Error::Reload { .. }
                | Error::UnknownScreen { .. }
        )
    }

    /// Check if this error should terminate the whole invocation
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::ToolNotFound { .. }
                | Error::ArtifactNotFound { .. }
                | Error::ConfigInvalid { .. }
                | Error::Interrupted
        )
    }
}
