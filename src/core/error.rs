//! Error types for the overlay core
//!
//! Every registry operation is total over "success / not found"; only genuine
//! platform failures surface as hard errors. The taxonomy here is what the
//! command gateway reports back to the requesting window.

use thiserror::Error;

use crate::gateway::GatewayError;
use crate::window::WindowKey;

/// Result type alias for overlay operations
pub type Result<T> = std::result::Result<T, OverlayError>;

/// Main error type for the overlay core
#[derive(Error, Debug)]
pub enum OverlayError {
    /// Unknown or already-destroyed identifier
    #[error("Not found: {what}")]
    NotFound { what: String },

    /// The windowing system refused to allocate a window
    #[error("Window creation failed: {reason}")]
    CreationFailure { reason: String },

    /// A push to a specific window failed
    #[error("Send to window {key} failed: {reason}")]
    SendFailure { key: WindowKey, reason: String },

    /// Malformed geometry, opacity or payload, rejected at the boundary
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Window error: {0}")]
    Window(#[from] WindowError),

    /// Rejected at the command boundary
    #[error("Command rejected: {0}")]
    Gateway(#[from] GatewayError),

    /// The event loop has stopped accepting commands
    #[error("Overlay runtime is shutting down")]
    ShuttingDown,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl OverlayError {
    /// Shorthand for a `NotFound` error
    pub fn not_found(what: impl Into<String>) -> Self {
        OverlayError::NotFound { what: what.into() }
    }

    /// Check if the error only means the target is gone
    pub fn is_not_found(&self) -> bool {
        matches!(self, OverlayError::NotFound { .. })
    }
}

/// Errors raised by a native window handle
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WindowError {
    #[error("Window has been destroyed")]
    Destroyed,

    #[error("Platform call failed: {0}")]
    Platform(String),
}

/// Configuration and boundary-validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Missing field: {0}")]
    MissingField(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Config file IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse failed: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ConfigError {
    /// Build an `InvalidValue` error from any displayable value
    pub fn invalid(field: impl Into<String>, value: impl std::fmt::Display) -> Self {
        ConfigError::InvalidValue {
            field: field.into(),
            value: value.to_string(),
        }
    }
}
