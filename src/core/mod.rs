//! Core Module
//!
//! Shared building blocks for the overlay core:
//! - Configuration management
//! - Error types and handling

pub mod config;
pub mod error;

// Re-export commonly used items
pub use config::{AppConfig, ConfigStore, FeedConfig, WidgetDefaults};
pub use error::{ConfigError, OverlayError, Result, WindowError};
