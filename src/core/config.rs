//! Application configuration
//!
//! Handles:
//! - Widget defaults and page entry points
//! - Timer cadences and the memory watchdog threshold
//! - Telemetry feed connection settings
//! - Logging preferences
//!
//! Stored as JSON under the platform config directory.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::error::ConfigError;
use crate::logging::LoggingConfig;

/// Configuration result type
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Main application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Geometry and stacking applied when `widget.create` omits them
    pub widget_defaults: WidgetDefaults,

    /// Page loaded by widget windows (parameters are appended as a query)
    pub widget_entry: String,

    /// Page loaded by per-display overlay windows
    pub overlay_entry: String,

    /// Create an overlay for displays attached while running
    pub auto_create_overlays: bool,

    /// Global accelerator that flips click-through on every overlay
    pub click_through_shortcut: String,

    /// Always-on-top reassertion period
    pub topmost_interval_ms: u64,

    /// Memory watchdog period
    pub watchdog_interval_ms: u64,

    /// Resident memory above which the cached snapshot is dropped
    pub memory_threshold_mb: u64,

    /// How often attached displays are re-enumerated
    pub display_poll_interval_ms: u64,

    /// External telemetry producer connection
    pub feed: FeedConfig,

    /// Logging preferences
    pub logging: LoggingConfig,
}

/// Defaults for newly created widget windows
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WidgetDefaults {
    pub width: u32,
    pub height: u32,
    pub always_on_top: bool,
}

/// Telemetry feed configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Whether to connect to the producer at all
    pub enabled: bool,

    /// WebSocket URL of the producer
    pub url: String,

    /// Delay before reconnecting after the producer goes away
    pub reconnect_delay_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            widget_defaults: WidgetDefaults::default(),
            widget_entry: "widget.html".to_string(),
            overlay_entry: "overlay.html".to_string(),
            auto_create_overlays: true,
            click_through_shortcut: "CommandOrControl+Shift+X".to_string(),
            topmost_interval_ms: 1_000,
            watchdog_interval_ms: 30_000,
            memory_threshold_mb: 500,
            display_poll_interval_ms: 2_000,
            feed: FeedConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for WidgetDefaults {
    fn default() -> Self {
        Self {
            width: 300,
            height: 200,
            always_on_top: false,
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: "ws://127.0.0.1:8080".to_string(),
            reconnect_delay_ms: 2_000,
        }
    }
}

impl AppConfig {
    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.widget_defaults.width == 0 || self.widget_defaults.height == 0 {
            return Err(ConfigError::invalid(
                "widget_defaults",
                format!(
                    "{}x{}",
                    self.widget_defaults.width, self.widget_defaults.height
                ),
            ));
        }

        if self.widget_entry.trim().is_empty() {
            return Err(ConfigError::MissingField("widget_entry".to_string()));
        }
        if self.overlay_entry.trim().is_empty() {
            return Err(ConfigError::MissingField("overlay_entry".to_string()));
        }

        for (field, value) in [
            ("topmost_interval_ms", self.topmost_interval_ms),
            ("watchdog_interval_ms", self.watchdog_interval_ms),
            ("display_poll_interval_ms", self.display_poll_interval_ms),
            ("memory_threshold_mb", self.memory_threshold_mb),
        ] {
            if value == 0 {
                return Err(ConfigError::invalid(field, value));
            }
        }

        if !(self.feed.url.starts_with("ws://") || self.feed.url.starts_with("wss://")) {
            return Err(ConfigError::invalid("feed.url", &self.feed.url));
        }

        Ok(())
    }

    pub fn topmost_interval(&self) -> Duration {
        Duration::from_millis(self.topmost_interval_ms)
    }

    pub fn watchdog_interval(&self) -> Duration {
        Duration::from_millis(self.watchdog_interval_ms)
    }

    pub fn display_poll_interval(&self) -> Duration {
        Duration::from_millis(self.display_poll_interval_ms)
    }

    /// Memory threshold in bytes
    pub fn memory_threshold_bytes(&self) -> u64 {
        self.memory_threshold_mb * 1024 * 1024
    }
}

/// JSON-file backed configuration store
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// Create a store for an explicit path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default location under the platform config directory
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("telemetry-overlay")
            .join("config.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the configuration, writing defaults first if the file is absent
    pub fn load_or_default(&self) -> ConfigResult<AppConfig> {
        if !self.path.exists() {
            let config = AppConfig::default();
            self.save(&config)?;
            tracing::info!("Created default configuration at {:?}", self.path);
            return Ok(config);
        }

        let content = std::fs::read_to_string(&self.path)?;
        let config: AppConfig = serde_json::from_str(&content)?;
        config.validate()?;
        tracing::debug!("Loaded configuration from {:?}", self.path);
        Ok(config)
    }

    /// Save the configuration atomically (temp file + rename)
    pub fn save(&self, config: &AppConfig) -> ConfigResult<()> {
        config.validate()?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let temp_path = self.path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(config)?;
        std::fs::write(&temp_path, content)?;
        std::fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.widget_defaults.width, 300);
        assert_eq!(config.widget_defaults.height, 200);
        assert_eq!(config.topmost_interval(), Duration::from_secs(1));
        assert_eq!(config.watchdog_interval(), Duration::from_secs(30));
        assert_eq!(config.memory_threshold_bytes(), 500 * 1024 * 1024);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = AppConfig {
            topmost_interval_ms: 0,
            ..AppConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "topmost_interval_ms"
        ));
    }

    #[test]
    fn test_bad_feed_url_rejected() {
        let mut config = AppConfig::default();
        config.feed.url = "http://localhost:8080".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::new(dir.path().join("nested").join("config.json"));

        let config = store.load_or_default().unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(store.path().exists());
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::new(dir.path().join("config.json"));

        let mut config = AppConfig::default();
        config.auto_create_overlays = false;
        config.memory_threshold_mb = 256;
        store.save(&config).unwrap();

        let loaded = store.load_or_default().unwrap();
        assert!(!loaded.auto_create_overlays);
        assert_eq!(loaded.memory_threshold_mb, 256);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"auto_create_overlays": false}"#).unwrap();

        let loaded = ConfigStore::new(&path).load_or_default().unwrap();
        assert!(!loaded.auto_create_overlays);
        assert_eq!(loaded.widget_entry, "widget.html");
        assert_eq!(loaded.feed.reconnect_delay_ms, 2_000);
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            ConfigStore::new(&path).load_or_default(),
            Err(ConfigError::Parse(_))
        ));
    }
}
