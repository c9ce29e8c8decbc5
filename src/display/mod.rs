//! Display overlays
//!
//! One transparent, always-on-top overlay window per attached display:
//! - Created at startup and on hot-plug (when auto-creation is enabled)
//! - Destroyed on removal or explicit close
//! - Stacking re-asserted on a fixed cadence
//! - Attached displays tracked by diffing periodic enumerations

mod registry;
mod watcher;

#[cfg(test)]
mod tests;

pub use registry::{DisplayOverlayRecord, DisplayOverlayRegistry};
pub use watcher::{spawn_display_poller, DisplaySource, DisplayWatcher};

use serde::{Deserialize, Serialize};

use crate::window::Bounds;

/// Platform-assigned display identifier
pub type DisplayId = String;

/// An attached physical display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayInfo {
    pub id: DisplayId,
    pub bounds: Bounds,
    pub is_primary: bool,
    pub scale_factor: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl DisplayInfo {
    pub fn new(id: impl Into<DisplayId>, bounds: Bounds) -> Self {
        Self {
            id: id.into(),
            bounds,
            is_primary: false,
            scale_factor: 1.0,
            name: None,
        }
    }

    pub fn primary(mut self) -> Self {
        self.is_primary = true;
        self
    }
}

/// Display hot-plug notification
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayEvent {
    Added(DisplayInfo),
    Removed(DisplayId),
    /// Bounds or scale of an attached display changed
    MetricsChanged(DisplayInfo),
}
