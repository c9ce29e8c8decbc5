//! Command Gateway
//!
//! The only way commands reach the core:
//! - Channel names are checked against a fixed allow-list
//! - Payloads are decoded into typed `Command`s
//! - Geometry and opacity are validated before any registry sees them
//! - Results are shaped as `{ok, ...}` JSON for the requesting window

mod command;


pub use command::Command;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::core::error::{OverlayError, Result};

/// Every channel a window may invoke
pub const ALLOWED_CHANNELS: &[&str] = &[
    "widget.create",
    "widget.close",
    "widget.get",
    "widget.listAll",
    "widget.setPosition",
    "widget.setSize",
    "widget.setAlwaysOnTop",
    "widget.setOpacity",
    "widget.setVisible",
    "widget.updateParams",
    "widget.registerForUpdates",
    "display.listAll",
    "display.closeWindowFor",
    "display.createWindowFor",
    "app.toggleClickThrough",
    "app.getClickThrough",
    "app.toggleAutoCreateForNewDisplays",
    "app.getAutoCreateForNewDisplays",
    "app.windowReady",
    "telemetry.ingest",
    "telemetry.setConnectivity",
    "telemetry.getLatest",
    "telemetry.getConnectivity",
];

/// Channels that never produce a reply
pub const FIRE_AND_FORGET_CHANNELS: &[&str] = &[
    "widget.registerForUpdates",
    "app.windowReady",
    "telemetry.ingest",
    "telemetry.setConnectivity",
];

/// Largest accepted window edge in pixels
pub const MAX_WINDOW_EDGE: u32 = 16_384;

/// Boundary rejections
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Channel not allowed: {0}")]
    Forbidden(String),

    #[error("Malformed payload for {channel}: {reason}")]
    Decode { channel: String, reason: String },

    #[error("{0} requires an originating window")]
    NoCaller(String),
}

/// Check a channel name against the allow-list
pub fn is_allowed(channel: &str) -> bool {
    ALLOWED_CHANNELS.contains(&channel)
}

pub fn is_fire_and_forget(channel: &str) -> bool {
    FIRE_AND_FORGET_CHANNELS.contains(&channel)
}

/// Window a command came from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    /// Platform label of the invoking window; `None` for host-side callers
    pub label: Option<String>,
}

impl Caller {
    pub fn window(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
        }
    }

    pub fn host() -> Self {
        Self::default()
    }
}

/// Shape a command result for the requesting window
pub fn respond(result: Result<Value>) -> Value {
    match result {
        Ok(body) => body,
        Err(e) => {
            if !e.is_not_found() {
                tracing::debug!("Command failed: {}", e);
            }
            failure(&e)
        }
    }
}

/// `{ok: true}` extended with the fields of `extra`
pub fn success(extra: Value) -> Value {
    let mut body = json!({ "ok": true });
    if let (Some(body), Value::Object(extra)) = (body.as_object_mut(), extra) {
        body.extend(extra);
    }
    body
}

pub fn failure(error: &OverlayError) -> Value {
    json!({ "ok": false, "error": error.to_string() })
}
