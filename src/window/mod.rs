//! Window abstraction layer
//!
//! This module provides:
//! - `WindowHandle`: the opaque capability over one native top-level window
//! - `WindowFactory`: allocation of new windows from a `WindowSpec`
//! - `WindowArena`: the single owner of every live handle, keyed by `WindowKey`
//! - Lifecycle message passing (ready / navigated / focused / closed)
//! - Per-platform presentation strategies

pub mod arena;
pub mod presentation;

#[cfg(test)]
pub(crate) mod testing;

pub use arena::WindowArena;
pub use presentation::{for_current_platform, PresentationStrategy};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::core::error::WindowError;

/// Result type for native window calls
pub type WindowResult<T = ()> = std::result::Result<T, WindowError>;

/// Stable identifier of a window inside the arena
///
/// Keys are never reused within a process, so a stale key can only ever
/// resolve to "absent".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WindowKey(u64);

impl WindowKey {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for WindowKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a window is used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowKind {
    /// Small floating readout addressed by a caller-assigned id
    Widget,
    /// Full-screen window covering one display
    Overlay,
}

/// Window stacking level when always-on-top is engaged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StackingLevel {
    Normal,
    Floating,
    ScreenSaver,
}

/// Pointer targeting mode
///
/// Only pointer input is affected; keyboard delivery is untouched in every mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerMode {
    /// The window receives all mouse input
    Interactive,
    /// Clicks pass through to whatever is beneath; `forward` keeps hover and
    /// move events flowing to the window where the platform supports it
    PassThrough { forward: bool },
}

impl PointerMode {
    pub fn ignores_clicks(&self) -> bool {
        matches!(self, PointerMode::PassThrough { .. })
    }
}

/// Screen rectangle in physical pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Bounds {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Check whether a point lies inside the rectangle
    pub fn contains(&self, x: i32, y: i32) -> bool {
        let right = self.x as i64 + self.width as i64;
        let bottom = self.y as i64 + self.height as i64;
        x >= self.x && y >= self.y && (x as i64) < right && (y as i64) < bottom
    }
}

/// Everything a factory needs to allocate a window
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSpec {
    pub kind: WindowKind,
    /// Platform label; unique per live window
    pub label: String,
    pub title: String,
    /// Initial navigation target, relative to the bundled UI
    pub url: String,
    pub width: u32,
    pub height: u32,
    /// Explicit position; `None` lets the platform place the window
    pub position: Option<(i32, i32)>,
    pub frameless: bool,
    pub transparent: bool,
    pub resizable: bool,
    pub shadow: bool,
    pub skip_taskbar: bool,
    /// `None` means a normal, non-topmost window
    pub always_on_top: Option<StackingLevel>,
    /// Shown immediately, or deferred until the window reports ready
    pub visible: bool,
    pub pointer_mode: PointerMode,
    /// Hide native title-bar buttons (traffic lights on macOS)
    pub hide_title_buttons: bool,
    pub visible_on_all_workspaces: bool,
}

impl WindowSpec {
    /// Frameless, transparent, non-resizable base shared by widgets and overlays
    pub fn frameless(kind: WindowKind, label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            kind,
            label: label.into(),
            title: String::new(),
            url: url.into(),
            width: 0,
            height: 0,
            position: None,
            frameless: true,
            transparent: true,
            resizable: false,
            shadow: false,
            skip_taskbar: true,
            always_on_top: None,
            visible: false,
            pointer_mode: PointerMode::Interactive,
            hide_title_buttons: false,
            visible_on_all_workspaces: false,
        }
    }
}

/// Named outbound channels pushed into windows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    TelemetryUpdate,
    ConnectionStatus,
    OpacityChange,
    ParamsChange,
    FocusChange,
    ClickThroughChanged,
}

impl Channel {
    /// Event name seen by window content
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::TelemetryUpdate => "telemetry-update",
            Channel::ConnectionStatus => "connection-status",
            Channel::OpacityChange => "opacity-change",
            Channel::ParamsChange => "params-change",
            Channel::FocusChange => "focus-change",
            Channel::ClickThroughChanged => "click-through-changed",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Native top-level window capability
///
/// Implementations must be cheap to call and never block; completion of
/// close and navigation is observed later through lifecycle events.
pub trait WindowHandle: Send {
    /// Platform label the window was created with
    fn label(&self) -> &str;

    /// Liveness probe
    fn is_destroyed(&self) -> bool;

    fn show(&self) -> WindowResult;

    fn hide(&self) -> WindowResult;

    fn focus(&self) -> WindowResult;

    /// Request close; does not wait for the window to go away
    fn close(&self) -> WindowResult;

    fn set_position(&self, x: i32, y: i32) -> WindowResult;

    fn set_size(&self, width: u32, height: u32) -> WindowResult;

    fn set_bounds(&self, bounds: Bounds) -> WindowResult {
        self.set_position(bounds.x, bounds.y)?;
        self.set_size(bounds.width, bounds.height)
    }

    fn set_opacity(&self, opacity: f64) -> WindowResult;

    /// `None` drops the window back to normal stacking
    fn set_always_on_top(&self, level: Option<StackingLevel>) -> WindowResult;

    fn set_pointer_mode(&self, mode: PointerMode) -> WindowResult;

    fn set_closable(&self, closable: bool) -> WindowResult;

    /// Full reload of the window content
    fn navigate(&self, url: &str) -> WindowResult;

    /// Push a message into the window's own message channel
    fn send(&self, channel: Channel, payload: &Value) -> WindowResult;

    /// Stop forwarding lifecycle events; used before a registry-driven close
    fn detach_listeners(&self);
}

/// Allocates native windows
pub trait WindowFactory: Send {
    /// Create a window; lifecycle events for it go to `lifecycle`
    fn create(
        &self,
        key: WindowKey,
        spec: &WindowSpec,
        lifecycle: LifecycleSink,
    ) -> WindowResult<Box<dyn WindowHandle>>;
}

/// Lifecycle signal observed from a window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleKind {
    /// Content is ready to paint
    Ready,
    /// Navigation finished
    Navigated,
    Focused(bool),
    /// The native window is gone
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleEvent {
    pub key: WindowKey,
    pub kind: LifecycleKind,
}

/// Sending half shared by every window; hands out per-window sinks
#[derive(Debug, Clone)]
pub struct LifecycleBus {
    tx: mpsc::UnboundedSender<LifecycleEvent>,
}

impl LifecycleBus {
    /// Sink bound to one window key
    pub fn sink_for(&self, key: WindowKey) -> LifecycleSink {
        LifecycleSink {
            key,
            tx: self.tx.clone(),
        }
    }
}

/// Per-window lifecycle sender, consumed once by the factory
#[derive(Debug, Clone)]
pub struct LifecycleSink {
    key: WindowKey,
    tx: mpsc::UnboundedSender<LifecycleEvent>,
}

impl LifecycleSink {
    pub fn key(&self) -> WindowKey {
        self.key
    }

    /// Returns false once the receiving event loop is gone
    pub fn emit(&self, kind: LifecycleKind) -> bool {
        self.tx.send(LifecycleEvent { key: self.key, kind }).is_ok()
    }
}

/// Create the lifecycle bus and its receiving end
pub fn lifecycle_channel() -> (LifecycleBus, mpsc::UnboundedReceiver<LifecycleEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (LifecycleBus { tx }, rx)
}

/// Reduce an arbitrary identifier to characters every platform accepts in a label
pub fn sanitize_label(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
