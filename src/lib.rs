//! Telemetry Overlay - window orchestration core
//!
//! This crate provides the window layer behind a desktop telemetry
//! overlay dashboard:
//! - Floating widget windows addressed by caller-assigned ids
//! - One transparent overlay per attached display, following hot-plug
//! - Click-through toggling with keyboard delivery preserved
//! - Fan-out of live telemetry to every window, with a memory watchdog
//! - An allow-listed command gateway for window content
//! - A WebSocket client for the external telemetry producer

pub mod broadcast;
pub mod click_through;
pub mod core;
pub mod display;
pub mod feed;
pub mod gateway;
pub mod logging;
pub mod runtime;
pub mod widget;
pub mod window;

#[cfg(feature = "desktop")]
pub mod shell;

// Re-export commonly used items
pub use core::config::{AppConfig, ConfigStore};
pub use core::error::{OverlayError, Result};
pub use runtime::{OverlayContext, Runtime, RuntimeHandle};
