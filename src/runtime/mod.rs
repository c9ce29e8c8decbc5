//! Overlay runtime
//!
//! This module provides:
//! - `OverlayContext`: the application-root object owning the window arena,
//!   both registries, the click-through controller and the broadcast router
//! - `Runtime`: the single event loop with the topmost and watchdog timers
//! - `RuntimeHandle`: the cloneable way in for commands, telemetry and
//!   display events

mod context;
mod event_loop;


pub use context::OverlayContext;
pub use event_loop::{Runtime, RuntimeHandle};
