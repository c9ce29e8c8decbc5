//! Tauri shell bindings
//!
//! Connects the platform-neutral core to real Tauri windows:
//! - `TauriWindow` / `TauriWindowFactory`: `WindowHandle` over `tauri::Window`
//! - `TauriDisplaySource`: monitor enumeration for the hot-plug poller
//! - `core_invoke` / `core_notify`: the two commands window content may call
//! - `TauriShortcuts`: the global accelerator facility behind the click-through toggle

mod commands;
mod display;
mod window;

pub use commands::{core_invoke, core_notify};
pub use display::TauriDisplaySource;
pub use window::{TauriWindow, TauriWindowFactory};

use tauri::{AppHandle, GlobalShortcutManager};

use crate::click_through::{ShortcutAction, ShortcutBackend};
use crate::core::error::{Result, WindowError};

/// Global shortcuts of the running app
pub struct TauriShortcuts {
    app: AppHandle,
}

impl TauriShortcuts {
    pub fn new(app: AppHandle) -> Self {
        Self { app }
    }
}

impl ShortcutBackend for TauriShortcuts {
    fn register(&mut self, accelerator: &str, action: ShortcutAction) -> Result<()> {
        self.app
            .global_shortcut_manager()
            .register(accelerator, action)
            .map_err(|e| WindowError::Platform(format!("shortcut '{}': {}", accelerator, e)))?;
        Ok(())
    }

    fn unregister(&mut self, accelerator: &str) -> Result<()> {
        self.app
            .global_shortcut_manager()
            .unregister(accelerator)
            .map_err(|e| WindowError::Platform(format!("shortcut '{}': {}", accelerator, e)))?;
        Ok(())
    }
}
