//! `WindowHandle` over Tauri windows

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tauri::{AppHandle, PhysicalPosition, PhysicalSize, WindowBuilder, WindowEvent, WindowUrl};

use crate::core::error::WindowError;
use crate::window::{
    Channel, LifecycleKind, LifecycleSink, PointerMode, StackingLevel, WindowFactory,
    WindowHandle, WindowKey, WindowResult, WindowSpec,
};

fn platform_error(e: tauri::Error) -> WindowError {
    WindowError::Platform(e.to_string())
}

/// State shared between the handle and its window-event listener
#[derive(Debug, Default)]
struct Flags {
    destroyed: AtomicBool,
    detached: AtomicBool,
}

/// One Tauri window plus the bookkeeping Tauri 1 does not expose
pub struct TauriWindow {
    window: tauri::Window,
    flags: Arc<Flags>,
    opacity: Mutex<f64>,
}

impl TauriWindow {
    fn new(window: tauri::Window, sink: LifecycleSink) -> Self {
        let flags = Arc::new(Flags::default());
        let listener_flags = Arc::clone(&flags);

        window.on_window_event(move |event| match event {
            WindowEvent::Focused(focused) => {
                if !listener_flags.detached.load(Ordering::Acquire) {
                    sink.emit(LifecycleKind::Focused(*focused));
                }
            }
            WindowEvent::Destroyed => {
                listener_flags.destroyed.store(true, Ordering::Release);
                if !listener_flags.detached.load(Ordering::Acquire) {
                    sink.emit(LifecycleKind::Closed);
                }
            }
            _ => {}
        });

        Self {
            window,
            flags,
            opacity: Mutex::new(1.0),
        }
    }

    /// Last opacity requested for this window
    pub fn opacity(&self) -> f64 {
        *self.opacity.lock()
    }

    fn live(&self) -> WindowResult<&tauri::Window> {
        if self.is_destroyed() {
            Err(WindowError::Destroyed)
        } else {
            Ok(&self.window)
        }
    }
}

impl WindowHandle for TauriWindow {
    fn label(&self) -> &str {
        self.window.label()
    }

    fn is_destroyed(&self) -> bool {
        self.flags.destroyed.load(Ordering::Acquire)
    }

    fn show(&self) -> WindowResult {
        self.live()?.show().map_err(platform_error)
    }

    fn hide(&self) -> WindowResult {
        self.live()?.hide().map_err(platform_error)
    }

    fn focus(&self) -> WindowResult {
        self.live()?.set_focus().map_err(platform_error)
    }

    // A window asked to close is treated as gone before Destroyed arrives
    fn close(&self) -> WindowResult {
        self.live()?.close().map_err(platform_error)?;
        self.flags.destroyed.store(true, Ordering::Release);
        Ok(())
    }

    fn set_position(&self, x: i32, y: i32) -> WindowResult {
        self.live()?
            .set_position(PhysicalPosition::new(x, y))
            .map_err(platform_error)
    }

    fn set_size(&self, width: u32, height: u32) -> WindowResult {
        self.live()?
            .set_size(PhysicalSize::new(width, height))
            .map_err(platform_error)
    }

    // Tauri 1 has no native window alpha; content applies the value it
    // receives on the opacity-change channel
    fn set_opacity(&self, opacity: f64) -> WindowResult {
        self.live()?;
        *self.opacity.lock() = opacity;
        Ok(())
    }

    // Tauri 1 exposes a single topmost level
    fn set_always_on_top(&self, level: Option<StackingLevel>) -> WindowResult {
        self.live()?
            .set_always_on_top(level.is_some())
            .map_err(platform_error)
    }

    fn set_pointer_mode(&self, mode: PointerMode) -> WindowResult {
        self.live()?
            .set_ignore_cursor_events(mode.ignores_clicks())
            .map_err(platform_error)
    }

    fn set_closable(&self, closable: bool) -> WindowResult {
        self.live()?
            .set_closable(closable)
            .map_err(platform_error)
    }

    fn navigate(&self, url: &str) -> WindowResult {
        let target = serde_json::to_string(url).map_err(|e| WindowError::Platform(e.to_string()))?;
        self.live()?
            .eval(&format!("window.location.replace({})", target))
            .map_err(platform_error)
    }

    fn send(&self, channel: Channel, payload: &Value) -> WindowResult {
        self.live()?
            .emit(channel.as_str(), payload)
            .map_err(platform_error)
    }

    fn detach_listeners(&self) {
        self.flags.detached.store(true, Ordering::Release);
    }
}

/// Builds windows from `WindowSpec`s on the running Tauri app
pub struct TauriWindowFactory {
    app: AppHandle,
}

impl TauriWindowFactory {
    pub fn new(app: AppHandle) -> Self {
        Self { app }
    }
}

impl WindowFactory for TauriWindowFactory {
    fn create(
        &self,
        key: WindowKey,
        spec: &WindowSpec,
        lifecycle: LifecycleSink,
    ) -> WindowResult<Box<dyn WindowHandle>> {
        let url = WindowUrl::App(spec.url.clone().into());
        let window = WindowBuilder::new(&self.app, spec.label.as_str(), url)
            .title(spec.title.as_str())
            .decorations(!spec.frameless)
            .transparent(spec.transparent)
            .resizable(spec.resizable)
            .skip_taskbar(spec.skip_taskbar)
            .always_on_top(spec.always_on_top.is_some())
            .visible(false)
            .build()
            .map_err(platform_error)?;

        // No Tauri 1 API for `shadow` or `visible_on_all_workspaces`; a
        // frameless window has no title buttons to hide

        // Builder geometry is logical; registries work in physical pixels
        if spec.width > 0 && spec.height > 0 {
            window
                .set_size(PhysicalSize::new(spec.width, spec.height))
                .map_err(platform_error)?;
        }
        if let Some((x, y)) = spec.position {
            window
                .set_position(PhysicalPosition::new(x, y))
                .map_err(platform_error)?;
        }
        if spec.pointer_mode.ignores_clicks() {
            window
                .set_ignore_cursor_events(true)
                .map_err(platform_error)?;
        }
        if spec.visible {
            window.show().map_err(platform_error)?;
        }

        tracing::debug!("Created {:?} window {} as {}", spec.kind, spec.label, key);
        Ok(Box::new(TauriWindow::new(window, lifecycle)))
    }
}
