//! Recording window doubles for tests

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use super::{
    Bounds, Channel, LifecycleKind, LifecycleSink, PointerMode, StackingLevel, WindowFactory,
    WindowHandle, WindowKey, WindowResult, WindowSpec,
};
use crate::core::error::WindowError;

/// Observable state of one mock window
#[derive(Debug)]
pub struct MockWindowState {
    pub spec: WindowSpec,
    pub destroyed: bool,
    pub visible: bool,
    pub bounds: Bounds,
    pub opacity: f64,
    pub always_on_top: Option<StackingLevel>,
    pub topmost_calls: usize,
    pub pointer_mode: PointerMode,
    pub closable: bool,
    pub url: String,
    pub navigations: Vec<String>,
    pub focus_calls: usize,
    pub close_calls: usize,
    pub send_attempts: usize,
    pub sent: Vec<(Channel, Value)>,
    pub fail_sends: bool,
    pub detached: bool,
}

impl MockWindowState {
    fn new(spec: &WindowSpec) -> Self {
        let (x, y) = spec.position.unwrap_or((0, 0));
        Self {
            spec: spec.clone(),
            destroyed: false,
            visible: spec.visible,
            bounds: Bounds::new(x, y, spec.width, spec.height),
            opacity: 1.0,
            always_on_top: spec.always_on_top,
            topmost_calls: 0,
            pointer_mode: spec.pointer_mode,
            closable: true,
            url: spec.url.clone(),
            navigations: Vec::new(),
            focus_calls: 0,
            close_calls: 0,
            send_attempts: 0,
            sent: Vec::new(),
            fail_sends: false,
            detached: false,
        }
    }

    /// Payloads delivered on one channel
    pub fn sent_on(&self, channel: Channel) -> Vec<Value> {
        self.sent
            .iter()
            .filter(|(c, _)| *c == channel)
            .map(|(_, payload)| payload.clone())
            .collect()
    }
}

pub type SharedState = Arc<Mutex<MockWindowState>>;

/// Mock window; `close` marks it destroyed and emits `Closed`
pub struct MockWindow {
    state: SharedState,
    label: String,
    sink: LifecycleSink,
}

impl MockWindow {
    fn live(&self) -> WindowResult<parking_lot::MutexGuard<'_, MockWindowState>> {
        let state = self.state.lock();
        if state.destroyed {
            return Err(WindowError::Destroyed);
        }
        Ok(state)
    }
}

impl WindowHandle for MockWindow {
    fn label(&self) -> &str {
        &self.label
    }

    fn is_destroyed(&self) -> bool {
        self.state.lock().destroyed
    }

    fn show(&self) -> WindowResult {
        self.live()?.visible = true;
        Ok(())
    }

    fn hide(&self) -> WindowResult {
        self.live()?.visible = false;
        Ok(())
    }

    fn focus(&self) -> WindowResult {
        self.live()?.focus_calls += 1;
        Ok(())
    }

    fn close(&self) -> WindowResult {
        let detached = {
            let mut state = self.live()?;
            state.close_calls += 1;
            if !state.closable {
                return Err(WindowError::Platform("window is not closable".to_string()));
            }
            state.destroyed = true;
            state.detached
        };
        if !detached {
            self.sink.emit(LifecycleKind::Closed);
        }
        Ok(())
    }

    fn set_position(&self, x: i32, y: i32) -> WindowResult {
        let mut state = self.live()?;
        state.bounds.x = x;
        state.bounds.y = y;
        Ok(())
    }

    fn set_size(&self, width: u32, height: u32) -> WindowResult {
        let mut state = self.live()?;
        state.bounds.width = width;
        state.bounds.height = height;
        Ok(())
    }

    fn set_opacity(&self, opacity: f64) -> WindowResult {
        self.live()?.opacity = opacity;
        Ok(())
    }

    fn set_always_on_top(&self, level: Option<StackingLevel>) -> WindowResult {
        let mut state = self.live()?;
        state.always_on_top = level;
        state.topmost_calls += 1;
        Ok(())
    }

    fn set_pointer_mode(&self, mode: PointerMode) -> WindowResult {
        self.live()?.pointer_mode = mode;
        Ok(())
    }

    fn set_closable(&self, closable: bool) -> WindowResult {
        self.live()?.closable = closable;
        Ok(())
    }

    fn navigate(&self, url: &str) -> WindowResult {
        let mut state = self.live()?;
        state.url = url.to_string();
        state.navigations.push(url.to_string());
        Ok(())
    }

    fn send(&self, channel: Channel, payload: &Value) -> WindowResult {
        let mut state = self.live()?;
        state.send_attempts += 1;
        if state.fail_sends {
            return Err(WindowError::Platform("render process gone".to_string()));
        }
        state.sent.push((channel, payload.clone()));
        Ok(())
    }

    fn detach_listeners(&self) {
        self.state.lock().detached = true;
    }
}

/// Factory recording every window it creates
#[derive(Clone, Default)]
pub struct MockFactory {
    windows: Arc<Mutex<Vec<(WindowKey, SharedState)>>>,
    fail: Arc<AtomicBool>,
}

impl MockFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent creations fail
    pub fn fail_creation(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// State of the window created for a key
    pub fn window(&self, key: WindowKey) -> SharedState {
        self.windows
            .lock()
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, state)| Arc::clone(state))
            .expect("no mock window for key")
    }

    /// Number of windows ever created
    pub fn created(&self) -> usize {
        self.windows.lock().len()
    }

    /// Keys of windows not yet destroyed
    pub fn open_keys(&self) -> Vec<WindowKey> {
        self.windows
            .lock()
            .iter()
            .filter(|(_, state)| !state.lock().destroyed)
            .map(|(key, _)| *key)
            .collect()
    }
}

impl WindowFactory for MockFactory {
    fn create(
        &self,
        key: WindowKey,
        spec: &WindowSpec,
        lifecycle: LifecycleSink,
    ) -> WindowResult<Box<dyn WindowHandle>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(WindowError::Platform("window allocation refused".to_string()));
        }

        let state = Arc::new(Mutex::new(MockWindowState::new(spec)));
        self.windows.lock().push((key, Arc::clone(&state)));
        Ok(Box::new(MockWindow {
            state,
            label: spec.label.clone(),
            sink: lifecycle,
        }))
    }
}
