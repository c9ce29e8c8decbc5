//! Click-through control for overlay windows
//!
//! Each tracked overlay is either interactive or transparent-forwarding.
//! Only pointer targeting changes; keyboard delivery is never touched, so
//! shortcuts keep working in both states. The state lives here, not in the
//! window title.

mod shortcut;

pub use shortcut::{ClickThroughShortcut, ShortcutAction, ShortcutBackend};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::core::error::{OverlayError, Result};
use crate::window::{Channel, PointerMode, PresentationStrategy, WindowArena, WindowKey};

/// Pointer input state of one overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClickThroughState {
    /// Window receives all mouse input
    Interactive,
    /// Mouse input passes through; hover/move still forwarded where supported
    TransparentForwarding,
}

impl ClickThroughState {
    pub fn from_enabled(enabled: bool) -> Self {
        if enabled {
            ClickThroughState::TransparentForwarding
        } else {
            ClickThroughState::Interactive
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, ClickThroughState::TransparentForwarding)
    }

    pub fn flipped(&self) -> Self {
        Self::from_enabled(!self.is_enabled())
    }

    fn pointer_mode(&self, presentation: &dyn PresentationStrategy) -> PointerMode {
        match self {
            ClickThroughState::Interactive => PointerMode::Interactive,
            ClickThroughState::TransparentForwarding => PointerMode::PassThrough {
                forward: presentation.forwards_pointer_events(),
            },
        }
    }
}

/// Per-overlay click-through state machine
#[derive(Debug, Default)]
pub struct ClickThroughController {
    states: IndexMap<WindowKey, ClickThroughState>,
}

impl ClickThroughController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking an overlay in its creation state
    pub fn track(&mut self, key: WindowKey, initial: ClickThroughState) {
        self.states.insert(key, initial);
    }

    pub fn untrack(&mut self, key: WindowKey) -> Option<ClickThroughState> {
        self.states.shift_remove(&key)
    }

    pub fn state(&self, key: WindowKey) -> Option<ClickThroughState> {
        self.states.get(&key).copied()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Set one overlay's state; `None` toggles
    pub fn apply(
        &mut self,
        arena: &WindowArena,
        presentation: &dyn PresentationStrategy,
        key: WindowKey,
        requested: Option<bool>,
    ) -> Result<ClickThroughState> {
        let current = self
            .state(key)
            .ok_or_else(|| OverlayError::not_found(format!("overlay {}", key)))?;
        let target = match requested {
            Some(enabled) => ClickThroughState::from_enabled(enabled),
            None => current.flipped(),
        };
        self.set(arena, presentation, key, target)
    }

    /// Drive one overlay into `target`
    pub fn set(
        &mut self,
        arena: &WindowArena,
        presentation: &dyn PresentationStrategy,
        key: WindowKey,
        target: ClickThroughState,
    ) -> Result<ClickThroughState> {
        if !self.states.contains_key(&key) {
            return Err(OverlayError::not_found(format!("overlay {}", key)));
        }
        let handle = arena
            .live(key)
            .ok_or_else(|| OverlayError::not_found(format!("overlay {}", key)))?;

        handle.set_pointer_mode(target.pointer_mode(presentation))?;
        if target.is_enabled() && presentation.pointer_change_resets_stacking() {
            handle.set_always_on_top(Some(presentation.overlay_level()))?;
        }
        self.states.insert(key, target);

        let payload = json!({ "state": target, "clickThrough": target.is_enabled() });
        if let Err(e) = handle.send(Channel::ClickThroughChanged, &payload) {
            tracing::warn!("Failed to notify {} of click-through change: {}", key, e);
        }
        tracing::debug!("Click-through for {} is now {:?}", key, target);
        Ok(target)
    }

    /// Global shortcut: if any overlay forwards, make all interactive; otherwise all forwarding
    pub fn toggle_all(
        &mut self,
        arena: &WindowArena,
        presentation: &dyn PresentationStrategy,
    ) -> ClickThroughState {
        let target = if self.states.values().any(ClickThroughState::is_enabled) {
            ClickThroughState::Interactive
        } else {
            ClickThroughState::TransparentForwarding
        };

        let keys: Vec<WindowKey> = self.states.keys().copied().collect();
        let applied = keys
            .into_iter()
            .filter(|key| match self.set(arena, presentation, *key, target) {
                Ok(_) => true,
                Err(e) => {
                    tracing::debug!("Skipping {} in global click-through toggle: {}", key, e);
                    false
                }
            })
            .count();
        tracing::info!("Global click-through toggle: {:?} on {} overlay(s)", target, applied);
        target
    }
}
