//! Widget Registry
//!
//! Owns the mapping from widget identifier to its window key and declared
//! configuration. Every mutator probes liveness first and answers `false`
//! for unknown or destroyed windows instead of failing.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;

use super::url::build_widget_url;
use crate::core::config::WidgetDefaults;
use crate::core::error::{OverlayError, Result};
use crate::window::{
    sanitize_label, Channel, LifecycleBus, PresentationStrategy, WindowArena, WindowFactory,
    WindowHandle, WindowKey, WindowKind, WindowSpec,
};

/// Requested geometry; missing fields fall back to the configured defaults
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WidgetGeometry {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub x: Option<i32>,
    pub y: Option<i32>,
}

/// Arguments of a widget creation
#[derive(Debug, Clone, Default)]
pub struct CreateWidget {
    pub id: String,
    pub widget_type: String,
    pub geometry: WidgetGeometry,
    pub always_on_top: Option<bool>,
    pub params: IndexMap<String, Value>,
}

/// Outcome of an idempotent create
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    /// A new window was allocated
    Created(WindowKey),
    /// The identifier was already live; its window was focused
    Focused(WindowKey),
}

impl CreateOutcome {
    pub fn key(&self) -> WindowKey {
        match self {
            CreateOutcome::Created(key) | CreateOutcome::Focused(key) => *key,
        }
    }
}

/// Declared state of one widget window
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub widget_type: String,
    pub width: u32,
    pub height: u32,
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub always_on_top: bool,
    pub opacity: f64,
    pub visible: bool,
    pub params: IndexMap<String, Value>,
    #[serde(skip)]
    pub key: WindowKey,
    /// Content has signalled it can paint since the last navigation
    #[serde(skip)]
    pub ready: bool,
    /// Show once the content reports ready
    #[serde(skip)]
    pub pending_show: bool,
    /// Reload requested before the content was ready
    #[serde(skip)]
    pub pending_reload: Option<String>,
}

/// Registry of widget windows
pub struct WidgetRegistry {
    records: IndexMap<String, WidgetRecord>,
    by_key: HashMap<WindowKey, String>,
    defaults: WidgetDefaults,
    entry: String,
    /// Suffix keeping platform labels unique across re-creations of one id
    generation: u64,
}

impl WidgetRegistry {
    pub fn new(defaults: WidgetDefaults, entry: impl Into<String>) -> Self {
        Self {
            records: IndexMap::new(),
            by_key: HashMap::new(),
            defaults,
            entry: entry.into(),
            generation: 0,
        }
    }

    /// Create a widget window, or focus the existing one for `id`
    pub fn create(
        &mut self,
        arena: &mut WindowArena,
        factory: &dyn WindowFactory,
        bus: &LifecycleBus,
        presentation: &dyn PresentationStrategy,
        request: CreateWidget,
    ) -> Result<CreateOutcome> {
        if let Some(record) = self.records.get(&request.id) {
            if let Some(handle) = arena.live(record.key) {
                if let Err(e) = handle.focus() {
                    tracing::warn!("Failed to focus widget '{}': {}", request.id, e);
                }
                tracing::debug!("Widget '{}' already open, focused {}", request.id, record.key);
                return Ok(CreateOutcome::Focused(record.key));
            }

            // Close requested but the destroy signal has not arrived yet
            let stale = record.key;
            self.by_key.remove(&stale);
            self.records.shift_remove(&request.id);
            tracing::debug!("Replacing stale widget '{}' ({})", request.id, stale);
        }

        let width = request.geometry.width.unwrap_or(self.defaults.width);
        let height = request.geometry.height.unwrap_or(self.defaults.height);
        let always_on_top = request.always_on_top.unwrap_or(self.defaults.always_on_top);
        let position = match (request.geometry.x, request.geometry.y) {
            (Some(x), Some(y)) => Some((x, y)),
            _ => None,
        };

        self.generation += 1;
        let url = build_widget_url(&self.entry, &request.id, &request.widget_type, &request.params);
        let mut spec = WindowSpec::frameless(
            WindowKind::Widget,
            format!("widget-{}-{}", sanitize_label(&request.id), self.generation),
            url,
        );
        spec.title = format!("{} ({})", request.widget_type, request.id);
        spec.width = width;
        spec.height = height;
        spec.position = position;
        spec.always_on_top = always_on_top.then(|| presentation.widget_level());
        presentation.decorate(&mut spec);

        let key = arena.spawn(factory, bus, &spec).map_err(|e| {
            tracing::error!("Failed to create widget '{}': {}", request.id, e);
            OverlayError::CreationFailure {
                reason: e.to_string(),
            }
        })?;

        tracing::info!(
            "Created widget '{}' ({}) as {} [{}x{}]",
            request.id,
            request.widget_type,
            key,
            width,
            height
        );

        self.by_key.insert(key, request.id.clone());
        self.records.insert(
            request.id.clone(),
            WidgetRecord {
                id: request.id,
                widget_type: request.widget_type,
                width,
                height,
                x: request.geometry.x,
                y: request.geometry.y,
                always_on_top,
                opacity: 1.0,
                visible: false,
                params: request.params,
                key,
                ready: false,
                pending_show: true,
                pending_reload: None,
            },
        );

        Ok(CreateOutcome::Created(key))
    }

    /// Request close; the record goes away when the window reports closed
    pub fn close(&self, arena: &WindowArena, id: &str) -> bool {
        let Some(handle) = self.live_handle(arena, id) else {
            return false;
        };
        match handle.close() {
            Ok(()) => {
                tracing::debug!("Close requested for widget '{}'", id);
                true
            }
            Err(e) => {
                tracing::warn!("Failed to close widget '{}': {}", id, e);
                false
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&WidgetRecord> {
        self.records.get(id)
    }

    /// Identifiers in insertion order
    pub fn list(&self) -> Vec<String> {
        self.records.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn key_of(&self, id: &str) -> Option<WindowKey> {
        self.records.get(id).map(|record| record.key)
    }

    pub fn id_of(&self, key: WindowKey) -> Option<&str> {
        self.by_key.get(&key).map(String::as_str)
    }

    /// Window keys of every registered widget
    pub fn keys(&self) -> impl Iterator<Item = WindowKey> + '_ {
        self.records.values().map(|record| record.key)
    }

    pub fn set_position(&mut self, arena: &WindowArena, id: &str, x: i32, y: i32) -> bool {
        self.mutate(arena, id, "set_position", |handle, record| {
            handle.set_position(x, y)?;
            record.x = Some(x);
            record.y = Some(y);
            Ok(())
        })
    }

    pub fn set_size(&mut self, arena: &WindowArena, id: &str, width: u32, height: u32) -> bool {
        self.mutate(arena, id, "set_size", |handle, record| {
            handle.set_size(width, height)?;
            record.width = width;
            record.height = height;
            Ok(())
        })
    }

    pub fn set_always_on_top(
        &mut self,
        arena: &WindowArena,
        presentation: &dyn PresentationStrategy,
        id: &str,
        always_on_top: bool,
    ) -> bool {
        let level = always_on_top.then(|| presentation.widget_level());
        self.mutate(arena, id, "set_always_on_top", |handle, record| {
            handle.set_always_on_top(level)?;
            record.always_on_top = always_on_top;
            Ok(())
        })
    }

    /// Apply opacity and mirror it into the window's own message channel
    pub fn set_opacity(&mut self, arena: &WindowArena, id: &str, opacity: f64) -> bool {
        self.mutate(arena, id, "set_opacity", |handle, record| {
            handle.set_opacity(opacity)?;
            record.opacity = opacity;
            if let Err(e) = handle.send(Channel::OpacityChange, &json!({ "opacity": opacity })) {
                tracing::warn!("Opacity notification to widget '{}' failed: {}", record.id, e);
            }
            Ok(())
        })
    }

    pub fn set_visible(&mut self, arena: &WindowArena, id: &str, visible: bool) -> bool {
        self.mutate(arena, id, "set_visible", |handle, record| {
            if visible {
                handle.show()?;
            } else {
                handle.hide()?;
            }
            record.visible = visible;
            record.pending_show = false;
            if let Err(e) = handle.send(Channel::FocusChange, &json!({ "visible": visible })) {
                tracing::warn!("Visibility notification to widget '{}' failed: {}", record.id, e);
            }
            Ok(())
        })
    }

    /// Merge parameters and reload the window with the full merged set
    pub fn update_params(
        &mut self,
        arena: &WindowArena,
        id: &str,
        params: IndexMap<String, Value>,
    ) -> bool {
        let entry = self.entry.clone();
        self.mutate(arena, id, "update_params", |handle, record| {
            for (key, value) in params {
                record.params.insert(key, value);
            }
            let url = build_widget_url(&entry, &record.id, &record.widget_type, &record.params);

            if !record.ready {
                // Coalesce with any earlier queued reload
                record.pending_reload = Some(url);
                return Ok(());
            }

            if let Err(e) = handle.send(Channel::ParamsChange, &json!({ "params": record.params })) {
                tracing::debug!("Params notification to widget '{}' failed: {}", record.id, e);
            }
            handle.navigate(&url)?;
            record.ready = false;
            Ok(())
        })
    }

    /// Content for `key` can paint: flush a queued reload or perform the deferred show
    pub fn on_ready(&mut self, arena: &WindowArena, key: WindowKey) -> bool {
        let Some(id) = self.by_key.get(&key) else {
            return false;
        };
        let Some(record) = self.records.get_mut(id) else {
            return false;
        };
        let Some(handle) = arena.live(key) else {
            return false;
        };

        if let Some(url) = record.pending_reload.take() {
            if let Err(e) = handle.navigate(&url) {
                tracing::warn!("Queued reload of widget '{}' failed: {}", record.id, e);
            }
            return true;
        }

        record.ready = true;
        if record.pending_show {
            record.pending_show = false;
            match handle.show() {
                Ok(()) => record.visible = true,
                Err(e) => tracing::warn!("Failed to show widget '{}': {}", record.id, e),
            }
        }
        true
    }

    /// Push a focus change observed on the window back into it
    pub fn on_focus(&self, arena: &WindowArena, key: WindowKey, focused: bool) -> bool {
        if !self.by_key.contains_key(&key) {
            return false;
        }
        match arena.live(key) {
            Some(handle) => handle
                .send(Channel::FocusChange, &json!({ "focused": focused }))
                .is_ok(),
            None => false,
        }
    }

    /// Destroy callback: drop the record owned by `key`
    ///
    /// Dropping the record also discards any pending show or queued reload.
    pub fn on_closed(&mut self, key: WindowKey) -> Option<WidgetRecord> {
        let id = self.by_key.remove(&key)?;
        let record = self.records.shift_remove(&id)?;
        tracing::info!("Widget '{}' closed ({})", id, key);
        Some(record)
    }

    /// Close every widget window and forget all records
    pub fn close_all(&mut self, arena: &mut WindowArena) -> usize {
        let mut closed = 0;
        for (id, record) in self.records.drain(..) {
            if let Some(handle) = arena.remove(record.key) {
                handle.detach_listeners();
                if !handle.is_destroyed() {
                    if let Err(e) = handle.close() {
                        tracing::warn!("Failed to close widget '{}' at shutdown: {}", id, e);
                    }
                }
                closed += 1;
            }
        }
        self.by_key.clear();
        closed
    }

    fn live_handle<'a>(&self, arena: &'a WindowArena, id: &str) -> Option<&'a dyn WindowHandle> {
        let record = self.records.get(id)?;
        arena.live(record.key)
    }

    /// Liveness probe then mutation; platform failures count as `false`
    fn mutate<F>(&mut self, arena: &WindowArena, id: &str, op: &str, apply: F) -> bool
    where
        F: FnOnce(&dyn WindowHandle, &mut WidgetRecord) -> crate::window::WindowResult,
    {
        let Some(record) = self.records.get_mut(id) else {
            tracing::debug!("{} on unknown widget '{}'", op, id);
            return false;
        };
        let Some(handle) = arena.live(record.key) else {
            tracing::debug!("{} on destroyed widget '{}'", op, id);
            return false;
        };

        match apply(handle, record) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("{} on widget '{}' failed: {}", op, id, e);
                false
            }
        }
    }
}
