//! Display Overlay Registry
//!
//! Per display: `absent -> created -> destroyed`. The registry also keeps
//! the set of attached displays so overlays can be created on demand.

use indexmap::IndexMap;

use super::{DisplayId, DisplayInfo};
use crate::core::error::{OverlayError, Result};
use crate::window::{
    sanitize_label, LifecycleBus, PointerMode, PresentationStrategy, StackingLevel, WindowArena, WindowFactory,
    WindowKey, WindowKind, WindowSpec,
};

/// Overlay owned for one display
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayOverlayRecord {
    pub display: DisplayInfo,
    pub key: WindowKey,
}

/// Registry of per-display overlay windows
pub struct DisplayOverlayRegistry {
    records: IndexMap<DisplayId, DisplayOverlayRecord>,
    attached: IndexMap<DisplayId, DisplayInfo>,
    auto_create: bool,
    entry: String,
    generation: u64,
}

impl DisplayOverlayRegistry {
    pub fn new(entry: impl Into<String>, auto_create: bool) -> Self {
        Self {
            records: IndexMap::new(),
            attached: IndexMap::new(),
            auto_create,
            entry: entry.into(),
            generation: 0,
        }
    }

    pub fn auto_create(&self) -> bool {
        self.auto_create
    }

    pub fn set_auto_create(&mut self, enabled: bool) {
        if self.auto_create != enabled {
            tracing::info!("Overlay auto-creation for new displays: {}", enabled);
        }
        self.auto_create = enabled;
    }

    /// Currently attached displays in discovery order
    pub fn displays(&self) -> impl Iterator<Item = &DisplayInfo> {
        self.attached.values()
    }

    pub fn display(&self, id: &str) -> Option<&DisplayInfo> {
        self.attached.get(id)
    }

    pub fn get(&self, id: &str) -> Option<&DisplayOverlayRecord> {
        self.records.get(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Overlay window keys in creation order
    pub fn keys(&self) -> impl Iterator<Item = WindowKey> + '_ {
        self.records.values().map(|record| record.key)
    }

    pub fn display_of(&self, key: WindowKey) -> Option<&DisplayId> {
        self.records
            .iter()
            .find(|(_, record)| record.key == key)
            .map(|(id, _)| id)
    }

    /// Display whose bounds contain a point
    pub fn display_at(&self, x: i32, y: i32) -> Option<&DisplayId> {
        self.attached
            .values()
            .find(|display| display.bounds.contains(x, y))
            .map(|display| &display.id)
    }

    /// Startup: record every attached display and cover each with an overlay
    pub fn start(
        &mut self,
        arena: &mut WindowArena,
        factory: &dyn WindowFactory,
        bus: &LifecycleBus,
        presentation: &dyn PresentationStrategy,
        displays: Vec<DisplayInfo>,
    ) -> Vec<(DisplayId, WindowKey)> {
        let mut created = Vec::new();
        for display in displays {
            let id = display.id.clone();
            self.attached.insert(id.clone(), display);
            match self.create_for(arena, factory, bus, presentation, &id) {
                Ok(Some(key)) => created.push((id, key)),
                Ok(None) => {}
                Err(e) => tracing::error!("Failed to create overlay for display {}: {}", id, e),
            }
        }
        created
    }

    /// Create the overlay for an attached display; `None` if one already exists
    pub fn create_for(
        &mut self,
        arena: &mut WindowArena,
        factory: &dyn WindowFactory,
        bus: &LifecycleBus,
        presentation: &dyn PresentationStrategy,
        id: &str,
    ) -> Result<Option<WindowKey>> {
        if self.records.contains_key(id) {
            return Ok(None);
        }
        let display = self
            .attached
            .get(id)
            .cloned()
            .ok_or_else(|| OverlayError::not_found(format!("display '{}'", id)))?;

        self.generation += 1;
        let spec = self.overlay_spec(presentation, &display);
        let key = arena.spawn(factory, bus, &spec).map_err(|e| OverlayError::CreationFailure {
            reason: e.to_string(),
        })?;

        let bounds = display.bounds;
        tracing::info!(
            "Created overlay {} for display {} at ({}, {}) {}x{}",
            key,
            id,
            bounds.x,
            bounds.y,
            bounds.width,
            bounds.height
        );
        self.records
            .insert(display.id.clone(), DisplayOverlayRecord { display, key });
        Ok(Some(key))
    }

    fn overlay_spec(
        &self,
        presentation: &dyn PresentationStrategy,
        display: &DisplayInfo,
    ) -> WindowSpec {
        let url = format!("{}?display={}", self.entry, url_escape(&display.id));
        let mut spec = WindowSpec::frameless(
            WindowKind::Overlay,
            format!("overlay-{}-{}", sanitize_label(&display.id), self.generation),
            url,
        );
        spec.title = format!("Telemetry Overlay ({})", display.id);
        spec.position = Some((display.bounds.x, display.bounds.y));
        spec.width = display.bounds.width;
        spec.height = display.bounds.height;
        spec.always_on_top = Some(StackingLevel::Normal);
        spec.visible = true;
        spec.pointer_mode = PointerMode::PassThrough {
            forward: presentation.forwards_pointer_events(),
        };
        presentation.decorate(&mut spec);
        spec
    }

    /// Hot-plug "added"; creates an overlay only when auto-creation is on
    pub fn on_display_added(
        &mut self,
        arena: &mut WindowArena,
        factory: &dyn WindowFactory,
        bus: &LifecycleBus,
        presentation: &dyn PresentationStrategy,
        display: DisplayInfo,
    ) -> Result<Option<WindowKey>> {
        let id = display.id.clone();
        tracing::info!("Display added: {}", id);
        self.attached.insert(id.clone(), display);

        if !self.auto_create {
            tracing::debug!("Auto-creation disabled, no overlay for {}", id);
            return Ok(None);
        }
        self.create_for(arena, factory, bus, presentation, &id)
    }

    /// Hot-plug "removed"; returns the destroyed overlay's key
    pub fn on_display_removed(&mut self, arena: &mut WindowArena, id: &str) -> Option<WindowKey> {
        if self.attached.shift_remove(id).is_some() {
            tracing::info!("Display removed: {}", id);
        }
        self.destroy(arena, id)
    }

    /// Display bounds or scale changed; refit its overlay
    pub fn on_metrics_changed(&mut self, arena: &WindowArena, display: DisplayInfo) -> bool {
        let id = display.id.clone();
        self.attached.insert(id.clone(), display.clone());

        let Some(record) = self.records.get_mut(&id) else {
            return false;
        };
        record.display = display;
        match arena.live(record.key) {
            Some(handle) => match handle.set_bounds(record.display.bounds) {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!("Failed to refit overlay for display {}: {}", id, e);
                    false
                }
            },
            None => false,
        }
    }

    /// Explicit close-for-display command
    pub fn close_for(&mut self, arena: &mut WindowArena, id: &str) -> bool {
        self.destroy(arena, id).is_some()
    }

    /// `created -> destroyed`: detach listeners, force closable, close, forget
    pub fn destroy(&mut self, arena: &mut WindowArena, id: &str) -> Option<WindowKey> {
        let record = self.records.shift_remove(id)?;
        if let Some(handle) = arena.remove(record.key) {
            handle.detach_listeners();
            if !handle.is_destroyed() {
                if let Err(e) = handle.set_closable(true) {
                    tracing::debug!("Could not force overlay {} closable: {}", record.key, e);
                }
                if let Err(e) = handle.close() {
                    tracing::warn!("Failed to close overlay {}: {}", record.key, e);
                }
            }
        }
        tracing::info!("Destroyed overlay {} for display {}", record.key, id);
        Some(record.key)
    }

    /// The overlay window went away on its own
    pub fn on_window_closed(&mut self, key: WindowKey) -> Option<DisplayId> {
        let id = self.display_of(key)?.clone();
        self.records.shift_remove(&id);
        tracing::info!("Overlay {} for display {} closed externally", key, id);
        Some(id)
    }

    /// Re-assert always-on-top on every live overlay; returns how many were touched
    pub fn reassert_topmost(
        &self,
        arena: &WindowArena,
        presentation: &dyn PresentationStrategy,
    ) -> usize {
        let level = Some(presentation.overlay_level());
        self.records
            .values()
            .filter_map(|record| arena.live(record.key))
            .filter(|handle| match handle.set_always_on_top(level) {
                Ok(()) => true,
                Err(e) => {
                    tracing::debug!("Topmost reassertion failed for {}: {}", handle.label(), e);
                    false
                }
            })
            .count()
    }

    /// Destroy every overlay
    pub fn close_all(&mut self, arena: &mut WindowArena) -> usize {
        let ids: Vec<DisplayId> = self.records.keys().cloned().collect();
        ids.iter()
            .filter(|id| self.destroy(arena, id).is_some())
            .count()
    }
}

/// Minimal query escaping for display ids
fn url_escape(raw: &str) -> String {
    url::form_urlencoded::byte_serialize(raw.as_bytes()).collect()
}
