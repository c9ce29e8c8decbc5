//! Overlay context
//!
//! The explicit owner of every piece of orchestration state. Nothing here
//! is shared or locked; the event loop holds the only `&mut`.

use serde_json::{json, Value};

use crate::broadcast::{MemoryProbe, TelemetryBroadcastRouter, WatchdogReport};
use crate::click_through::{ClickThroughController, ClickThroughState};
use crate::core::config::AppConfig;
use crate::core::error::{OverlayError, Result};
use crate::display::{DisplayEvent, DisplayInfo, DisplayOverlayRegistry};
use crate::gateway::{success, Caller, Command, GatewayError};
use crate::widget::{CreateWidget, WidgetRegistry};
use crate::window::{
    LifecycleBus, LifecycleEvent, LifecycleKind, PresentationStrategy, WindowArena,
    WindowFactory, WindowKey,
};

/// Application-root state passed by reference into each component
pub struct OverlayContext {
    config: AppConfig,
    arena: WindowArena,
    bus: LifecycleBus,
    factory: Box<dyn WindowFactory>,
    presentation: Box<dyn PresentationStrategy>,
    probe: Box<dyn MemoryProbe>,
    widgets: WidgetRegistry,
    displays: DisplayOverlayRegistry,
    click_through: ClickThroughController,
    router: TelemetryBroadcastRouter,
}

impl OverlayContext {
    pub fn new(
        config: AppConfig,
        bus: LifecycleBus,
        factory: Box<dyn WindowFactory>,
        presentation: Box<dyn PresentationStrategy>,
        probe: Box<dyn MemoryProbe>,
    ) -> Self {
        let widgets = WidgetRegistry::new(config.widget_defaults, config.widget_entry.clone());
        let displays =
            DisplayOverlayRegistry::new(config.overlay_entry.clone(), config.auto_create_overlays);
        tracing::info!("Overlay context using {} presentation", presentation.platform());

        Self {
            config,
            arena: WindowArena::new(),
            bus,
            factory,
            presentation,
            probe,
            widgets,
            displays,
            click_through: ClickThroughController::new(),
            router: TelemetryBroadcastRouter::new(),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn arena(&self) -> &WindowArena {
        &self.arena
    }

    pub fn widgets(&self) -> &WidgetRegistry {
        &self.widgets
    }

    pub fn displays(&self) -> &DisplayOverlayRegistry {
        &self.displays
    }

    pub fn click_through(&self) -> &ClickThroughController {
        &self.click_through
    }

    pub fn router(&self) -> &TelemetryBroadcastRouter {
        &self.router
    }

    /// Cover every attached display with an overlay
    pub fn start(&mut self, displays: Vec<DisplayInfo>) -> usize {
        let created = self.displays.start(
            &mut self.arena,
            self.factory.as_ref(),
            &self.bus,
            self.presentation.as_ref(),
            displays,
        );
        for (_, key) in &created {
            self.click_through
                .track(*key, ClickThroughState::TransparentForwarding);
        }
        tracing::info!("Started with {} overlay window(s)", created.len());
        created.len()
    }

    /// Run one decoded command on behalf of `caller`
    pub fn execute(&mut self, caller: &Caller, command: Command) -> Result<Value> {
        tracing::debug!("Executing {:?} for {:?}", command, caller.label);
        match command {
            Command::WidgetCreate {
                id,
                widget_type,
                geometry,
                always_on_top,
                params,
            } => {
                let request = CreateWidget {
                    id: id.clone(),
                    widget_type,
                    geometry,
                    always_on_top,
                    params,
                };
                self.widgets.create(
                    &mut self.arena,
                    self.factory.as_ref(),
                    &self.bus,
                    self.presentation.as_ref(),
                    request,
                )?;
                Ok(success(json!({ "id": id })))
            }
            Command::WidgetClose { id } => {
                let closed = self.widgets.close(&self.arena, &id);
                found(closed, || format!("widget '{}'", id))
            }
            Command::WidgetGet { id } => {
                let record = self
                    .widgets
                    .get(&id)
                    .ok_or_else(|| OverlayError::not_found(format!("widget '{}'", id)))?;
                Ok(success(json!({ "widget": record })))
            }
            Command::WidgetListAll => Ok(success(json!({ "ids": self.widgets.list() }))),
            Command::WidgetSetPosition { id, x, y } => {
                let applied = self.widgets.set_position(&self.arena, &id, x, y);
                found(applied, || format!("widget '{}'", id))
            }
            Command::WidgetSetSize { id, width, height } => {
                let applied = self.widgets.set_size(&self.arena, &id, width, height);
                found(applied, || format!("widget '{}'", id))
            }
            Command::WidgetSetAlwaysOnTop { id, always_on_top } => {
                let applied = self.widgets.set_always_on_top(
                    &self.arena,
                    self.presentation.as_ref(),
                    &id,
                    always_on_top,
                );
                found(applied, || format!("widget '{}'", id))
            }
            Command::WidgetSetOpacity { id, opacity } => {
                let applied = self.widgets.set_opacity(&self.arena, &id, opacity);
                found(applied, || format!("widget '{}'", id))
            }
            Command::WidgetSetVisible { id, visible } => {
                let applied = self.widgets.set_visible(&self.arena, &id, visible);
                found(applied, || format!("widget '{}'", id))
            }
            Command::WidgetUpdateParams { id, params } => {
                let applied = self.widgets.update_params(&self.arena, &id, params);
                found(applied, || format!("widget '{}'", id))
            }
            Command::WidgetRegisterForUpdates { id } => {
                let key = self
                    .caller_key(caller)
                    .or_else(|| self.widgets.key_of(&id))
                    .ok_or_else(|| GatewayError::NoCaller("widget.registerForUpdates".into()))?;
                let report = self.router.register_subscriber(&self.arena, id, key);
                if let Some((_, e)) = report.failures.first() {
                    tracing::warn!("Late-joiner push failed: {}", e);
                }
                Ok(Value::Null)
            }
            Command::DisplayListAll => {
                let displays: Vec<&DisplayInfo> = self.displays.displays().collect();
                Ok(success(json!({ "displays": displays })))
            }
            Command::DisplayCloseWindowFor { id } => {
                let id = match id {
                    Some(id) => id,
                    None => self
                        .caller_display(caller)
                        .ok_or_else(|| OverlayError::not_found("display of calling window"))?,
                };
                if let Some(key) = self.displays.get(&id).map(|record| record.key) {
                    self.click_through.untrack(key);
                    self.router.forget(key);
                }
                let closed = self.displays.close_for(&mut self.arena, &id);
                found(closed, || format!("overlay for display '{}'", id))
            }
            Command::DisplayCreateWindowFor { id } => {
                let key = self.displays.create_for(
                    &mut self.arena,
                    self.factory.as_ref(),
                    &self.bus,
                    self.presentation.as_ref(),
                    &id,
                )?;
                if let Some(key) = key {
                    self.click_through
                        .track(key, ClickThroughState::TransparentForwarding);
                }
                Ok(success(json!({ "created": key.is_some() })))
            }
            Command::AppToggleClickThrough { target, state } => {
                let key = self.resolve_target(caller, target.as_deref())?;
                let state =
                    self.click_through
                        .apply(&self.arena, self.presentation.as_ref(), key, state)?;
                Ok(success(json!({ "state": state.is_enabled() })))
            }
            Command::AppGetClickThrough { target } => {
                let key = self.resolve_target(caller, target.as_deref())?;
                let state = self
                    .click_through
                    .state(key)
                    .ok_or_else(|| OverlayError::not_found(format!("overlay {}", key)))?;
                Ok(success(json!({ "state": state.is_enabled() })))
            }
            Command::AppSetAutoCreate { enabled } => {
                self.displays.set_auto_create(enabled);
                Ok(success(json!({ "state": enabled })))
            }
            Command::AppGetAutoCreate => {
                Ok(success(json!({ "state": self.displays.auto_create() })))
            }
            Command::AppWindowReady => {
                let key = self
                    .caller_key(caller)
                    .ok_or_else(|| GatewayError::NoCaller("app.windowReady".into()))?;
                self.handle_lifecycle(LifecycleEvent {
                    key,
                    kind: LifecycleKind::Ready,
                });
                Ok(Value::Null)
            }
            Command::TelemetryIngest { sample } => {
                self.ingest(sample);
                Ok(Value::Null)
            }
            Command::TelemetrySetConnectivity { connected } => {
                self.set_connectivity(connected);
                Ok(Value::Null)
            }
            Command::TelemetryGetLatest => Ok(self
                .router
                .latest()
                .map(|snapshot| snapshot.payload.clone())
                .unwrap_or(Value::Null)),
            Command::TelemetryGetConnectivity => Ok(Value::Bool(self.router.is_connected())),
        }
    }

    fn targets(&self) -> Vec<WindowKey> {
        self.widgets.keys().chain(self.displays.keys()).collect()
    }

    pub fn ingest(&mut self, sample: Value) {
        let targets = self.targets();
        let report = self.router.ingest(&self.arena, targets, sample);
        tracing::trace!(
            "Telemetry delivered to {} window(s), {} failure(s)",
            report.delivered.len(),
            report.failures.len()
        );
    }

    pub fn set_connectivity(&mut self, connected: bool) {
        let targets = self.targets();
        self.router.set_connectivity(&self.arena, targets, connected);
    }

    /// Apply a lifecycle signal observed from a window
    pub fn handle_lifecycle(&mut self, event: LifecycleEvent) {
        let LifecycleEvent { key, kind } = event;
        match kind {
            LifecycleKind::Ready => {
                self.widgets.on_ready(&self.arena, key);
            }
            LifecycleKind::Navigated => {
                tracing::trace!("Window {} finished navigation", key);
            }
            LifecycleKind::Focused(focused) => {
                self.widgets.on_focus(&self.arena, key, focused);
            }
            LifecycleKind::Closed => self.forget_window(key),
        }
    }

    fn forget_window(&mut self, key: WindowKey) {
        self.widgets.on_closed(key);
        if self.displays.on_window_closed(key).is_some() {
            self.click_through.untrack(key);
        }
        self.router.forget(key);
        self.arena.remove(key);
    }

    /// Apply a display hot-plug notification
    pub fn handle_display_event(&mut self, event: DisplayEvent) {
        match event {
            DisplayEvent::Added(display) => {
                let id = display.id.clone();
                match self.displays.on_display_added(
                    &mut self.arena,
                    self.factory.as_ref(),
                    &self.bus,
                    self.presentation.as_ref(),
                    display,
                ) {
                    Ok(Some(key)) => self
                        .click_through
                        .track(key, ClickThroughState::TransparentForwarding),
                    Ok(None) => {}
                    Err(e) => tracing::error!("Overlay for new display {} failed: {}", id, e),
                }
            }
            DisplayEvent::Removed(id) => {
                if let Some(key) = self.displays.on_display_removed(&mut self.arena, &id) {
                    self.click_through.untrack(key);
                    self.router.forget(key);
                }
            }
            DisplayEvent::MetricsChanged(display) => {
                self.displays.on_metrics_changed(&self.arena, display);
            }
        }
    }

    /// Global shortcut handler
    pub fn toggle_click_through_all(&mut self) -> ClickThroughState {
        self.click_through
            .toggle_all(&self.arena, self.presentation.as_ref())
    }

    pub fn reassert_topmost(&self) -> usize {
        self.displays
            .reassert_topmost(&self.arena, self.presentation.as_ref())
    }

    pub fn run_memory_watchdog(&mut self) -> WatchdogReport {
        let threshold = self.config.memory_threshold_bytes();
        self.router
            .run_watchdog(&self.arena, self.probe.as_mut(), threshold)
    }

    /// Close every owned window; returns how many were closed
    pub fn shutdown(&mut self) -> usize {
        let widgets = self.widgets.close_all(&mut self.arena);
        let overlays = self.displays.close_all(&mut self.arena);
        for key in self.arena.keys().collect::<Vec<_>>() {
            self.arena.remove(key);
        }
        tracing::info!("Closed {} widget(s) and {} overlay(s)", widgets, overlays);
        widgets + overlays
    }

    fn caller_key(&self, caller: &Caller) -> Option<WindowKey> {
        caller
            .label
            .as_deref()
            .and_then(|label| self.arena.find_by_label(label))
    }

    fn resolve_target(&self, caller: &Caller, target: Option<&str>) -> Result<WindowKey> {
        match target {
            Some(label) => self
                .arena
                .find_by_label(label)
                .ok_or_else(|| OverlayError::not_found(format!("window '{}'", label))),
            None => self
                .caller_key(caller)
                .ok_or_else(|| GatewayError::NoCaller("app.toggleClickThrough".into()).into()),
        }
    }

    /// Display under the calling window: its own overlay, or the one containing a widget
    fn caller_display(&self, caller: &Caller) -> Option<String> {
        let key = self.caller_key(caller)?;
        if let Some(id) = self.displays.display_of(key) {
            return Some(id.clone());
        }
        let record = self.widgets.get(self.widgets.id_of(key)?)?;
        let (x, y) = (record.x?, record.y?);
        self.displays.display_at(x, y).cloned()
    }
}

fn found(applied: bool, what: impl FnOnce() -> String) -> Result<Value> {
    if applied {
        Ok(success(Value::Null))
    } else {
        Err(OverlayError::not_found(what()))
    }
}
