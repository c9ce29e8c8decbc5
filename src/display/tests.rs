//! Tests for display overlays and hot-plug detection

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use super::*;
use crate::core::error::Result;
use crate::window::presentation::{LinuxPresentation, WindowsPresentation};
use crate::window::testing::MockFactory;
use crate::window::{
    lifecycle_channel, Bounds, LifecycleBus, LifecycleEvent, LifecycleKind, PointerMode,
    StackingLevel, WindowArena,
};

fn display(id: &str, x: i32) -> DisplayInfo {
    DisplayInfo::new(id, Bounds::new(x, 0, 1920, 1080))
}

struct Fixture {
    factory: MockFactory,
    bus: LifecycleBus,
    events: tokio::sync::mpsc::UnboundedReceiver<LifecycleEvent>,
    arena: WindowArena,
    registry: DisplayOverlayRegistry,
}

impl Fixture {
    fn new(auto_create: bool) -> Self {
        let (bus, events) = lifecycle_channel();
        Self {
            factory: MockFactory::new(),
            bus,
            events,
            arena: WindowArena::new(),
            registry: DisplayOverlayRegistry::new("overlay.html", auto_create),
        }
    }

    fn start(&mut self, displays: Vec<DisplayInfo>) -> Vec<(DisplayId, crate::window::WindowKey)> {
        self.registry.start(
            &mut self.arena,
            &self.factory,
            &self.bus,
            &WindowsPresentation,
            displays,
        )
    }

    fn add(&mut self, info: DisplayInfo) -> Option<crate::window::WindowKey> {
        self.registry
            .on_display_added(
                &mut self.arena,
                &self.factory,
                &self.bus,
                &WindowsPresentation,
                info,
            )
            .unwrap()
    }
}

#[test]
fn test_start_covers_every_display() {
    let mut fx = Fixture::new(false);
    let created = fx.start(vec![display("A", 0).primary(), display("B", 1920)]);

    assert_eq!(created.len(), 2);
    assert_eq!(fx.registry.len(), 2);

    let (_, key_b) = &created[1];
    let window = fx.factory.window(*key_b);
    let state = window.lock();
    assert_eq!(state.bounds, Bounds::new(1920, 0, 1920, 1080));
    assert!(state.visible);
    assert!(state.spec.transparent);
    assert!(state.spec.frameless);
    assert!(state.spec.skip_taskbar);
    assert_eq!(state.always_on_top, Some(StackingLevel::ScreenSaver));
    assert_eq!(state.pointer_mode, PointerMode::PassThrough { forward: true });
    assert_eq!(state.url, "overlay.html?display=B");
}

#[test]
fn test_hot_plug_with_auto_create() {
    let mut fx = Fixture::new(true);
    fx.start(vec![display("A", 0)]);

    let key = fx.add(display("B", 1920)).expect("overlay created for B");
    assert_eq!(fx.registry.len(), 2);
    assert_eq!(fx.registry.display_of(key).map(String::as_str), Some("B"));

    // A second "added" for the same display does not duplicate the overlay
    assert!(fx.add(display("B", 1920)).is_none());
    assert_eq!(fx.factory.created(), 2);
}

#[test]
fn test_hot_plug_without_auto_create() {
    let mut fx = Fixture::new(false);
    fx.start(vec![display("A", 0)]);

    assert!(fx.add(display("B", 1920)).is_none());
    assert_eq!(fx.registry.len(), 1);
    assert!(fx.registry.display("B").is_some());

    // Explicit creation still works for an attached display
    let key = fx
        .registry
        .create_for(
            &mut fx.arena,
            &fx.factory,
            &fx.bus,
            &WindowsPresentation,
            "B",
        )
        .unwrap();
    assert!(key.is_some());
    assert_eq!(fx.registry.len(), 2);
}

#[test]
fn test_create_for_unattached_display_is_not_found() {
    let mut fx = Fixture::new(true);
    let err = fx
        .registry
        .create_for(
            &mut fx.arena,
            &fx.factory,
            &fx.bus,
            &WindowsPresentation,
            "ghost",
        )
        .unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_remove_unknown_display_is_noop() {
    let mut fx = Fixture::new(true);
    fx.start(vec![display("A", 0)]);

    assert!(fx.registry.on_display_removed(&mut fx.arena, "Z").is_none());
    assert_eq!(fx.registry.len(), 1);
    assert_eq!(fx.arena.len(), 1);
}

#[test]
fn test_remove_known_display_destroys_overlay() {
    let mut fx = Fixture::new(true);
    let created = fx.start(vec![display("A", 0), display("B", 1920)]);
    let key_a = created[0].1;

    assert_eq!(fx.registry.on_display_removed(&mut fx.arena, "A"), Some(key_a));
    assert!(fx.registry.get("A").is_none());
    assert!(fx.registry.display("A").is_none());
    assert!(!fx.arena.contains(key_a));

    let window = fx.factory.window(key_a);
    let state = window.lock();
    assert!(state.destroyed);
    assert!(state.detached);
    assert!(state.closable);
    drop(state);

    // Listeners were detached before close, so no Closed event comes back
    assert!(fx.events.try_recv().is_err());

    // Removing again is a no-op
    assert!(fx.registry.on_display_removed(&mut fx.arena, "A").is_none());
}

#[test]
fn test_close_for_and_close_all() {
    let mut fx = Fixture::new(true);
    fx.start(vec![display("A", 0), display("B", 1920), display("C", 3840)]);

    assert!(fx.registry.close_for(&mut fx.arena, "B"));
    assert!(!fx.registry.close_for(&mut fx.arena, "B"));
    assert_eq!(fx.registry.len(), 2);

    assert_eq!(fx.registry.close_all(&mut fx.arena), 2);
    assert!(fx.registry.is_empty());
    assert!(fx.arena.is_empty());
    assert!(fx.factory.open_keys().is_empty());
}

#[test]
fn test_destroy_forces_non_closable_overlay_closed() {
    let mut fx = Fixture::new(true);
    let created = fx.start(vec![display("A", 0)]);
    let key = created[0].1;
    let window = fx.factory.window(key);
    window.lock().closable = false;

    assert!(fx.registry.close_for(&mut fx.arena, "A"));
    let state = window.lock();
    assert!(state.closable);
    assert!(state.destroyed);
    assert_eq!(state.close_calls, 1);
}

#[test]
fn test_externally_closed_overlay_is_forgotten() {
    let mut fx = Fixture::new(true);
    let created = fx.start(vec![display("A", 0)]);
    let key = created[0].1;

    // The user or OS closes the window without going through the registry
    fx.factory.window(key).lock().destroyed = true;
    assert_eq!(fx.registry.on_window_closed(key).as_deref(), Some("A"));
    assert!(fx.registry.is_empty());

    // The display is still attached, so the overlay can be recreated
    assert!(fx
        .registry
        .create_for(
            &mut fx.arena,
            &fx.factory,
            &fx.bus,
            &WindowsPresentation,
            "A",
        )
        .unwrap()
        .is_some());
}

#[test]
fn test_metrics_change_refits_overlay() {
    let mut fx = Fixture::new(true);
    let created = fx.start(vec![display("A", 0)]);
    let key = created[0].1;

    let mut resized = display("A", 0);
    resized.bounds = Bounds::new(0, 0, 2560, 1440);
    resized.scale_factor = 1.5;
    assert!(fx.registry.on_metrics_changed(&fx.arena, resized));

    assert_eq!(fx.factory.window(key).lock().bounds, Bounds::new(0, 0, 2560, 1440));
    assert_eq!(fx.registry.get("A").unwrap().display.scale_factor, 1.5);
}

#[test]
fn test_reassert_topmost_skips_destroyed() {
    let mut fx = Fixture::new(true);
    let created = fx.start(vec![display("A", 0), display("B", 1920)]);

    fx.factory.window(created[0].1).lock().destroyed = true;
    assert_eq!(fx.registry.reassert_topmost(&fx.arena, &LinuxPresentation), 1);

    let state = fx.factory.window(created[1].1);
    let state = state.lock();
    assert_eq!(state.topmost_calls, 1);
    assert_eq!(state.always_on_top, Some(StackingLevel::Floating));
}

#[test]
fn test_creation_failure_at_start_is_logged_not_fatal() {
    let mut fx = Fixture::new(true);
    fx.factory.fail_creation(true);
    let created = fx.start(vec![display("A", 0)]);
    assert!(created.is_empty());
    assert!(fx.registry.is_empty());
    assert!(fx.registry.display("A").is_some());
}

#[test]
fn test_display_at() {
    let mut fx = Fixture::new(true);
    fx.start(vec![display("A", 0), display("B", 1920)]);
    assert_eq!(fx.registry.display_at(2000, 10).map(String::as_str), Some("B"));
    assert!(fx.registry.display_at(-5, 10).is_none());
}

#[test]
fn test_watcher_diff() {
    let mut watcher = DisplayWatcher::new(vec![display("A", 0), display("B", 1920)]);

    // No change, no events
    assert!(watcher.diff(vec![display("A", 0), display("B", 1920)]).is_empty());

    let mut moved = display("B", 2560);
    moved.scale_factor = 2.0;
    let events = watcher.diff(vec![display("A", 0), moved.clone(), display("C", 5000)]);
    assert_eq!(
        events,
        vec![
            DisplayEvent::MetricsChanged(moved),
            DisplayEvent::Added(display("C", 5000)),
        ]
    );

    let events = watcher.diff(vec![display("C", 5000)]);
    assert_eq!(
        events,
        vec![
            DisplayEvent::Removed("A".to_string()),
            DisplayEvent::Removed("B".to_string()),
        ]
    );
    assert_eq!(watcher.known().count(), 1);
}

struct ScriptedSource {
    current: Mutex<Vec<DisplayInfo>>,
}

impl DisplaySource for ScriptedSource {
    fn enumerate(&self) -> Result<Vec<DisplayInfo>> {
        Ok(self.current.lock().clone())
    }
}

#[tokio::test(start_paused = true)]
async fn test_poller_emits_hot_plug_and_stops_on_cancel() {
    let source = Arc::new(ScriptedSource {
        current: Mutex::new(vec![display("A", 0)]),
    });
    let seen = Arc::new(Mutex::new(Vec::new()));
    let cancel = CancellationToken::new();

    let sink = Arc::clone(&seen);
    let task = spawn_display_poller(
        source.clone(),
        vec![display("A", 0)],
        Duration::from_millis(500),
        cancel.clone(),
        move |event| {
            sink.lock().push(event);
            true
        },
    );

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(seen.lock().is_empty());

    source.current.lock().push(display("B", 1920));
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(*seen.lock(), vec![DisplayEvent::Added(display("B", 1920))]);

    cancel.cancel();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_poller_stops_when_receiver_gone() {
    let source = Arc::new(ScriptedSource {
        current: Mutex::new(vec![display("A", 0)]),
    });
    let task = spawn_display_poller(
        source,
        Vec::new(),
        Duration::from_millis(100),
        CancellationToken::new(),
        |_| false,
    );

    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("poller exits")
        .unwrap();
}

#[test]
fn test_display_info_serializes_camel_case() {
    let value = serde_json::to_value(display("A", 0).primary()).unwrap();
    assert_eq!(value["isPrimary"], true);
    assert_eq!(value["scaleFactor"], 1.0);
    assert!(value.get("name").is_none());
}

#[test]
fn test_closed_event_from_external_close_reaches_bus() {
    let mut fx = Fixture::new(true);
    let created = fx.start(vec![display("A", 0)]);
    let key = created[0].1;

    fx.arena.get(key).unwrap().close().unwrap();
    let event = fx.events.try_recv().unwrap();
    assert_eq!(event.key, key);
    assert_eq!(event.kind, LifecycleKind::Closed);
}
