//! Display hot-plug detection
//!
//! Platforms without a reliable connect/disconnect callback are polled:
//! every tick the attached displays are enumerated and diffed against the
//! previous enumeration.

use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{DisplayEvent, DisplayId, DisplayInfo};
use crate::core::error::Result;

/// Enumerates attached displays
pub trait DisplaySource: Send + Sync {
    fn enumerate(&self) -> Result<Vec<DisplayInfo>>;
}

/// Diffs successive display enumerations into hot-plug events
#[derive(Debug, Default)]
pub struct DisplayWatcher {
    known: IndexMap<DisplayId, DisplayInfo>,
}

impl DisplayWatcher {
    /// Seed with the displays already handled at startup
    pub fn new(initial: impl IntoIterator<Item = DisplayInfo>) -> Self {
        Self {
            known: initial
                .into_iter()
                .map(|display| (display.id.clone(), display))
                .collect(),
        }
    }

    pub fn known(&self) -> impl Iterator<Item = &DisplayInfo> {
        self.known.values()
    }

    /// Removals first, then additions and metric changes in enumeration order
    pub fn diff(&mut self, current: Vec<DisplayInfo>) -> Vec<DisplayEvent> {
        let mut events: Vec<DisplayEvent> = self
            .known
            .keys()
            .filter(|id| !current.iter().any(|display| &display.id == *id))
            .cloned()
            .map(DisplayEvent::Removed)
            .collect();

        let mut next = IndexMap::with_capacity(current.len());
        for display in current {
            match self.known.get(&display.id) {
                None => events.push(DisplayEvent::Added(display.clone())),
                Some(previous)
                    if previous.bounds != display.bounds
                        || previous.scale_factor != display.scale_factor =>
                {
                    events.push(DisplayEvent::MetricsChanged(display.clone()))
                }
                Some(_) => {}
            }
            next.insert(display.id.clone(), display);
        }

        self.known = next;
        events
    }
}

/// Poll `source` every `interval` and hand each hot-plug event to `emit`
///
/// The task ends when `cancel` fires or `emit` returns false.
pub fn spawn_display_poller<F>(
    source: Arc<dyn DisplaySource>,
    initial: Vec<DisplayInfo>,
    interval: Duration,
    cancel: CancellationToken,
    mut emit: F,
) -> JoinHandle<()>
where
    F: FnMut(DisplayEvent) -> bool + Send + 'static,
{
    tokio::spawn(async move {
        let mut watcher = DisplayWatcher::new(initial);
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // First tick completes immediately; startup already handled those displays
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("Display poller cancelled");
                    break;
                }
                _ = ticker.tick() => {
                    let current = match source.enumerate() {
                        Ok(current) => current,
                        Err(e) => {
                            tracing::warn!("Display enumeration failed: {}", e);
                            continue;
                        }
                    };
                    for event in watcher.diff(current) {
                        tracing::debug!("Display event: {:?}", event);
                        if !emit(event) {
                            tracing::debug!("Display event receiver gone, stopping poller");
                            return;
                        }
                    }
                }
            }
        }
    })
}
