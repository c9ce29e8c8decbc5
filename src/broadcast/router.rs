//! Telemetry broadcast router
//!
//! Holds the latest snapshot and connectivity flag and fans both out to
//! every reachable window. Delivery is best effort: a failing window is
//! evicted and never aborts the rest of the fan-out.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use serde_json::{json, Value};

use super::memory::MemoryProbe;
use crate::core::error::OverlayError;
use crate::window::{Channel, WindowArena, WindowKey};

/// Most recent telemetry payload
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySnapshot {
    pub payload: Value,
    pub received_at: DateTime<Utc>,
}

impl TelemetrySnapshot {
    pub fn new(payload: Value) -> Self {
        Self {
            payload,
            received_at: Utc::now(),
        }
    }
}

/// Non-owning broadcast targets registered by id
///
/// Entries hold arena keys only; a key whose window is gone resolves to
/// nothing and is pruned lazily.
#[derive(Debug, Default)]
pub struct SubscriberSet {
    entries: IndexMap<String, WindowKey>,
}

impl SubscriberSet {
    /// Add or overwrite; returns the previous key for `id`
    pub fn register(&mut self, id: impl Into<String>, key: WindowKey) -> Option<WindowKey> {
        self.entries.insert(id.into(), key)
    }

    pub fn get(&self, id: &str) -> Option<WindowKey> {
        self.entries.get(id).copied()
    }

    pub fn contains_key(&self, key: WindowKey) -> bool {
        self.entries.values().any(|k| *k == key)
    }

    /// Drop every entry pointing at `key`; returns how many were dropped
    pub fn evict(&mut self, key: WindowKey) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, k| *k != key);
        before - self.entries.len()
    }

    pub fn retain(&mut self, mut keep: impl FnMut(WindowKey) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, k| keep(*k));
        before - self.entries.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = WindowKey> + '_ {
        self.entries.values().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Outcome of one fan-out
#[derive(Debug, Default)]
pub struct BroadcastReport {
    /// Windows that accepted the message, in delivery order
    pub delivered: Vec<WindowKey>,
    /// Windows skipped because they reported themselves destroyed
    pub evicted: Vec<WindowKey>,
    /// Windows whose send failed; each is evicted as well
    pub failures: Vec<(WindowKey, OverlayError)>,
}

impl BroadcastReport {
    pub fn attempts(&self) -> usize {
        self.delivered.len() + self.failures.len()
    }

    fn merge(&mut self, other: BroadcastReport) {
        self.delivered.extend(other.delivered);
        self.evicted.extend(other.evicted);
        self.failures.extend(other.failures);
    }
}

/// Outcome of one watchdog pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchdogReport {
    pub pruned: usize,
    pub resident_bytes: Option<u64>,
    pub snapshot_cleared: bool,
}

/// Latest-value cache plus best-effort fan-out
#[derive(Debug, Default)]
pub struct TelemetryBroadcastRouter {
    snapshot: Option<TelemetrySnapshot>,
    connected: bool,
    /// Windows were last told the source is gone
    disconnect_announced: bool,
    subscribers: SubscriberSet,
    /// Windows whose send failed; skipped until they register again
    unreachable: HashSet<WindowKey>,
}

impl TelemetryBroadcastRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Option<&TelemetrySnapshot> {
        self.snapshot.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn subscribers(&self) -> &SubscriberSet {
        &self.subscribers
    }

    /// Replace the snapshot, mark connected and fan it out to every target
    ///
    /// The first sample after an announced disconnect also pushes
    /// `{connected: true}` so windows leave their disconnected state.
    pub fn ingest(
        &mut self,
        arena: &WindowArena,
        targets: impl IntoIterator<Item = WindowKey>,
        sample: Value,
    ) -> BroadcastReport {
        let targets: Vec<WindowKey> = targets.into_iter().collect();
        let snapshot = TelemetrySnapshot::new(sample);
        let payload = snapshot.payload.clone();
        self.snapshot = Some(snapshot);
        self.connected = true;

        let mut report = self.broadcast(arena, targets.clone(), Channel::TelemetryUpdate, &payload);
        if self.disconnect_announced {
            self.disconnect_announced = false;
            tracing::info!("Telemetry source connectivity restored by incoming sample");
            report.merge(self.broadcast(
                arena,
                targets,
                Channel::ConnectionStatus,
                &connectivity_payload(true),
            ));
        }
        report
    }

    /// Update connectivity and push the change independent of the snapshot
    pub fn set_connectivity(
        &mut self,
        arena: &WindowArena,
        targets: impl IntoIterator<Item = WindowKey>,
        connected: bool,
    ) -> BroadcastReport {
        if self.connected != connected {
            tracing::info!("Telemetry source connectivity: {}", connected);
        }
        self.connected = connected;
        self.disconnect_announced = !connected;
        self.broadcast(
            arena,
            targets,
            Channel::ConnectionStatus,
            &connectivity_payload(connected),
        )
    }

    /// Register a late joiner and push it the current state immediately
    pub fn register_subscriber(
        &mut self,
        arena: &WindowArena,
        id: impl Into<String>,
        key: WindowKey,
    ) -> BroadcastReport {
        let id = id.into();
        self.unreachable.remove(&key);
        if let Some(previous) = self.subscribers.register(id.clone(), key) {
            if previous != key {
                tracing::debug!("Subscriber '{}' moved from {} to {}", id, previous, key);
            }
        }

        let mut report = BroadcastReport::default();
        let Some(snapshot) = &self.snapshot else {
            return report;
        };
        let payload = snapshot.payload.clone();
        let only = |key| IndexSet::from([key]);
        report.merge(self.deliver(arena, only(key), Channel::TelemetryUpdate, &payload));
        if report.delivered.contains(&key) {
            let status = connectivity_payload(self.connected);
            report.merge(self.deliver(arena, only(key), Channel::ConnectionStatus, &status));
        }
        report
    }

    /// Deliver once to every distinct target and subscriber
    ///
    /// Destroyed windows are skipped and evicted; a failed send is recorded
    /// as `SendFailure`, evicted, and the fan-out continues.
    pub fn broadcast(
        &mut self,
        arena: &WindowArena,
        targets: impl IntoIterator<Item = WindowKey>,
        channel: Channel,
        payload: &Value,
    ) -> BroadcastReport {
        let recipients: IndexSet<WindowKey> = targets
            .into_iter()
            .chain(self.subscribers.keys())
            .filter(|key| !self.unreachable.contains(key))
            .collect();
        self.deliver(arena, recipients, channel, payload)
    }

    fn deliver(
        &mut self,
        arena: &WindowArena,
        recipients: IndexSet<WindowKey>,
        channel: Channel,
        payload: &Value,
    ) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        for key in recipients {
            let Some(handle) = arena.live(key) else {
                self.evict(key);
                report.evicted.push(key);
                continue;
            };
            match handle.send(channel, payload) {
                Ok(()) => report.delivered.push(key),
                Err(e) => {
                    tracing::warn!("Dropping {} after failed {} push: {}", key, channel, e);
                    self.evict(key);
                    report.failures.push((
                        key,
                        OverlayError::SendFailure {
                            key,
                            reason: e.to_string(),
                        },
                    ));
                }
            }
        }

        if !report.evicted.is_empty() {
            tracing::debug!("Evicted {} destroyed window(s) from {}", report.evicted.len(), channel);
        }
        report
    }

    fn evict(&mut self, key: WindowKey) {
        self.subscribers.evict(key);
        self.unreachable.insert(key);
    }

    /// Forget everything about a window that has closed
    pub fn forget(&mut self, key: WindowKey) {
        self.subscribers.evict(key);
        self.unreachable.remove(&key);
    }

    /// Prune dead subscribers; drop the snapshot when memory exceeds `threshold_bytes`
    pub fn run_watchdog(
        &mut self,
        arena: &WindowArena,
        probe: &mut dyn MemoryProbe,
        threshold_bytes: u64,
    ) -> WatchdogReport {
        let pruned = self.subscribers.retain(|key| arena.live(key).is_some());
        self.unreachable.retain(|key| arena.contains(*key));

        let resident_bytes = probe.resident_bytes();
        let snapshot_cleared = match resident_bytes {
            Some(bytes) if bytes > threshold_bytes && self.snapshot.is_some() => {
                tracing::warn!(
                    "Resident memory {} MB exceeds {} MB, discarding cached telemetry",
                    bytes / (1024 * 1024),
                    threshold_bytes / (1024 * 1024)
                );
                self.snapshot = None;
                true
            }
            _ => false,
        };

        if pruned > 0 {
            tracing::debug!("Watchdog pruned {} dead subscriber(s)", pruned);
        }
        WatchdogReport {
            pruned,
            resident_bytes,
            snapshot_cleared,
        }
    }
}

fn connectivity_payload(connected: bool) -> Value {
    json!({ "connected": connected })
}
