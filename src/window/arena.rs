//! Window arena
//!
//! Single owner of every native window handle. Registries only hold
//! `WindowKey`s; removing a key here is the one point where a window stops
//! being reachable.

use std::collections::HashMap;

use super::{LifecycleBus, WindowFactory, WindowHandle, WindowKey, WindowKind, WindowResult, WindowSpec};

struct ArenaEntry {
    kind: WindowKind,
    handle: Box<dyn WindowHandle>,
}

/// Arena of window handles indexed by stable keys
pub struct WindowArena {
    next_key: u64,
    entries: HashMap<WindowKey, ArenaEntry>,
}

impl WindowArena {
    pub fn new() -> Self {
        Self {
            next_key: 1,
            entries: HashMap::new(),
        }
    }

    /// Reserve a key that has never been handed out before
    pub fn allocate_key(&mut self) -> WindowKey {
        let key = WindowKey::new(self.next_key);
        self.next_key += 1;
        key
    }

    /// Allocate a key, create the window through the factory and take ownership
    pub fn spawn(
        &mut self,
        factory: &dyn WindowFactory,
        bus: &LifecycleBus,
        spec: &WindowSpec,
    ) -> WindowResult<WindowKey> {
        let key = self.allocate_key();
        let handle = factory.create(key, spec, bus.sink_for(key))?;
        self.insert(key, spec.kind, handle);
        Ok(key)
    }

    pub fn insert(&mut self, key: WindowKey, kind: WindowKind, handle: Box<dyn WindowHandle>) {
        self.entries.insert(key, ArenaEntry { kind, handle });
    }

    /// Handle for a key, whether or not the native window still exists
    pub fn get(&self, key: WindowKey) -> Option<&dyn WindowHandle> {
        self.entries.get(&key).map(|entry| entry.handle.as_ref())
    }

    /// Handle for a key only if the native window is still alive
    pub fn live(&self, key: WindowKey) -> Option<&dyn WindowHandle> {
        self.get(key).filter(|handle| !handle.is_destroyed())
    }

    pub fn kind(&self, key: WindowKey) -> Option<WindowKind> {
        self.entries.get(&key).map(|entry| entry.kind)
    }

    pub fn remove(&mut self, key: WindowKey) -> Option<Box<dyn WindowHandle>> {
        self.entries.remove(&key).map(|entry| entry.handle)
    }

    pub fn contains(&self, key: WindowKey) -> bool {
        self.entries.contains_key(&key)
    }

    pub fn find_by_label(&self, label: &str) -> Option<WindowKey> {
        self.entries
            .iter()
            .find(|(_, entry)| entry.handle.label() == label)
            .map(|(key, _)| *key)
    }

    pub fn keys(&self) -> impl Iterator<Item = WindowKey> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for WindowArena {
    fn default() -> Self {
        Self::new()
    }
}
