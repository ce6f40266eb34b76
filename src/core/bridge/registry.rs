//! Connection registry.
//!
//! Process-wide map from connection identity to its bridge. Created at
//! server start, drained at shutdown.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::bridge::Bridge;

/// Opaque per-connection identity. Only ever used as a map key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(uuid::Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Shared handle to the connection -> bridge map.
///
/// Cloning is cheap; all clones see the same map.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    bridges: Arc<DashMap<ConnectionId, Arc<Bridge>>>,
}

impl fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("len", &self.bridges.len())
            .finish()
    }
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &ConnectionId) -> Option<Arc<Bridge>> {
        self.bridges.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Insert `bridge` under its own id unless that id is already taken.
    pub fn insert_if_absent(&self, bridge: Arc<Bridge>) -> bool {
        match self.bridges.entry(bridge.id()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(bridge);
                true
            }
        }
    }

    pub fn remove(&self, id: &ConnectionId) -> Option<Arc<Bridge>> {
        self.bridges.remove(id).map(|(_, bridge)| bridge)
    }

    /// Remove the entry for `bridge.id()` only if it still points at `bridge`.
    pub(crate) fn remove_bridge(&self, bridge: &Bridge) -> bool {
        self.bridges
            .remove_if(&bridge.id(), |_, current| {
                std::ptr::eq(Arc::as_ptr(current), bridge)
            })
            .is_some()
    }

    /// Remove and close the bridge for `id`. Returns whether one existed.
    pub fn close(&self, id: &ConnectionId) -> bool {
        // The map guard is released before `Bridge::close` runs
        match self.remove(id) {
            Some(bridge) => {
                bridge.close();
                true
            }
            None => false,
        }
    }

    /// Close every bridge. Returns how many were closed.
    pub fn drain(&self) -> usize {
        let ids: Vec<ConnectionId> = self.bridges.iter().map(|entry| *entry.key()).collect();
        ids.iter().filter(|id| self.close(id)).count()
    }

    pub fn len(&self) -> usize {
        self.bridges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bridges.is_empty()
    }
}
