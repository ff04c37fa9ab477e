//! Replay-time handle map (§3.7).
//!
//! A dense `trace_handle → live_handle` mapping per namespace, with reverse
//! lookup for [`gltrace_snapshot::TraceHandleResolver`] (capturing a
//! mid-replay snapshot needs to write trace-side handles back into the
//! document). Namespace value 0 always maps to 0 in both directions and is
//! never stored. A mapping is created by the packet that generates a handle
//! and destroyed by the one that deletes it (§4.H.2 step 4); no other
//! caller mutates it.

use std::collections::HashMap;

use gltrace_snapshot::TraceHandleResolver;
use gltrace_types::HandleNamespace;

/// Owns every namespace's `trace_handle -> live_handle` mapping for one
/// replay run.
#[derive(Debug, Default)]
pub struct HandleMap {
    forward: HashMap<(HandleNamespace, u64), u64>,
    reverse: HashMap<(HandleNamespace, u64), u64>,
}

impl HandleMap {
    /// An empty handle map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `trace_handle -> live_handle` in `namespace`. A later
    /// lookup of either direction returns the other. Re-inserting the same
    /// trace handle overwrites its previous live handle (and removes the
    /// stale reverse entry), matching a recorder that reuses a trace handle
    /// value after deleting the object it used to name.
    pub fn insert(&mut self, namespace: HandleNamespace, trace_handle: u64, live_handle: u64) {
        if trace_handle == 0 || live_handle == 0 {
            return;
        }
        if let Some(stale_live) = self.forward.insert((namespace, trace_handle), live_handle) {
            self.reverse.remove(&(namespace, stale_live));
        }
        self.reverse.insert((namespace, live_handle), trace_handle);
    }

    /// Erase the mapping for `trace_handle` in `namespace`, as a deleting
    /// packet requires. A no-op if no mapping exists.
    pub fn erase(&mut self, namespace: HandleNamespace, trace_handle: u64) {
        if let Some(live) = self.forward.remove(&(namespace, trace_handle)) {
            self.reverse.remove(&(namespace, live));
        }
    }

    /// The live handle `trace_handle` currently maps to in `namespace`, if
    /// any. Namespace value 0 always resolves to `Some(0)`.
    #[must_use]
    pub fn live(&self, namespace: HandleNamespace, trace_handle: u64) -> Option<u64> {
        if trace_handle == 0 {
            return Some(0);
        }
        self.forward.get(&(namespace, trace_handle)).copied()
    }

    /// Fold a snapshot restore's freshly created handles into this map, as
    /// the engine does right after restoring a keyframe (§4.H.5).
    pub fn merge_restore(&mut self, restored: &gltrace_snapshot::RestoreHandleMap) {
        for (namespace, trace_handle, live_handle) in restored.iter() {
            self.insert(namespace, trace_handle, live_handle);
        }
    }

    /// Every trace handle currently live in `namespace`, for the handle-map
    /// contract checks of §8 property 8.
    #[must_use]
    pub fn live_trace_handles(&self, namespace: HandleNamespace) -> Vec<u64> {
        self.forward.keys().filter(|(ns, _)| *ns == namespace).map(|(_, h)| *h).collect()
    }
}

impl TraceHandleResolver for HandleMap {
    fn trace_handle_for(&self, namespace: HandleNamespace, live_handle: u64) -> u64 {
        if live_handle == 0 {
            return 0;
        }
        self.reverse.get(&(namespace, live_handle)).copied().unwrap_or(live_handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_always_maps_to_zero() {
        let map = HandleMap::new();
        assert_eq!(map.live(HandleNamespace::Texture, 0), Some(0));
        assert_eq!(map.trace_handle_for(HandleNamespace::Texture, 0), 0);
    }

    #[test]
    fn insert_then_lookup_both_directions() {
        let mut map = HandleMap::new();
        map.insert(HandleNamespace::Texture, 7, 13);
        assert_eq!(map.live(HandleNamespace::Texture, 7), Some(13));
        assert_eq!(map.trace_handle_for(HandleNamespace::Texture, 13), 7);
    }

    #[test]
    fn erase_removes_both_directions() {
        let mut map = HandleMap::new();
        map.insert(HandleNamespace::Buffer, 1, 99);
        map.erase(HandleNamespace::Buffer, 1);
        assert_eq!(map.live(HandleNamespace::Buffer, 1), None);
        assert_eq!(map.trace_handle_for(HandleNamespace::Buffer, 99), 99);
    }

    #[test]
    fn reinserting_trace_handle_drops_stale_reverse_entry() {
        let mut map = HandleMap::new();
        map.insert(HandleNamespace::Texture, 1, 10);
        map.insert(HandleNamespace::Texture, 1, 20);
        assert_eq!(map.live(HandleNamespace::Texture, 1), Some(20));
        assert_eq!(map.trace_handle_for(HandleNamespace::Texture, 10), 10);
        assert_eq!(map.trace_handle_for(HandleNamespace::Texture, 20), 1);
    }

    #[test]
    fn namespaces_are_independent() {
        let mut map = HandleMap::new();
        map.insert(HandleNamespace::Texture, 1, 100);
        map.insert(HandleNamespace::Buffer, 1, 200);
        assert_eq!(map.live(HandleNamespace::Texture, 1), Some(100));
        assert_eq!(map.live(HandleNamespace::Buffer, 1), Some(200));
    }
}
