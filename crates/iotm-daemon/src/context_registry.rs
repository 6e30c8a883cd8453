//! Target-layer context registry.
//!
//! A namespaced holder of per-adapter-family opaque state. Two sessions
//! from the same family (e.g. two BLE adapters) share one slot; a session
//! from a different family gets an isolated one. `get(family)` always
//! returns a live slot, inserting an empty one the first time a family is
//! referenced — callers never observe "no such family," only "family
//! present but empty," mirroring the source's `tl_tree_get`.
//!
//! The registry never frees what it holds; lifetime of a family's state is
//! that family's own responsibility (its `exit` callback, typically).

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

/// A family's opaque state slot. `Any + Send + Sync` stands in for the
/// source's `void**`: the adapter that owns a family casts on entry.
pub type ContextSlot = Arc<Mutex<Option<Box<dyn Any + Send + Sync>>>>;

#[derive(Default)]
pub struct ContextRegistry {
    families: HashMap<String, ContextSlot>,
}

impl ContextRegistry {
    pub fn new() -> Self {
        ContextRegistry::default()
    }

    /// Returns the slot for `family`, creating an empty one on first
    /// reference.
    pub fn get(&mut self, family: &str) -> ContextSlot {
        self.families
            .entry(family.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_sessions_of_the_same_family_share_a_slot() {
        let mut registry = ContextRegistry::new();
        let a = registry.get("ble");
        let b = registry.get("ble");
        *a.lock() = Some(Box::new(42u32));
        assert_eq!(b.lock().as_ref().unwrap().downcast_ref::<u32>(), Some(&42));
    }

    #[test]
    fn different_families_are_isolated() {
        let mut registry = ContextRegistry::new();
        let ble = registry.get("ble");
        let zigbee = registry.get("zigbee");
        *ble.lock() = Some(Box::new(1u32));
        assert!(zigbee.lock().is_none());
    }
}
