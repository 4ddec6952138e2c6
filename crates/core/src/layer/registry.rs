//! Named layer storage.
//!
//! Layers live in a slab indexed by slot; a name maps to exactly one slot.
//! Re-registering a name replaces the layer in its existing slot, so slot
//! indices handed out earlier keep pointing at whatever now owns the name.

use super::DataLayer;
use rustc_hash::FxHashMap;

#[derive(Debug, Default)]
pub struct LayerRegistry {
    slots: Vec<DataLayer>,
    by_name: FxHashMap<String, usize>,
}

impl LayerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `layer` under its key, dropping any previous owner.
    ///
    /// Returns the slot index and whether a layer was replaced.
    pub fn insert(&mut self, layer: DataLayer) -> (usize, bool) {
        if let Some(&slot) = self.by_name.get(layer.key()) {
            self.slots[slot] = layer;
            return (slot, true);
        }
        let slot = self.slots.len();
        self.by_name.insert(layer.key().to_string(), slot);
        self.slots.push(layer);
        (slot, false)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&DataLayer> {
        self.by_name.get(name).map(|&slot| &self.slots[slot])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut DataLayer> {
        self.by_name.get(name).map(|&slot| &mut self.slots[slot])
    }

    #[must_use]
    pub fn slot(&self, slot: usize) -> Option<&DataLayer> {
        self.slots.get(slot)
    }

    #[must_use]
    pub fn slot_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Layers in registration order
    pub fn iter(&self) -> impl Iterator<Item = &DataLayer> {
        self.slots.iter()
    }

    /// Layer names in registration order
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.slots.iter().map(DataLayer::key).collect()
    }
}
