//! Key index: endpoint id to recency-list slot.

use std::collections::HashMap;

use super::list::Slot;
use crate::endpoint::EndpointId;

/// Hash index over the cached records.
///
/// Sized for the cache capacity up front. Distinct ids never collide: two ids
/// that hash to the same bucket are chained by the map rather than evicting
/// each other.
#[derive(Debug)]
pub(crate) struct KeyIndex {
    slots: HashMap<EndpointId, Slot>,
}

impl KeyIndex {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self { slots: HashMap::with_capacity(capacity) }
    }

    pub(crate) fn get(&self, id: &EndpointId) -> Option<Slot> {
        self.slots.get(id).copied()
    }

    pub(crate) fn insert(&mut self, id: EndpointId, slot: Slot) -> Option<Slot> {
        self.slots.insert(id, slot)
    }

    pub(crate) fn remove(&mut self, id: &EndpointId) -> Option<Slot> {
        self.slots.remove(id)
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_with_equal_numeric_prefix_do_not_collide() {
        // "000000000000" and "000000001024" land in the same slot under
        // numeric-modulo slotting with 1024 buckets.
        let mut index = KeyIndex::with_capacity(1024);
        let a: EndpointId = "000000000000".parse().unwrap();
        let b: EndpointId = "000000001024".parse().unwrap();

        index.insert(a, 0);
        index.insert(b, 1);

        assert_eq!(index.get(&a), Some(0));
        assert_eq!(index.get(&b), Some(1));
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn remove_returns_slot() {
        let mut index = KeyIndex::with_capacity(2);
        let a: EndpointId = "a".parse().unwrap();
        index.insert(a, 7);

        assert_eq!(index.remove(&a), Some(7));
        assert_eq!(index.get(&a), None);
        assert_eq!(index.len(), 0);
    }
}
