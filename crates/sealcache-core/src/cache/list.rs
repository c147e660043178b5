//! Recency list: doubly linked ordering of cache records.
//!
//! Records live in a slot arena and link to each other by slot number, which
//! keeps push-front, unlink-from-middle and pop-back O(1) without shared
//! ownership. Freed slots are reused so the arena never grows past the cache
//! capacity.

use sealcache_crypto::KeyMaterial;

use super::CacheError;
use crate::endpoint::EndpointId;

/// Position of a record in the arena.
pub(crate) type Slot = usize;

/// One cached endpoint key plus its recency links.
///
/// Owned by the cache; callers only ever see shared references. The key is
/// zeroized when the record is dropped (on eviction or teardown).
#[derive(Debug)]
pub struct KeyRecord {
    id: EndpointId,
    key: KeyMaterial,
    prev: Option<Slot>,
    next: Option<Slot>,
}

impl KeyRecord {
    /// Endpoint this key belongs to.
    pub fn id(&self) -> &EndpointId {
        &self.id
    }

    /// The endpoint's key.
    pub fn key(&self) -> &KeyMaterial {
        &self.key
    }
}

/// Most-recently-used at the front, eviction victim at the back.
#[derive(Debug)]
pub(crate) struct RecencyList {
    slots: Vec<Option<KeyRecord>>,
    free: Vec<Slot>,
    head: Option<Slot>,
    tail: Option<Slot>,
    len: usize,
}

impl RecencyList {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn back(&self) -> Option<Slot> {
        self.tail
    }

    pub(crate) fn get(&self, slot: Slot) -> Option<&KeyRecord> {
        self.slots.get(slot)?.as_ref()
    }

    /// Insert a new record as most recently used.
    pub(crate) fn push_front(
        &mut self,
        id: EndpointId,
        key: KeyMaterial,
    ) -> Result<Slot, CacheError> {
        let record = KeyRecord { id, key, prev: None, next: self.head };

        let slot = match self.free.pop() {
            Some(slot) => {
                let entry = self.entry_mut(slot)?;
                if entry.is_some() {
                    return Err(CacheError::Consistency(format!("free slot {slot} is occupied")));
                }
                *entry = Some(record);
                slot
            },
            None => {
                self.slots.push(Some(record));
                self.slots.len() - 1
            },
        };

        match self.head {
            Some(old_head) => self.node_mut(old_head)?.prev = Some(slot),
            None => self.tail = Some(slot),
        }
        self.head = Some(slot);
        self.len += 1;

        Ok(slot)
    }

    /// Make `slot` the most recently used record.
    pub(crate) fn move_to_front(&mut self, slot: Slot) -> Result<(), CacheError> {
        if self.head == Some(slot) {
            return Ok(());
        }

        self.detach(slot)?;

        let old_head = self.head;
        {
            let node = self.node_mut(slot)?;
            node.prev = None;
            node.next = old_head;
        }
        match old_head {
            Some(head) => self.node_mut(head)?.prev = Some(slot),
            None => self.tail = Some(slot),
        }
        self.head = Some(slot);

        Ok(())
    }

    /// Remove the record at `slot` from the list and free the slot.
    pub(crate) fn unlink(&mut self, slot: Slot) -> Result<KeyRecord, CacheError> {
        self.detach(slot)?;

        let mut record = self
            .entry_mut(slot)?
            .take()
            .ok_or_else(|| CacheError::Consistency(format!("slot {slot} is empty")))?;
        record.prev = None;
        record.next = None;

        self.free.push(slot);
        self.len -= 1;

        Ok(record)
    }

    /// Remove and return the least recently used record.
    pub(crate) fn pop_back(&mut self) -> Result<Option<KeyRecord>, CacheError> {
        match self.back() {
            Some(slot) => self.unlink(slot).map(Some),
            None => Ok(None),
        }
    }

    /// Walk from front to back, validating links.
    ///
    /// Returns `(slot, id)` pairs in recency order.
    pub(crate) fn walk(&self) -> Result<Vec<(Slot, EndpointId)>, CacheError> {
        let mut visited = Vec::with_capacity(self.len);
        let mut prev = None;
        let mut cursor = self.head;

        while let Some(slot) = cursor {
            if visited.len() >= self.len {
                return Err(CacheError::Consistency(format!(
                    "list walk exceeded recorded length {}",
                    self.len
                )));
            }

            let node = self
                .get(slot)
                .ok_or_else(|| CacheError::Consistency(format!("link to empty slot {slot}")))?;
            if node.prev != prev {
                return Err(CacheError::Consistency(format!(
                    "slot {slot} has prev {:?}, expected {prev:?}",
                    node.prev
                )));
            }

            visited.push((slot, node.id));
            prev = Some(slot);
            cursor = node.next;
        }

        if visited.len() != self.len {
            return Err(CacheError::Consistency(format!(
                "list holds {} records, recorded length {}",
                visited.len(),
                self.len
            )));
        }
        if self.tail != prev {
            return Err(CacheError::Consistency(format!(
                "tail is {:?}, last walked slot is {prev:?}",
                self.tail
            )));
        }

        Ok(visited)
    }

    /// Drop every record, zeroizing their keys.
    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.head = None;
        self.tail = None;
        self.len = 0;
    }

    /// Splice `slot` out of the chain, leaving its own links stale.
    fn detach(&mut self, slot: Slot) -> Result<(), CacheError> {
        let (prev, next) = {
            let node = self.node(slot)?;
            (node.prev, node.next)
        };

        match prev {
            Some(p) => self.node_mut(p)?.next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.node_mut(n)?.prev = prev,
            None => self.tail = prev,
        }

        Ok(())
    }

    fn node(&self, slot: Slot) -> Result<&KeyRecord, CacheError> {
        self.get(slot).ok_or_else(|| CacheError::Consistency(format!("slot {slot} is empty")))
    }

    fn node_mut(&mut self, slot: Slot) -> Result<&mut KeyRecord, CacheError> {
        self.entry_mut(slot)?
            .as_mut()
            .ok_or_else(|| CacheError::Consistency(format!("slot {slot} is empty")))
    }

    fn entry_mut(&mut self, slot: Slot) -> Result<&mut Option<KeyRecord>, CacheError> {
        self.slots
            .get_mut(slot)
            .ok_or_else(|| CacheError::Consistency(format!("slot {slot} out of range")))
    }
}

#[cfg(test)]
mod tests {
    use sealcache_crypto::KEY_SIZE;

    use super::*;

    fn id(n: u8) -> EndpointId {
        EndpointId::new(&[b'a' + n]).unwrap()
    }

    fn key(n: u8) -> KeyMaterial {
        KeyMaterial::from_bytes([n; KEY_SIZE])
    }

    fn order(list: &RecencyList) -> Vec<EndpointId> {
        list.walk().unwrap().into_iter().map(|(_, id)| id).collect()
    }

    #[test]
    fn push_front_orders_most_recent_first() {
        let mut list = RecencyList::with_capacity(4);
        list.push_front(id(0), key(0)).unwrap();
        list.push_front(id(1), key(1)).unwrap();
        list.push_front(id(2), key(2)).unwrap();

        assert_eq!(order(&list), vec![id(2), id(1), id(0)]);
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn move_to_front_from_middle_and_back() {
        let mut list = RecencyList::with_capacity(4);
        let a = list.push_front(id(0), key(0)).unwrap();
        let b = list.push_front(id(1), key(1)).unwrap();
        list.push_front(id(2), key(2)).unwrap();

        list.move_to_front(b).unwrap();
        assert_eq!(order(&list), vec![id(1), id(2), id(0)]);

        list.move_to_front(a).unwrap();
        assert_eq!(order(&list), vec![id(0), id(1), id(2)]);
        assert_eq!(list.get(list.back().unwrap()).unwrap().id(), &id(2));
    }

    #[test]
    fn pop_back_returns_lru_and_reuses_slot() {
        let mut list = RecencyList::with_capacity(2);
        let a = list.push_front(id(0), key(0)).unwrap();
        list.push_front(id(1), key(1)).unwrap();

        let evicted = list.pop_back().unwrap().unwrap();
        assert_eq!(evicted.id(), &id(0));
        assert_eq!(evicted.key().expose(), &[0u8; KEY_SIZE]);

        let c = list.push_front(id(2), key(2)).unwrap();
        assert_eq!(c, a, "freed slot should be reused");
        assert_eq!(order(&list), vec![id(2), id(1)]);
    }

    #[test]
    fn unlink_only_record_empties_list() {
        let mut list = RecencyList::with_capacity(1);
        let a = list.push_front(id(0), key(0)).unwrap();

        list.unlink(a).unwrap();
        assert_eq!(list.len(), 0);
        assert!(list.back().is_none());
        assert!(list.pop_back().unwrap().is_none());
        assert!(order(&list).is_empty());
    }

    #[test]
    fn unlink_empty_slot_is_consistency_error() {
        let mut list = RecencyList::with_capacity(1);
        let a = list.push_front(id(0), key(0)).unwrap();
        list.unlink(a).unwrap();

        assert!(matches!(list.unlink(a), Err(CacheError::Consistency(_))));
        assert!(matches!(list.move_to_front(42), Err(CacheError::Consistency(_))));
    }
}
