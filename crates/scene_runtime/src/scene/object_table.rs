//! Object table
//!
//! Owns every live [`ObjectRecord`] and hands out small integer ids. Freed
//! ids are reused lowest first. Each slot carries a generation that is bumped
//! whenever its object goes away, so an [`ObjectHandle`] taken earlier stops
//! resolving instead of aliasing whatever reuses the id.

use std::collections::BTreeSet;

use super::object::{ObjectHandle, ObjectId, ObjectRecord};
use super::SceneError;

/// Capacity-limited table of scene objects
#[derive(Debug)]
pub struct ObjectTable {
    slots: Vec<Option<ObjectRecord>>,
    generations: Vec<u32>,
    free: BTreeSet<u32>,
    capacity: usize,
    live: usize,
}

impl ObjectTable {
    /// Create a table holding at most `capacity` objects
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::new(),
            generations: Vec::new(),
            free: BTreeSet::new(),
            capacity,
            live: 0,
        }
    }

    /// Create an empty object
    pub fn create(&mut self) -> Result<ObjectId, SceneError> {
        self.insert(ObjectRecord::default())
    }

    /// Store a record under the lowest free id
    pub fn insert(&mut self, record: ObjectRecord) -> Result<ObjectId, SceneError> {
        let index = match self.free.pop_first() {
            Some(index) => index as usize,
            None if self.slots.len() < self.capacity => {
                self.slots.push(None);
                self.slots.len() - 1
            }
            None => {
                log::error!("Object table full ({} objects)", self.capacity);
                return Err(SceneError::CapacityExceeded { capacity: self.capacity });
            }
        };

        self.occupy(index, record);
        Ok(ObjectId(index as u32))
    }

    /// Create an object with a specific id, or return the one already there
    ///
    /// Ids above the high-water mark reserve every id in between as free, so
    /// later [`create`](Self::create) calls fill the gap instead of colliding.
    pub fn create_with_id(&mut self, id: ObjectId) -> Result<&mut ObjectRecord, SceneError> {
        let index = id.index();
        if index >= self.capacity {
            log::error!("Object id {} exceeds capacity {}", id, self.capacity);
            return Err(SceneError::CapacityExceeded { capacity: self.capacity });
        }

        if index >= self.slots.len() {
            for gap in self.slots.len()..index {
                self.free.insert(gap as u32);
            }
            self.slots.resize_with(index + 1, || None);
        } else if self.slots[index].is_none() {
            self.free.remove(&(index as u32));
        }

        if self.slots[index].is_none() {
            self.occupy(index, ObjectRecord::default());
        }

        self.slots[index]
            .as_mut()
            .ok_or(SceneError::ObjectNotFound(id))
    }

    /// Destroy an object, returning its id to the free list
    pub fn destroy(&mut self, id: ObjectId) -> bool {
        let index = id.index();
        match self.slots.get_mut(index).and_then(Option::take) {
            Some(_) => {
                self.generations[index] = self.generations[index].wrapping_add(1);
                self.free.insert(index as u32);
                self.live -= 1;
                true
            }
            None => false,
        }
    }

    /// Remove every object except `protect`
    ///
    /// The free list and high-water mark are rebuilt from the survivor, so
    /// the next [`create`](Self::create) starts from the lowest id not in
    /// use. Returns the removed ids.
    pub fn clear_all_except(&mut self, protect: Option<ObjectId>) -> Vec<ObjectId> {
        let survivor = protect.and_then(|id| {
            let record = self.slots.get_mut(id.index()).and_then(Option::take)?;
            Some((id, record))
        });

        let mut removed = Vec::new();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.take().is_some() {
                self.generations[index] = self.generations[index].wrapping_add(1);
                removed.push(ObjectId(index as u32));
            }
        }

        self.slots.clear();
        self.free.clear();
        self.live = 0;

        if let Some((id, record)) = survivor {
            let index = id.index();
            self.slots.resize_with(index + 1, || None);
            self.free.extend(0..index as u32);
            self.slots[index] = Some(record);
            self.live = 1;
        }

        log::debug!("Cleared {} objects, kept {:?}", removed.len(), protect);
        removed
    }

    /// Record for an id
    pub fn get(&self, id: ObjectId) -> Option<&ObjectRecord> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    /// Mutable record for an id
    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut ObjectRecord> {
        self.slots.get_mut(id.index()).and_then(Option::as_mut)
    }

    /// Whether the id is live
    pub fn contains(&self, id: ObjectId) -> bool {
        self.get(id).is_some()
    }

    /// Generation-checked handle for a live id
    pub fn handle(&self, id: ObjectId) -> Option<ObjectHandle> {
        self.contains(id).then(|| ObjectHandle {
            id,
            generation: self.generations[id.index()],
        })
    }

    /// Record behind a handle, if it is still the same object
    pub fn resolve(&self, handle: ObjectHandle) -> Option<&ObjectRecord> {
        if self.generations.get(handle.id.index()) != Some(&handle.generation) {
            return None;
        }
        self.get(handle.id)
    }

    /// Mutable record behind a handle, if it is still the same object
    pub fn resolve_mut(&mut self, handle: ObjectHandle) -> Option<&mut ObjectRecord> {
        if self.generations.get(handle.id.index()) != Some(&handle.generation) {
            return None;
        }
        self.get_mut(handle.id)
    }

    /// Live object count
    pub fn len(&self) -> usize {
        self.live
    }

    /// Whether no object is live
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Maximum number of live objects
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// One past the highest id ever handed out since the last clear
    pub fn high_water_mark(&self) -> usize {
        self.slots.len()
    }

    /// Ids waiting for reuse, lowest first
    pub fn free_ids(&self) -> Vec<ObjectId> {
        self.free.iter().map(|&i| ObjectId(i)).collect()
    }

    /// Live ids in ascending order
    pub fn ids(&self) -> Vec<ObjectId> {
        self.iter().map(|(id, _)| id).collect()
    }

    /// Live records in id order
    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, &ObjectRecord)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|r| (ObjectId(i as u32), r)))
    }

    /// Mutable live records in id order
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (ObjectId, &mut ObjectRecord)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_mut().map(|r| (ObjectId(i as u32), r)))
    }

    fn occupy(&mut self, index: usize, record: ObjectRecord) {
        if self.generations.len() <= index {
            self.generations.resize(index + 1, 0);
        }
        self.slots[index] = Some(record);
        self.live += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use std::collections::HashSet;

    #[test]
    fn test_create_reuses_lowest_free_id() {
        let mut table = ObjectTable::new(8);
        let a = table.create().unwrap();
        let b = table.create().unwrap();
        let c = table.create().unwrap();
        assert_eq!((a, b, c), (ObjectId(0), ObjectId(1), ObjectId(2)));

        assert!(table.destroy(c));
        assert!(table.destroy(a));
        assert!(!table.destroy(a));
        assert_eq!(table.create().unwrap(), ObjectId(0));
        assert_eq!(table.create().unwrap(), ObjectId(2));
        assert_eq!(table.create().unwrap(), ObjectId(3));
    }

    #[test]
    fn test_capacity_is_enforced() {
        let mut table = ObjectTable::new(2);
        table.create().unwrap();
        table.create().unwrap();
        assert!(matches!(
            table.create(),
            Err(SceneError::CapacityExceeded { capacity: 2 })
        ));
        assert!(table.create_with_id(ObjectId(2)).is_err());
    }

    #[test]
    fn test_live_ids_never_collide() {
        let mut table = ObjectTable::new(64);
        let mut live: Vec<ObjectId> = Vec::new();

        // Deterministic create/destroy interleaving
        for step in 0..500u32 {
            if step % 3 == 2 && !live.is_empty() {
                let victim = live.remove((step as usize * 7) % live.len());
                assert!(table.destroy(victim));
            } else if live.len() < 64 {
                live.push(table.create().unwrap());
            }

            let unique: HashSet<_> = live.iter().collect();
            assert_eq!(unique.len(), live.len());
            assert_eq!(table.len(), live.len());
        }
    }

    #[test]
    fn test_stale_handle_does_not_alias() {
        let mut table = ObjectTable::new(4);
        let id = table.create().unwrap();
        table.get_mut(id).unwrap().set_name("old");
        let stale = table.handle(id).unwrap();

        table.destroy(id);
        let reused = table.create().unwrap();
        assert_eq!(reused, id);
        table.get_mut(reused).unwrap().set_name("new");

        assert!(table.resolve(stale).is_none());
        assert!(table.resolve_mut(stale).is_none());
        let fresh = table.handle(reused).unwrap();
        assert_eq!(table.resolve(fresh).unwrap().name(), "new");
    }

    #[test]
    fn test_create_with_id_reserves_gap() {
        let mut table = ObjectTable::new(16);
        table.create_with_id(ObjectId(5)).unwrap().set_name("five");
        assert_eq!(table.high_water_mark(), 6);
        assert_eq!(
            table.free_ids(),
            vec![ObjectId(0), ObjectId(1), ObjectId(2), ObjectId(3), ObjectId(4)]
        );

        // Idempotent: the existing record comes back untouched
        assert_eq!(table.create_with_id(ObjectId(5)).unwrap().name(), "five");
        assert_eq!(table.len(), 1);

        table.create_with_id(ObjectId(2)).unwrap();
        assert_eq!(table.create().unwrap(), ObjectId(0));
        assert_eq!(table.create().unwrap(), ObjectId(1));
        assert_eq!(table.create().unwrap(), ObjectId(3));
        assert_eq!(table.create().unwrap(), ObjectId(4));
        assert_eq!(table.create().unwrap(), ObjectId(6));
    }

    #[test]
    fn test_clear_all_except_rebuilds_free_list() {
        let mut table = ObjectTable::new(16);
        for _ in 0..4 {
            table.create().unwrap();
        }
        table.get_mut(ObjectId(2)).unwrap().set_position(Vec3::new(1.0, 0.0, 0.0));

        let removed = table.clear_all_except(Some(ObjectId(2)));
        assert_eq!(removed, vec![ObjectId(0), ObjectId(1), ObjectId(3)]);
        assert_eq!(table.ids(), vec![ObjectId(2)]);
        assert_eq!(table.get(ObjectId(2)).unwrap().transform().position.x, 1.0);
        assert_eq!(table.create().unwrap(), ObjectId(0));
        assert_eq!(table.create().unwrap(), ObjectId(1));
        assert_eq!(table.create().unwrap(), ObjectId(3));
    }

    #[test]
    fn test_clear_all_keeps_survivor_handle() {
        let mut table = ObjectTable::new(16);
        let a = table.create().unwrap();
        let b = table.create().unwrap();
        let handle_a = table.handle(a).unwrap();
        let handle_b = table.handle(b).unwrap();

        table.clear_all_except(Some(b));
        assert!(table.resolve(handle_a).is_none());
        assert!(table.resolve(handle_b).is_some());

        table.clear_all_except(None);
        assert!(table.is_empty());
        assert_eq!(table.high_water_mark(), 0);
        assert_eq!(table.create().unwrap(), ObjectId(0));
    }
}
