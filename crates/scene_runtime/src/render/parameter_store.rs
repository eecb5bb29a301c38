//! Frame-replicated parameter store
//!
//! The GPU may still be reading replica `k` for an earlier frame while the
//! CPU prepares the next one, and the CPU cannot know which replica a delayed
//! read of an unchanged object will hit. Every write therefore lands in all
//! replicas; writes are batched and flushed once per pass.

use crate::scene::ObjectId;

use super::backend::ReplicaMemory;
use super::RenderError;

/// Store counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Records written (each to every replica)
    pub writes: u64,
    /// Flushes issued
    pub flushes: u64,
}

/// Per-object records replicated across frames in flight
pub struct FrameReplicatedStore {
    memory: Box<dyn ReplicaMemory>,
    max_objects: usize,
    record_size: usize,
    stride: usize,
    pending: Option<(usize, usize)>,
    stats: StoreStats,
}

impl FrameReplicatedStore {
    /// Create a store over replica memory
    ///
    /// The memory must provide exactly `frames_in_flight` replicas, each large
    /// enough for `max_objects` records of `record_size` bytes. Records are
    /// laid out at the memory's record alignment.
    pub fn new(
        max_objects: usize,
        record_size: usize,
        frames_in_flight: usize,
        memory: Box<dyn ReplicaMemory>,
    ) -> Result<Self, RenderError> {
        if memory.replica_count() != frames_in_flight {
            return Err(RenderError::Backend(format!(
                "replica memory has {} replicas, expected {}",
                memory.replica_count(),
                frames_in_flight
            )));
        }

        let stride = record_size.next_multiple_of(memory.record_alignment().max(1));
        let required = max_objects * stride;
        if memory.replica_size() < required {
            return Err(RenderError::Backend(format!(
                "replica size {} too small for {} records at a {} byte stride",
                memory.replica_size(),
                max_objects,
                stride
            )));
        }

        log::debug!(
            "Parameter store: {} objects x {} bytes (stride {}) x {} replicas",
            max_objects,
            record_size,
            stride,
            frames_in_flight
        );

        Ok(Self {
            memory,
            max_objects,
            record_size,
            stride,
            pending: None,
            stats: StoreStats::default(),
        })
    }

    /// Number of replicas
    pub fn frames_in_flight(&self) -> usize {
        self.memory.replica_count()
    }

    /// Size of one record in bytes
    pub fn record_size(&self) -> usize {
        self.record_size
    }

    /// Distance between consecutive records
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Byte offset of an object's record within a replica
    pub fn offset_of(&self, id: ObjectId) -> usize {
        id.index() * self.stride
    }

    /// Write an object's record into every replica
    pub fn write_at_all_replicas(&mut self, id: ObjectId, data: &[u8]) -> Result<(), RenderError> {
        let offset = self.offset_of(id);
        if id.index() >= self.max_objects || data.len() > self.record_size {
            return Err(RenderError::OutOfBounds {
                offset,
                len: data.len(),
                size: self.max_objects * self.stride,
            });
        }

        for replica in 0..self.memory.replica_count() {
            self.memory.write(replica, offset, data)?;
        }

        let end = offset + data.len();
        self.pending = Some(match self.pending {
            Some((start, stop)) => (start.min(offset), stop.max(end)),
            None => (offset, end),
        });
        self.stats.writes += 1;
        Ok(())
    }

    /// Flush everything written since the last flush
    ///
    /// Returns `false` without touching the memory if nothing was written.
    pub fn flush(&mut self) -> Result<bool, RenderError> {
        let Some((start, end)) = self.pending.take() else {
            return Ok(false);
        };

        self.memory.flush(start, end - start)?;
        self.stats.flushes += 1;
        Ok(true)
    }

    /// Whether writes are waiting for a flush
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Read an object's record back from one replica
    pub fn read(&self, replica: usize, id: ObjectId) -> Result<Vec<u8>, RenderError> {
        self.memory.read(replica, self.offset_of(id), self.record_size)
    }

    /// Counters
    pub fn stats(&self) -> StoreStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::headless::HostReplicaMemory;

    fn store(frames: usize) -> FrameReplicatedStore {
        let memory = HostReplicaMemory::new(frames, 8 * 16);
        FrameReplicatedStore::new(8, 16, frames, Box::new(memory)).unwrap()
    }

    #[test]
    fn test_write_lands_in_every_replica() {
        let mut store = store(3);
        let data = [7u8; 16];
        store.write_at_all_replicas(ObjectId(2), &data).unwrap();

        for replica in 0..3 {
            assert_eq!(store.read(replica, ObjectId(2)).unwrap(), data);
        }
        assert_eq!(store.read(0, ObjectId(1)).unwrap(), [0u8; 16]);
    }

    #[test]
    fn test_flush_is_batched() {
        let mut store = store(2);
        assert!(!store.flush().unwrap());

        store.write_at_all_replicas(ObjectId(0), &[1; 16]).unwrap();
        store.write_at_all_replicas(ObjectId(5), &[2; 16]).unwrap();
        assert!(store.flush().unwrap());
        assert!(!store.flush().unwrap());
        assert_eq!(store.stats(), StoreStats { writes: 2, flushes: 1 });
    }

    #[test]
    fn test_out_of_range_write_is_rejected() {
        let mut store = store(2);
        assert!(store.write_at_all_replicas(ObjectId(8), &[0; 16]).is_err());
        assert!(store.write_at_all_replicas(ObjectId(0), &[0; 17]).is_err());
        assert!(!store.has_pending());
    }

    #[test]
    fn test_records_follow_memory_alignment() {
        let memory = HostReplicaMemory::new(2, 8 * 64).with_alignment(64);
        let mut store = FrameReplicatedStore::new(8, 16, 2, Box::new(memory)).unwrap();
        assert_eq!(store.stride(), 64);
        assert_eq!(store.offset_of(ObjectId(3)), 192);

        store.write_at_all_replicas(ObjectId(7), &[9; 16]).unwrap();
        assert_eq!(store.read(1, ObjectId(7)).unwrap(), [9u8; 16]);
        assert_eq!(store.read(1, ObjectId(6)).unwrap(), [0u8; 16]);

        let memory = HostReplicaMemory::new(2, 8 * 16).with_alignment(64);
        assert!(FrameReplicatedStore::new(8, 16, 2, Box::new(memory)).is_err());
    }

    #[test]
    fn test_mismatched_memory_is_rejected() {
        let memory = HostReplicaMemory::new(2, 64);
        assert!(FrameReplicatedStore::new(8, 16, 2, Box::new(memory)).is_err());
        let memory = HostReplicaMemory::new(3, 128);
        assert!(FrameReplicatedStore::new(8, 16, 2, Box::new(memory)).is_err());
    }
}
