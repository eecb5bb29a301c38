//! CPU-side backend
//!
//! Implements the backend traits without a GPU: replicas are plain byte
//! vectors and bindings live in a slot map. Used by tests and by headless
//! runs of the scene.

use slotmap::{DefaultKey, Key, KeyData, SlotMap};

use super::backend::{BindingDesc, BindingHandle, BindingPool, DrawCommand, RenderBackend, ReplicaMemory};
use super::RenderError;

/// Replicas backed by host vectors
#[derive(Debug, Clone)]
pub struct HostReplicaMemory {
    replicas: Vec<Vec<u8>>,
    flushed: Vec<(usize, usize)>,
    alignment: usize,
}

impl HostReplicaMemory {
    /// Allocate `count` zeroed replicas of `size` bytes
    pub fn new(count: usize, size: usize) -> Self {
        Self {
            replicas: vec![vec![0; size]; count],
            flushed: Vec::new(),
            alignment: 1,
        }
    }

    /// Require record offsets to be multiples of `alignment`
    pub fn with_alignment(mut self, alignment: usize) -> Self {
        self.alignment = alignment.max(1);
        self
    }

    /// Ranges flushed so far, as `(offset, len)`
    pub fn flushed_ranges(&self) -> &[(usize, usize)] {
        &self.flushed
    }

    fn check(&self, replica: usize, offset: usize, len: usize) -> Result<(), RenderError> {
        let size = self.replica_size();
        if replica >= self.replicas.len() {
            return Err(RenderError::ReplicaOutOfRange {
                replica,
                count: self.replicas.len(),
            });
        }
        if offset + len > size {
            return Err(RenderError::OutOfBounds { offset, len, size });
        }
        Ok(())
    }
}

impl ReplicaMemory for HostReplicaMemory {
    fn replica_count(&self) -> usize {
        self.replicas.len()
    }

    fn replica_size(&self) -> usize {
        self.replicas.first().map_or(0, Vec::len)
    }

    fn record_alignment(&self) -> usize {
        self.alignment
    }

    fn write(&mut self, replica: usize, offset: usize, bytes: &[u8]) -> Result<(), RenderError> {
        self.check(replica, offset, bytes.len())?;
        self.replicas[replica][offset..offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    fn flush(&mut self, offset: usize, len: usize) -> Result<(), RenderError> {
        self.check(0, offset, len)?;
        self.flushed.push((offset, len));
        Ok(())
    }

    fn read(&self, replica: usize, offset: usize, len: usize) -> Result<Vec<u8>, RenderError> {
        self.check(replica, offset, len)?;
        Ok(self.replicas[replica][offset..offset + len].to_vec())
    }
}

/// Capacity-limited binding pool
#[derive(Debug)]
pub struct HeadlessBindingPool {
    bindings: SlotMap<DefaultKey, BindingDesc>,
    capacity: usize,
    allocations: u64,
    updates: u64,
    resets: u64,
}

impl HeadlessBindingPool {
    /// Create a pool holding at most `capacity` bindings
    pub fn new(capacity: usize) -> Self {
        Self {
            bindings: SlotMap::with_capacity(capacity),
            capacity,
            allocations: 0,
            updates: 0,
            resets: 0,
        }
    }

    /// What a binding currently points at
    pub fn describe(&self, handle: BindingHandle) -> Option<&BindingDesc> {
        self.bindings.get(Self::key(handle))
    }

    /// Allocations since creation
    pub fn allocations(&self) -> u64 {
        self.allocations
    }

    /// In-place updates since creation
    pub fn updates(&self) -> u64 {
        self.updates
    }

    /// Resets since creation
    pub fn resets(&self) -> u64 {
        self.resets
    }

    fn key(handle: BindingHandle) -> DefaultKey {
        KeyData::from_ffi(handle.0).into()
    }
}

impl BindingPool for HeadlessBindingPool {
    fn allocate(&mut self, desc: &BindingDesc) -> Result<BindingHandle, RenderError> {
        if self.bindings.len() >= self.capacity {
            return Err(RenderError::PoolExhausted { capacity: self.capacity });
        }
        let key = self.bindings.insert(*desc);
        self.allocations += 1;
        Ok(BindingHandle(key.data().as_ffi()))
    }

    fn update(&mut self, handle: BindingHandle, desc: &BindingDesc) -> Result<(), RenderError> {
        let slot = self
            .bindings
            .get_mut(Self::key(handle))
            .ok_or(RenderError::InvalidBinding(handle))?;
        *slot = *desc;
        self.updates += 1;
        Ok(())
    }

    fn reset(&mut self) -> Result<(), RenderError> {
        self.bindings.clear();
        self.resets += 1;
        Ok(())
    }

    fn live_bindings(&self) -> usize {
        self.bindings.len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Backend that records draws instead of submitting them
#[derive(Debug)]
pub struct HeadlessBackend {
    frame: usize,
    frames_in_flight: usize,
    pool: HeadlessBindingPool,
    surface_recreated: bool,
    draws: Vec<DrawCommand>,
}

impl HeadlessBackend {
    /// Create a backend with `frames_in_flight` replicas and a pool of `max_bindings`
    pub fn new(frames_in_flight: usize, max_bindings: usize) -> Self {
        Self {
            frame: 0,
            frames_in_flight: frames_in_flight.max(1),
            pool: HeadlessBindingPool::new(max_bindings),
            surface_recreated: false,
            draws: Vec::new(),
        }
    }

    /// Move to the next replica, as a present would
    pub fn advance_frame(&mut self) {
        self.frame = (self.frame + 1) % self.frames_in_flight;
    }

    /// Pretend the output surface was resized
    pub fn signal_surface_recreated(&mut self) {
        self.surface_recreated = true;
    }

    /// Draws recorded so far
    pub fn draws(&self) -> &[DrawCommand] {
        &self.draws
    }

    /// Take and clear the recorded draws
    pub fn take_draws(&mut self) -> Vec<DrawCommand> {
        std::mem::take(&mut self.draws)
    }

    /// The concrete pool
    pub fn pool(&self) -> &HeadlessBindingPool {
        &self.pool
    }
}

impl RenderBackend for HeadlessBackend {
    fn current_frame(&self) -> usize {
        self.frame
    }

    fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }

    fn binding_pool(&mut self) -> &mut dyn BindingPool {
        &mut self.pool
    }

    fn take_surface_recreated(&mut self) -> bool {
        std::mem::take(&mut self.surface_recreated)
    }

    fn record_draw(&mut self, draw: &DrawCommand) {
        self.draws.push(draw.clone());
    }
}
