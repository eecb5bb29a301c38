//! Texture binding cache
//!
//! Rebuilding a GPU binding is expensive, so each owner (an object, or one
//! part of a multi-part mesh) keeps one binding per replica together with the
//! identity of the texture it was built for. A lookup with the same texture
//! is a plain hit. A different texture rewrites the existing binding in place
//! instead of allocating, which bounds pool growth by
//! `objects * frames_in_flight * texture slots`.
//!
//! The whole cache is dropped when the backend recreates its surface, since
//! the pool the bindings came from is reset with it.

use std::collections::HashMap;

use crate::assets::TextureId;
use crate::scene::ObjectId;

use super::backend::{BindingDesc, BindingHandle, BindingPool};
use super::RenderError;

/// Who a binding belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingOwner {
    /// The object as a whole
    Object(ObjectId),
    /// One part of a multi-part mesh
    SubMesh(ObjectId, usize),
}

impl BindingOwner {
    /// Owning object
    pub fn object(&self) -> ObjectId {
        match *self {
            BindingOwner::Object(id) | BindingOwner::SubMesh(id, _) => id,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct CachedBinding {
    texture: Option<TextureId>,
    handle: BindingHandle,
}

/// Cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BindingStats {
    /// Lookups that reused a binding untouched
    pub hits: u64,
    /// Bindings built from the pool
    pub allocations: u64,
    /// Bindings rewritten in place
    pub updates: u64,
    /// Bindings taken from the spare list
    pub recycled: u64,
    /// Full resets
    pub resets: u64,
}

/// Per-owner, per-replica binding cache
#[derive(Debug)]
pub struct BindingCache {
    frames_in_flight: usize,
    entries: HashMap<BindingOwner, Vec<Option<CachedBinding>>>,
    spares: Vec<Vec<BindingHandle>>,
    stats: BindingStats,
}

impl BindingCache {
    /// Create an empty cache for `frames_in_flight` replicas
    pub fn new(frames_in_flight: usize) -> Self {
        Self {
            frames_in_flight,
            entries: HashMap::new(),
            spares: vec![Vec::new(); frames_in_flight],
            stats: BindingStats::default(),
        }
    }

    /// Binding for `owner` in `replica` referencing `desc.texture`
    ///
    /// Hits return the cached handle without touching the pool. A texture
    /// mismatch rewrites the cached binding in place. First use takes a
    /// spare handle of the same replica if one exists, otherwise allocates.
    /// Pool failures are returned as-is; they mean the pool was sized wrong.
    pub fn get_binding(
        &mut self,
        pool: &mut dyn BindingPool,
        owner: BindingOwner,
        desc: &BindingDesc,
    ) -> Result<BindingHandle, RenderError> {
        let replica = desc.replica;
        if replica >= self.frames_in_flight {
            return Err(RenderError::ReplicaOutOfRange {
                replica,
                count: self.frames_in_flight,
            });
        }

        let texture = desc.texture_id();
        let frames = self.frames_in_flight;
        let slots = self.entries.entry(owner).or_insert_with(|| vec![None; frames]);

        match &mut slots[replica] {
            Some(cached) if cached.texture == texture => {
                self.stats.hits += 1;
                Ok(cached.handle)
            }
            Some(cached) => {
                pool.update(cached.handle, desc)?;
                log::debug!(
                    "Rebuilt binding {:?} replica {}: {:?} -> {:?}",
                    owner,
                    replica,
                    cached.texture,
                    texture
                );
                cached.texture = texture;
                self.stats.updates += 1;
                Ok(cached.handle)
            }
            slot @ None => {
                let handle = match self.spares[replica].pop() {
                    Some(handle) => {
                        pool.update(handle, desc)?;
                        self.stats.recycled += 1;
                        handle
                    }
                    None => {
                        let handle = pool.allocate(desc)?;
                        self.stats.allocations += 1;
                        handle
                    }
                };
                *slot = Some(CachedBinding { texture, handle });
                Ok(handle)
            }
        }
    }

    /// Forget every binding of a destroyed object
    ///
    /// Nothing is torn down on the GPU; the handles become spares for later
    /// first-use lookups in the same replica.
    pub fn discard_object(&mut self, id: ObjectId) {
        let spares = &mut self.spares;
        self.entries.retain(|owner, slots| {
            if owner.object() != id {
                return true;
            }
            for (replica, cached) in slots.iter().enumerate() {
                if let Some(cached) = cached {
                    spares[replica].push(cached.handle);
                }
            }
            false
        });
    }

    /// Drop every binding and reset the pool
    pub fn reset(&mut self, pool: &mut dyn BindingPool) -> Result<(), RenderError> {
        self.entries.clear();
        self.spares.iter_mut().for_each(Vec::clear);
        pool.reset()?;
        self.stats.resets += 1;
        log::info!("Binding cache reset ({} bindings live after pool reset)", pool.live_bindings());
        Ok(())
    }

    /// Cached handle without building anything
    pub fn peek(&self, owner: BindingOwner, replica: usize) -> Option<BindingHandle> {
        self.entries
            .get(&owner)
            .and_then(|slots| slots.get(replica).copied().flatten())
            .map(|cached| cached.handle)
    }

    /// Number of cached (owner, replica) entries
    pub fn len(&self) -> usize {
        self.entries
            .values()
            .map(|slots| slots.iter().filter(|s| s.is_some()).count())
            .sum()
    }

    /// Whether nothing is cached
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Spare handles waiting for reuse
    pub fn spare_count(&self) -> usize {
        self.spares.iter().map(Vec::len).sum()
    }

    /// Counters
    pub fn stats(&self) -> BindingStats {
        self.stats
    }
}
