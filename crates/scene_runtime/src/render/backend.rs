//! Render backend boundary
//!
//! The scene core only needs three things from a graphics backend: memory it
//! can write per-object parameters into once per replica, a pool to build
//! texture bindings from, and somewhere to send draws. Everything about
//! command submission and presentation stays behind these traits.

use crate::assets::TextureId;
use crate::foundation::math::Mat4;
use crate::scene::ObjectId;

use super::RenderError;

/// Opaque GPU binding handle issued by a [`BindingPool`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingHandle(pub u64);

/// Texture a binding should reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureBindingRef {
    /// Texture identity, compared by the binding cache
    pub id: TextureId,
    /// Backend handle from the asset factory
    pub gpu_handle: u64,
}

/// Everything a pool needs to build or rewrite one binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingDesc {
    /// Replica whose parameter memory the binding reads
    pub replica: usize,
    /// Owning object
    pub object: ObjectId,
    /// Byte offset of the object's parameter block within the replica
    pub param_offset: u64,
    /// Size of the parameter block
    pub param_size: u64,
    /// Texture to bind, `None` for untextured
    pub texture: Option<TextureBindingRef>,
}

impl BindingDesc {
    /// Identity of the bound texture
    pub fn texture_id(&self) -> Option<TextureId> {
        self.texture.map(|t| t.id)
    }
}

/// Allocator of GPU bindings
pub trait BindingPool {
    /// Build a new binding
    fn allocate(&mut self, desc: &BindingDesc) -> Result<BindingHandle, RenderError>;

    /// Rewrite an existing binding in place
    fn update(&mut self, handle: BindingHandle, desc: &BindingDesc) -> Result<(), RenderError>;

    /// Invalidate every binding and start over
    fn reset(&mut self) -> Result<(), RenderError>;

    /// Bindings currently allocated
    fn live_bindings(&self) -> usize;

    /// Maximum number of bindings
    fn capacity(&self) -> usize;
}

/// N equally sized replicas of GPU-visible memory
pub trait ReplicaMemory {
    /// Number of replicas (frames in flight)
    fn replica_count(&self) -> usize;

    /// Size of one replica in bytes
    fn replica_size(&self) -> usize;

    /// Alignment every record offset must honour to be bound on its own
    fn record_alignment(&self) -> usize {
        1
    }

    /// Copy `bytes` into one replica
    fn write(&mut self, replica: usize, offset: usize, bytes: &[u8]) -> Result<(), RenderError>;

    /// Make writes in `[offset, offset + len)` of every replica visible to the GPU
    fn flush(&mut self, offset: usize, len: usize) -> Result<(), RenderError>;

    /// Copy bytes back out of one replica
    fn read(&self, replica: usize, offset: usize, len: usize) -> Result<Vec<u8>, RenderError>;
}

/// A draw recorded against the current replica
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCommand {
    /// Object being drawn
    pub object: ObjectId,
    /// Mesh part, `None` when the object is drawn as a whole
    pub part: Option<usize>,
    /// Replica the draw reads parameters from
    pub replica: usize,
    /// Binding to use
    pub binding: BindingHandle,
    /// World transform of the drawn fragment
    pub world: Mat4,
    /// First index
    pub first_index: u32,
    /// Index count
    pub index_count: u32,
}

/// Graphics backend as seen by frame preparation
pub trait RenderBackend {
    /// Replica the next frame renders from; the backend advances it
    fn current_frame(&self) -> usize;

    /// Number of replicas
    fn frames_in_flight(&self) -> usize;

    /// Pool bindings are built from
    fn binding_pool(&mut self) -> &mut dyn BindingPool;

    /// Whether the output surface was recreated since the last call
    ///
    /// One-shot: returns `true` at most once per recreation.
    fn take_surface_recreated(&mut self) -> bool;

    /// Record one draw
    fn record_draw(&mut self, draw: &DrawCommand);
}
