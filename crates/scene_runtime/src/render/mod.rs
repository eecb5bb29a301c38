//! Rendering side of the scene core
//!
//! Per-object parameter blocks live in frame-replicated GPU memory, texture
//! bindings are cached per owner and replica, and frame preparation turns the
//! object table into draw commands for whatever [`RenderBackend`] is plugged
//! in. [`headless`] implements the backend on the CPU; [`vulkan`] implements
//! it on ash.

pub mod backend;
pub mod binding_cache;
pub mod frame;
pub mod headless;
pub mod object_data;
pub mod parameter_store;
pub mod vulkan;

pub use backend::{
    BindingDesc, BindingHandle, BindingPool, DrawCommand, RenderBackend, ReplicaMemory,
    TextureBindingRef,
};
pub use binding_cache::{BindingCache, BindingOwner, BindingStats};
pub use frame::FrameStats;
pub use headless::{HeadlessBackend, HeadlessBindingPool, HostReplicaMemory};
pub use object_data::ObjectParams;
pub use parameter_store::{FrameReplicatedStore, StoreStats};

use vulkan::VulkanError;

/// Render-side errors
///
/// Every variant indicates a sizing bug or a broken backend rather than a
/// transient condition, so callers surface them instead of retrying.
#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    /// No binding could be allocated
    #[error("Binding pool exhausted ({capacity} bindings)")]
    PoolExhausted {
        /// Bindings the pool was sized for
        capacity: usize,
    },

    /// Handle not issued by the current pool
    #[error("Invalid binding handle {0:?}")]
    InvalidBinding(BindingHandle),

    /// Replica index outside `[0, frames_in_flight)`
    #[error("Replica {replica} out of range ({count} frames in flight)")]
    ReplicaOutOfRange {
        /// Requested replica
        replica: usize,
        /// Number of replicas
        count: usize,
    },

    /// Write or read past the end of a replica
    #[error("Access of {len} bytes at offset {offset} exceeds replica size {size}")]
    OutOfBounds {
        /// Byte offset
        offset: usize,
        /// Byte length
        len: usize,
        /// Replica size in bytes
        size: usize,
    },

    /// Backend setup or invariant failure
    #[error("Backend error: {0}")]
    Backend(String),

    /// Vulkan API failure
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] VulkanError),
}
