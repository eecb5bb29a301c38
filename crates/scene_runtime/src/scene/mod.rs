//! Scene management
//!
//! ```text
//! Scene (facade)
//!      |
//! ObjectTable ----> dirty pass ----> FrameReplicatedStore
//!      |
//! hierarchy resolver + BindingCache ----> RenderBackend draws
//! ```
//!
//! External code only talks to [`Scene`]. It owns the object table, the
//! asset cache, the parameter store and the binding cache, and runs the
//! per-frame passes in order.

pub mod dirty;
pub mod hierarchy;
pub mod object;
pub mod object_table;
pub mod persistence;
mod facade;

#[cfg(test)]
mod tests;

pub use dirty::{propagate_dirty, PropagationStats};
pub use hierarchy::{compute_globals, fragment_world, NodeOverride};
pub use object::{
    CameraComponent, MeshComponent, ObjectHandle, ObjectId, ObjectKind, ObjectRecord,
    ObjectTransform, PointLightComponent, SpriteComponent,
};
pub use object_table::ObjectTable;
pub use persistence::{KindDescription, ObjectDescription, SceneDescription};
pub use facade::Scene;

use crate::assets::AssetError;
use crate::config::ConfigError;
use crate::render::RenderError;

/// Scene errors
#[derive(thiserror::Error, Debug)]
pub enum SceneError {
    /// Object table is full
    #[error("Object capacity of {capacity} exceeded")]
    CapacityExceeded {
        /// Configured maximum
        capacity: usize,
    },

    /// No live object with this id
    #[error("Object {0} not found")]
    ObjectNotFound(ObjectId),

    /// Operation needs a different kind of object
    #[error("Object {id} is a {actual}, expected a {expected}")]
    WrongKind {
        /// Object id
        id: ObjectId,
        /// Kind the operation needs
        expected: &'static str,
        /// Kind the object has
        actual: &'static str,
    },

    /// Node index past the bound mesh's node count
    #[error("Node {node} out of range for object {id} ({count} nodes)")]
    NodeOutOfRange {
        /// Object id
        id: ObjectId,
        /// Requested node
        node: usize,
        /// Node count of the bound mesh
        count: usize,
    },

    /// Backend and scene disagree on frames in flight
    #[error("Backend has {backend} frames in flight, scene was built for {scene}")]
    FrameMismatch {
        /// Backend's count
        backend: usize,
        /// Scene's count
        scene: usize,
    },

    /// Render-side failure
    #[error(transparent)]
    Render(#[from] RenderError),

    /// Asset persistence failure
    #[error(transparent)]
    Asset(#[from] AssetError),

    /// Configuration failure
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl SceneError {
    /// Whether the error means the process should stop
    ///
    /// Capacity and binding failures come from limits sized at startup, so
    /// carrying on would only corrupt state further.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SceneError::CapacityExceeded { .. }
                | SceneError::Render(_)
                | SceneError::FrameMismatch { .. }
        )
    }
}
