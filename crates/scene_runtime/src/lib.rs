//! # Scene Runtime
//!
//! The object and resource core of a frame-pipelined renderer.
//!
//! ## Features
//!
//! - **Object Table**: fixed-capacity, id-reusing table of scene objects
//! - **Frame Replication**: per-object parameter blocks written once per frame in flight
//! - **Dirty Propagation**: only changed objects are re-uploaded, exactly once per replica
//! - **Node Hierarchies**: per-node overrides resolved into world transforms per mesh part
//! - **Binding Cache**: texture bindings reused across frames and rebuilt only on change
//! - **Asset Cache**: shared meshes, textures and materials with deferred destruction
//! - **Persistence**: RON scene files with guid-based asset references
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scene_runtime::prelude::*;
//!
//! fn main() -> Result<(), SceneError> {
//!     let config = RuntimeConfig::default().with_max_objects(64);
//!     let frames = config.frames_in_flight;
//!     let bindings = config.max_bindings();
//!     let mut scene = Scene::headless(config, MemoryAssetFactory::new())?;
//!     let mut backend = HeadlessBackend::new(frames, bindings);
//!
//!     let cube = scene.create_mesh(Vec3::zeros(), None)?;
//!     scene.set_position(cube, Vec3::new(0.0, 1.0, 0.0))?;
//!     let stats = scene.prepare_frame(&mut backend)?;
//!     println!("{} objects uploaded", stats.objects_written);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod assets;
pub mod config;
pub mod foundation;
pub mod render;
pub mod scene;

/// Common imports for runtime users
pub mod prelude {
    pub use crate::{
        assets::{AssetCache, AssetFactory, AssetRegistry, FsAssetFactory, MaterialData, MemoryAssetFactory},
        config::RuntimeConfig,
        foundation::math::{Mat4, Transform, Vec3},
        render::{FrameStats, HeadlessBackend, RenderBackend},
        scene::{ObjectHandle, ObjectId, ObjectKind, Scene, SceneDescription, SceneError},
    };
}
