//! Asset management
//!
//! Path-keyed caches for meshes, materials and textures, the factory
//! boundary that actually reads files, the guid registry that survives file
//! moves, and the retirement queue that keeps replaced GPU resources alive
//! for a while.

pub mod cache;
pub mod factory;
pub mod registry;
pub mod retirement;
pub mod types;

pub use cache::{AssetCache, CacheStats, Retired};
pub use factory::{AssetFactory, FsAssetFactory, MemoryAssetFactory};
pub use registry::{AssetGuid, AssetRegistry};
pub use retirement::RetirementQueue;
pub use types::{
    MaterialAsset, MaterialData, MaterialId, MeshAsset, MeshData, MeshId, MeshNode, MeshPart,
    TextureAsset, TextureId, TextureSlot, TextureSlots,
};

/// Asset system errors
#[derive(thiserror::Error, Debug)]
pub enum AssetError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),
}

/// Canonical cache key for an asset path
///
/// Backslashes become forward slashes, `.` segments are dropped and `..`
/// collapses the previous segment. A leading `/` is kept.
pub fn normalize_path(path: &str) -> String {
    let unified = path.replace('\\', "/");
    let absolute = unified.starts_with('/');

    let mut segments: Vec<&str> = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if matches!(segments.last(), Some(last) if *last != "..") {
                    segments.pop();
                } else if !absolute {
                    segments.push("..");
                }
            }
            other => segments.push(other),
        }
    }

    let joined = segments.join("/");
    if absolute {
        format!("/{}", joined)
    } else {
        joined
    }
}
