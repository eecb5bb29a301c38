//! Shared asset types
//!
//! Meshes, materials and textures are handed out as `Arc`s by the
//! [`AssetCache`](super::AssetCache) and treated as immutable, with one
//! exception: a material's texture slots can be swapped in place by
//! `update_material_from_data`, so that state sits behind a lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::config::MATERIAL_TEXTURE_SLOTS;
use crate::foundation::math::{Mat4, Transform};

static NEXT_TEXTURE_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_MESH_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_MATERIAL_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one loaded texture
///
/// Assigned once per successful load and never reused, so two loads of the
/// same pixels produce two different identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u64);

impl TextureId {
    fn next() -> Self {
        Self(NEXT_TEXTURE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Identity of one loaded mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshId(pub u64);

/// Identity of one loaded material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialId(pub u64);

/// A texture as seen by the scene core
///
/// `gpu_handle` is opaque here; the render backend decides what it means.
#[derive(Debug)]
pub struct TextureAsset {
    id: TextureId,
    path: String,
    width: u32,
    height: u32,
    gpu_handle: u64,
    pixels: Vec<u8>,
}

impl TextureAsset {
    /// Create a texture with a fresh identity
    pub fn new(path: impl Into<String>, width: u32, height: u32, gpu_handle: u64) -> Self {
        Self {
            id: TextureId::next(),
            path: path.into(),
            width,
            height,
            gpu_handle,
            pixels: Vec::new(),
        }
    }

    /// Attach RGBA8 pixel data for upload
    pub fn with_pixels(mut self, pixels: Vec<u8>) -> Self {
        self.pixels = pixels;
        self
    }

    /// Texture identity
    pub fn id(&self) -> TextureId {
        self.id
    }

    /// Source path
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Dimensions in pixels
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Backend handle
    pub fn gpu_handle(&self) -> u64 {
        self.gpu_handle
    }

    /// RGBA8 pixels, empty if the backend already owns the upload
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

/// One node of a mesh's rigid-part hierarchy
#[derive(Debug, Clone)]
pub struct MeshNode {
    /// Node name as authored
    pub name: String,
    /// Parent index, `-1` for roots; always less than this node's index
    pub parent: i32,
    /// Transform relative to the parent
    pub local: Mat4,
}

/// A drawable index range of a mesh attached to one node
#[derive(Debug, Clone)]
pub struct MeshPart {
    /// Part name as authored
    pub name: String,
    /// Node the part hangs off
    pub node: usize,
    /// First index in the mesh's index buffer
    pub first_index: u32,
    /// Number of indices
    pub index_count: u32,
    /// Source path of the part's own texture
    pub texture_path: Option<String>,
    /// Resolved texture, filled in by the asset cache
    pub texture: Option<Arc<TextureAsset>>,
}

/// A loaded mesh
#[derive(Debug)]
pub struct MeshAsset {
    id: MeshId,
    path: String,
    /// Node hierarchy, parents before children
    pub nodes: Vec<MeshNode>,
    /// Drawable parts
    pub parts: Vec<MeshPart>,
    /// Total index count, used when the mesh has no explicit parts
    pub index_count: u32,
    /// Source path of the whole-mesh texture
    pub texture_path: Option<String>,
    /// Whole-mesh texture, filled in by the asset cache
    pub texture: Option<Arc<TextureAsset>>,
}

impl MeshAsset {
    /// Create an empty mesh with a fresh identity
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            id: MeshId(NEXT_MESH_ID.fetch_add(1, Ordering::Relaxed)),
            path: path.into(),
            nodes: Vec::new(),
            parts: Vec::new(),
            index_count: 0,
            texture_path: None,
            texture: None,
        }
    }

    /// Mesh identity
    pub fn id(&self) -> MeshId {
        self.id
    }

    /// Source path
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Number of hierarchy nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Whether parts need independent bindings
    pub fn is_multi_part(&self) -> bool {
        self.parts.len() > 1
    }

    /// Whether any part or the whole mesh carries a texture
    pub fn has_texture(&self) -> bool {
        self.texture.is_some() || self.parts.iter().any(|p| p.texture.is_some())
    }
}

/// Material texture slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureSlot {
    /// Albedo
    BaseColor,
    /// Tangent-space normal map
    Normal,
    /// Metallic in B, roughness in G
    MetallicRoughness,
    /// Ambient occlusion
    Occlusion,
    /// Emissive colour
    Emissive,
}

impl TextureSlot {
    /// Every slot in binding order
    pub const ALL: [TextureSlot; MATERIAL_TEXTURE_SLOTS] = [
        TextureSlot::BaseColor,
        TextureSlot::Normal,
        TextureSlot::MetallicRoughness,
        TextureSlot::Occlusion,
        TextureSlot::Emissive,
    ];

    /// Array index of this slot
    pub fn index(self) -> usize {
        self as usize
    }

    /// Presence flag for this slot
    pub fn flag(self) -> TextureSlots {
        TextureSlots::from_bits_truncate(1 << self.index())
    }
}

bitflags! {
    /// Which material texture slots are populated
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TextureSlots: u32 {
        /// Albedo present
        const BASE_COLOR = 1 << 0;
        /// Normal map present
        const NORMAL = 1 << 1;
        /// Metallic-roughness present
        const METALLIC_ROUGHNESS = 1 << 2;
        /// Occlusion present
        const OCCLUSION = 1 << 3;
        /// Emissive present
        const EMISSIVE = 1 << 4;
    }
}

/// Serializable material description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialData {
    /// Display name
    pub name: String,
    /// RGBA multiplier
    pub base_color_factor: [f32; 4],
    /// Metallic factor
    pub metallic: f32,
    /// Roughness factor
    pub roughness: f32,
    /// Emissive colour
    pub emissive: [f32; 3],
    /// Source paths, indexed by [`TextureSlot::index`]
    pub textures: [Option<String>; MATERIAL_TEXTURE_SLOTS],
}

impl Default for MaterialData {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            base_color_factor: [1.0, 1.0, 1.0, 1.0],
            metallic: 0.0,
            roughness: 0.8,
            emissive: [0.0, 0.0, 0.0],
            textures: Default::default(),
        }
    }
}

impl MaterialData {
    /// Set the source path of one slot
    pub fn with_texture(mut self, slot: TextureSlot, path: impl Into<String>) -> Self {
        self.textures[slot.index()] = Some(path.into());
        self
    }

    /// Source path of one slot
    pub fn texture(&self, slot: TextureSlot) -> Option<&str> {
        self.textures[slot.index()].as_deref()
    }
}

/// Mutable part of a material
#[derive(Debug, Default)]
pub struct MaterialState {
    /// Current description
    pub data: MaterialData,
    /// Resolved textures, indexed by [`TextureSlot::index`]
    pub textures: [Option<Arc<TextureAsset>>; MATERIAL_TEXTURE_SLOTS],
    /// Bumped on every in-place update
    pub revision: u32,
}

/// A loaded material
#[derive(Debug)]
pub struct MaterialAsset {
    id: MaterialId,
    path: String,
    state: RwLock<MaterialState>,
}

impl MaterialAsset {
    /// Create a material with a fresh identity
    pub fn new(
        path: impl Into<String>,
        data: MaterialData,
        textures: [Option<Arc<TextureAsset>>; MATERIAL_TEXTURE_SLOTS],
    ) -> Self {
        Self {
            id: MaterialId(NEXT_MATERIAL_ID.fetch_add(1, Ordering::Relaxed)),
            path: path.into(),
            state: RwLock::new(MaterialState {
                data,
                textures,
                revision: 0,
            }),
        }
    }

    /// Material identity
    pub fn id(&self) -> MaterialId {
        self.id
    }

    /// Source path
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Read access to the mutable state
    pub fn state(&self) -> RwLockReadGuard<'_, MaterialState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn state_mut(&self) -> RwLockWriteGuard<'_, MaterialState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Texture bound to a slot
    pub fn texture(&self, slot: TextureSlot) -> Option<Arc<TextureAsset>> {
        self.state().textures[slot.index()].clone()
    }

    /// Populated slots
    pub fn texture_slots(&self) -> TextureSlots {
        let state = self.state();
        TextureSlot::ALL
            .iter()
            .filter(|slot| state.textures[slot.index()].is_some())
            .fold(TextureSlots::empty(), |acc, slot| acc | slot.flag())
    }

    /// Whether any slot carries a texture
    pub fn has_texture(&self) -> bool {
        !self.texture_slots().is_empty()
    }

    /// Copy of the current description
    pub fn data(&self) -> MaterialData {
        self.state().data.clone()
    }
}

/// Serializable node description used by mesh files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeData {
    /// Node name
    pub name: String,
    /// Parent index, `-1` for roots
    #[serde(default = "root_parent")]
    pub parent: i32,
    /// Local transform
    #[serde(default)]
    pub transform: Transform,
}

fn root_parent() -> i32 {
    -1
}

/// Serializable part description used by mesh files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartData {
    /// Part name
    pub name: String,
    /// Owning node
    #[serde(default)]
    pub node: usize,
    /// First index
    #[serde(default)]
    pub first_index: u32,
    /// Index count
    pub index_count: u32,
    /// Optional texture path
    #[serde(default)]
    pub texture: Option<String>,
}

/// Serializable mesh description
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshData {
    /// Node hierarchy
    pub nodes: Vec<NodeData>,
    /// Drawable parts
    pub parts: Vec<PartData>,
    /// Total index count
    pub index_count: u32,
    /// Whole-mesh texture path
    pub texture: Option<String>,
}

impl MeshData {
    /// Build an unresolved mesh asset from this description
    pub fn into_asset(self, path: impl Into<String>) -> MeshAsset {
        let mut mesh = MeshAsset::new(path);
        mesh.nodes = self
            .nodes
            .into_iter()
            .map(|node| MeshNode {
                name: node.name,
                parent: node.parent,
                local: node.transform.to_matrix(),
            })
            .collect();
        mesh.parts = self
            .parts
            .into_iter()
            .map(|part| MeshPart {
                name: part.name,
                node: part.node,
                first_index: part.first_index,
                index_count: part.index_count,
                texture_path: part.texture,
                texture: None,
            })
            .collect();
        let part_total: u32 = mesh.parts.iter().map(|p| p.index_count).sum();
        mesh.index_count = self.index_count.max(part_total);
        mesh.texture_path = self.texture;
        mesh
    }
}
