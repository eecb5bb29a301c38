//! Asset factory boundary
//!
//! The scene core never parses files itself; it asks an [`AssetFactory`] for
//! decoded assets and treats every failure as "render without it".
//! [`FsAssetFactory`] is the filesystem implementation: RON descriptions for
//! meshes and materials, `image` for textures. [`MemoryAssetFactory`] serves
//! registered descriptions from memory for headless runs.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::normalize_path;
use super::types::{MaterialData, MeshAsset, MeshData, TextureAsset};

/// Source of decoded assets
///
/// Every loader may fail by returning `None`; callers log and continue.
pub trait AssetFactory {
    /// Load a mesh description, textures unresolved
    fn load_model(&mut self, path: &str) -> Option<MeshAsset>;

    /// Load a material description, textures unresolved
    fn load_material_data(&mut self, path: &str) -> Option<MaterialData>;

    /// Description for a brand new material
    fn create_material(&mut self) -> MaterialData {
        MaterialData::default()
    }

    /// Persist a material description
    fn save_material(&mut self, path: &str, data: &MaterialData) -> bool;

    /// Load and upload a texture
    fn load_texture(&mut self, path: &str) -> Option<TextureAsset>;

    /// Texture used when nothing else is bound
    fn default_texture(&mut self) -> TextureAsset;

    /// Release a texture's backend resources
    fn destroy_texture(&mut self, texture: TextureAsset);
}

/// Filesystem-backed asset factory
pub struct FsAssetFactory {
    root: PathBuf,
    next_gpu_handle: u64,
    live_textures: usize,
}

impl FsAssetFactory {
    /// Create a factory resolving relative paths against `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            next_gpu_handle: 1,
            live_textures: 0,
        }
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Textures created and not yet destroyed
    pub fn live_textures(&self) -> usize {
        self.live_textures
    }

    fn full_path(&self, path: &str) -> PathBuf {
        let candidate = Path::new(path);
        if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.root.join(candidate)
        }
    }

    fn read_ron<T: serde::de::DeserializeOwned>(&self, path: &str) -> Option<T> {
        let full = self.full_path(path);
        let contents = match std::fs::read_to_string(&full) {
            Ok(contents) => contents,
            Err(e) => {
                log::warn!("Failed to read {}: {}", full.display(), e);
                return None;
            }
        };

        match ron::from_str(&contents) {
            Ok(value) => Some(value),
            Err(e) => {
                log::warn!("Failed to parse {}: {}", full.display(), e);
                None
            }
        }
    }

    fn allocate_gpu_handle(&mut self) -> u64 {
        let handle = self.next_gpu_handle;
        self.next_gpu_handle += 1;
        self.live_textures += 1;
        handle
    }
}

impl AssetFactory for FsAssetFactory {
    fn load_model(&mut self, path: &str) -> Option<MeshAsset> {
        let data: MeshData = self.read_ron(path)?;
        log::debug!("Loaded mesh {} ({} nodes, {} parts)", path, data.nodes.len(), data.parts.len());
        Some(data.into_asset(path))
    }

    fn load_material_data(&mut self, path: &str) -> Option<MaterialData> {
        self.read_ron(path)
    }

    fn save_material(&mut self, path: &str, data: &MaterialData) -> bool {
        let full = self.full_path(path);
        let contents = match ron::ser::to_string_pretty(data, ron::ser::PrettyConfig::default()) {
            Ok(contents) => contents,
            Err(e) => {
                log::warn!("Failed to serialize material {}: {}", path, e);
                return false;
            }
        };

        if let Some(parent) = full.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                log::warn!("Failed to create {}: {}", parent.display(), e);
                return false;
            }
        }

        match std::fs::write(&full, contents) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Failed to write material {}: {}", full.display(), e);
                false
            }
        }
    }

    fn load_texture(&mut self, path: &str) -> Option<TextureAsset> {
        let full = self.full_path(path);
        let image = match image::open(&full) {
            Ok(image) => image.to_rgba8(),
            Err(e) => {
                log::warn!("Failed to load texture {}: {}", full.display(), e);
                return None;
            }
        };

        let (width, height) = image.dimensions();
        let handle = self.allocate_gpu_handle();
        log::debug!("Loaded texture {} ({}x{}) as handle {}", path, width, height, handle);
        Some(TextureAsset::new(path, width, height, handle).with_pixels(image.into_raw()))
    }

    fn default_texture(&mut self) -> TextureAsset {
        let handle = self.allocate_gpu_handle();
        TextureAsset::new("<default>", 1, 1, handle).with_pixels(vec![255, 255, 255, 255])
    }

    fn destroy_texture(&mut self, texture: TextureAsset) {
        log::debug!("Destroying texture {} (handle {})", texture.path(), texture.gpu_handle());
        self.live_textures = self.live_textures.saturating_sub(1);
    }
}

/// In-memory asset factory
///
/// Assets are registered up front by path. Texture "uploads" only hand out
/// fresh handles, with pixels attached when they were registered; destroyed textures are recorded so callers can check
/// exactly what was released.
#[derive(Debug, Default)]
pub struct MemoryAssetFactory {
    meshes: HashMap<String, MeshData>,
    materials: HashMap<String, MaterialData>,
    textures: HashMap<String, (u32, u32, Vec<u8>)>,
    next_gpu_handle: u64,
    live_textures: usize,
    texture_loads: usize,
    destroyed: Vec<String>,
}

impl MemoryAssetFactory {
    /// Create an empty factory
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a mesh description
    pub fn with_mesh(mut self, path: &str, mesh: MeshData) -> Self {
        self.insert_mesh(path, mesh);
        self
    }

    /// Register a material description
    pub fn with_material(mut self, path: &str, material: MaterialData) -> Self {
        self.insert_material(path, material);
        self
    }

    /// Register a texture
    pub fn with_texture(mut self, path: &str, width: u32, height: u32) -> Self {
        self.insert_texture(path, width, height);
        self
    }

    /// Register or replace a mesh description
    pub fn insert_mesh(&mut self, path: &str, mesh: MeshData) {
        self.meshes.insert(normalize_path(path), mesh);
    }

    /// Register or replace a material description
    pub fn insert_material(&mut self, path: &str, material: MaterialData) {
        self.materials.insert(normalize_path(path), material);
    }

    /// Register or replace a texture
    pub fn insert_texture(&mut self, path: &str, width: u32, height: u32) {
        self.textures.insert(normalize_path(path), (width, height, Vec::new()));
    }

    /// Register a texture with RGBA8 pixels for backends that upload
    pub fn with_texture_pixels(mut self, path: &str, width: u32, height: u32, pixels: Vec<u8>) -> Self {
        self.textures.insert(normalize_path(path), (width, height, pixels));
        self
    }

    /// Remove a texture so later loads fail
    pub fn remove_texture(&mut self, path: &str) {
        self.textures.remove(&normalize_path(path));
    }

    /// Textures created and not yet destroyed
    pub fn live_textures(&self) -> usize {
        self.live_textures
    }

    /// Successful texture loads so far
    pub fn texture_loads(&self) -> usize {
        self.texture_loads
    }

    /// Paths of destroyed textures, in destruction order
    pub fn destroyed(&self) -> &[String] {
        &self.destroyed
    }
}

impl AssetFactory for MemoryAssetFactory {
    fn load_model(&mut self, path: &str) -> Option<MeshAsset> {
        self.meshes.get(path).cloned().map(|data| data.into_asset(path))
    }

    fn load_material_data(&mut self, path: &str) -> Option<MaterialData> {
        self.materials.get(path).cloned()
    }

    fn save_material(&mut self, path: &str, data: &MaterialData) -> bool {
        self.materials.insert(normalize_path(path), data.clone());
        true
    }

    fn load_texture(&mut self, path: &str) -> Option<TextureAsset> {
        let (width, height, pixels) = self.textures.get(path)?;
        let texture = TextureAsset::new(path, *width, *height, self.next_gpu_handle + 1).with_pixels(pixels.clone());
        self.next_gpu_handle += 1;
        self.live_textures += 1;
        self.texture_loads += 1;
        Some(texture)
    }

    fn default_texture(&mut self) -> TextureAsset {
        self.next_gpu_handle += 1;
        self.live_textures += 1;
        TextureAsset::new("<default>", 1, 1, self.next_gpu_handle)
    }

    fn destroy_texture(&mut self, texture: TextureAsset) {
        self.live_textures = self.live_textures.saturating_sub(1);
        self.destroyed.push(texture.path().to_string());
    }
}
