//! Path-keyed asset cache with deferred destruction
//!
//! Every load is memoised by normalized path, after resolving guid references
//! through the [`AssetRegistry`]. Replaced textures and materials are not
//! destroyed on the spot: they go into a bounded [`RetirementQueue`] and are
//! only released once they fall off its end. Anything still shared when it
//! falls off is parked and retried on later retirements and on `clear`.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::MATERIAL_TEXTURE_SLOTS;

use super::factory::AssetFactory;
use super::registry::AssetRegistry;
use super::retirement::RetirementQueue;
use super::types::{MaterialAsset, MaterialData, MeshAsset, TextureAsset, TextureSlot};

/// A superseded resource waiting in the retirement queue
#[derive(Debug)]
pub enum Retired {
    /// Replaced texture
    Texture(Arc<TextureAsset>),
    /// Replaced material
    Material(Arc<MaterialAsset>),
}

/// Cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Loads served from the cache
    pub hits: u64,
    /// Loads that reached the factory
    pub misses: u64,
    /// Factory loads that failed
    pub failures: u64,
    /// Resources handed to the retirement queue
    pub retired: u64,
    /// Textures released through the factory
    pub destroyed: u64,
}

/// Asset cache over a factory
pub struct AssetCache<F: AssetFactory> {
    factory: F,
    registry: AssetRegistry,
    models: HashMap<String, Arc<MeshAsset>>,
    materials: HashMap<String, Arc<MaterialAsset>>,
    textures: HashMap<String, Arc<TextureAsset>>,
    default_texture: Option<Arc<TextureAsset>>,
    retirement: RetirementQueue<Retired>,
    deferred: Vec<Retired>,
    stats: CacheStats,
}

impl<F: AssetFactory> AssetCache<F> {
    /// Create a cache with an empty registry
    pub fn new(factory: F, retirement_capacity: usize) -> Self {
        Self {
            factory,
            registry: AssetRegistry::new(),
            models: HashMap::new(),
            materials: HashMap::new(),
            textures: HashMap::new(),
            default_texture: None,
            retirement: RetirementQueue::new(retirement_capacity),
            deferred: Vec::new(),
            stats: CacheStats::default(),
        }
    }

    /// Replace the guid registry
    pub fn with_registry(mut self, registry: AssetRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Guid registry
    pub fn registry(&self) -> &AssetRegistry {
        &self.registry
    }

    /// Mutable guid registry
    pub fn registry_mut(&mut self) -> &mut AssetRegistry {
        &mut self.registry
    }

    /// Underlying factory
    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Mutable underlying factory
    pub fn factory_mut(&mut self) -> &mut F {
        &mut self.factory
    }

    /// Counters
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Resources waiting for destruction
    pub fn retirement(&self) -> &RetirementQueue<Retired> {
        &self.retirement
    }

    /// Evicted resources whose destruction waits for outside owners
    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }

    /// Cache key for a stored path or guid reference
    pub fn resolve_path(&self, stored: &str) -> String {
        self.registry.resolve(stored)
    }

    /// Reference to persist for a loaded asset path
    pub fn reference_for(&self, path: &str) -> String {
        self.registry.reference_for(path)
    }

    /// Load a mesh, resolving its part textures
    pub fn load_model(&mut self, path: &str) -> Option<Arc<MeshAsset>> {
        let key = self.resolve_path(path);
        if let Some(mesh) = self.models.get(&key) {
            self.stats.hits += 1;
            return Some(Arc::clone(mesh));
        }

        self.stats.misses += 1;
        let Some(mut mesh) = self.factory.load_model(&key) else {
            self.stats.failures += 1;
            log::warn!("Failed to load model '{}', object will have no geometry", key);
            return None;
        };

        mesh.texture = mesh.texture_path.clone().and_then(|p| self.load_texture(&p));
        for part in mesh.parts.iter_mut() {
            part.texture = part.texture_path.clone().and_then(|p| self.load_texture(&p));
        }

        log::debug!("Cached model '{}' ({} nodes, {} parts)", key, mesh.node_count(), mesh.parts.len());
        let mesh = Arc::new(mesh);
        self.models.insert(key, Arc::clone(&mesh));
        Some(mesh)
    }

    /// Load a material, resolving its texture slots
    pub fn load_material(&mut self, path: &str) -> Option<Arc<MaterialAsset>> {
        let key = self.resolve_path(path);
        if let Some(material) = self.materials.get(&key) {
            self.stats.hits += 1;
            return Some(Arc::clone(material));
        }

        self.stats.misses += 1;
        let Some(data) = self.factory.load_material_data(&key) else {
            self.stats.failures += 1;
            log::warn!("Failed to load material '{}'", key);
            return None;
        };

        let textures = self.resolve_material_textures(&data);
        let material = Arc::new(MaterialAsset::new(key.clone(), data, textures));
        log::debug!("Cached material '{}' (slots {:?})", key, material.texture_slots());
        self.materials.insert(key, Arc::clone(&material));
        Some(material)
    }

    /// Load a texture
    pub fn load_texture(&mut self, path: &str) -> Option<Arc<TextureAsset>> {
        let key = self.resolve_path(path);
        if let Some(texture) = self.textures.get(&key) {
            self.stats.hits += 1;
            return Some(Arc::clone(texture));
        }

        self.stats.misses += 1;
        let Some(texture) = self.factory.load_texture(&key) else {
            self.stats.failures += 1;
            log::warn!("Failed to load texture '{}', rendering untextured", key);
            return None;
        };

        let texture = Arc::new(texture);
        self.textures.insert(key, Arc::clone(&texture));
        Some(texture)
    }

    /// Texture bound when nothing else is
    pub fn default_texture(&mut self) -> Arc<TextureAsset> {
        if let Some(texture) = &self.default_texture {
            return Arc::clone(texture);
        }
        let texture = Arc::new(self.factory.default_texture());
        self.default_texture = Some(Arc::clone(&texture));
        texture
    }

    /// Create a fresh material and cache it under `path`
    ///
    /// A material previously cached under the same path is retired.
    pub fn create_material(&mut self, path: &str) -> Arc<MaterialAsset> {
        let key = self.resolve_path(path);
        let data = self.factory.create_material();
        let textures = self.resolve_material_textures(&data);
        let material = Arc::new(MaterialAsset::new(key.clone(), data, textures));

        if let Some(previous) = self.materials.insert(key, Arc::clone(&material)) {
            self.retire(Retired::Material(previous));
        }
        material
    }

    /// Persist a material description through the factory
    pub fn save_material(&mut self, path: &str, data: &MaterialData) -> bool {
        let key = self.resolve_path(path);
        let saved = self.factory.save_material(&key, data);
        if !saved {
            log::warn!("Failed to save material '{}'", key);
        }
        saved
    }

    /// Update a cached material in place
    ///
    /// Every slot whose resolved source path changed gets its new texture loaded and
    /// its old texture retired. Objects holding the material see the change
    /// on their next frame. Returns `false` if the material is not cached.
    pub fn update_material_from_data(&mut self, path: &str, data: MaterialData) -> bool {
        let key = self.resolve_path(path);
        let Some(material) = self.materials.get(&key).cloned() else {
            log::warn!("Cannot update material '{}': not loaded", key);
            return false;
        };

        let mut replaced = Vec::new();
        {
            let mut state = material.state_mut();
            for slot in TextureSlot::ALL {
                let index = slot.index();
                let old_key = state.data.textures[index].as_deref().map(|p| self.resolve_path(p));
                let new_key = data.textures[index].as_deref().map(|p| self.resolve_path(p));
                if old_key == new_key {
                    continue;
                }

                let texture = data.textures[index].as_deref().and_then(|p| self.load_texture(p));
                if let Some(old) = std::mem::replace(&mut state.textures[index], texture) {
                    replaced.push(old);
                }
                log::debug!("Material '{}' slot {:?} -> {:?}", key, slot, data.textures[index]);
            }
            state.data = data;
            state.revision += 1;
        }

        for old in replaced {
            self.retire(Retired::Texture(old));
        }
        true
    }

    /// Reload a material's description from the factory and apply it in place
    pub fn reload_material(&mut self, path: &str) -> bool {
        let key = self.resolve_path(path);
        match self.factory.load_material_data(&key) {
            Some(data) => self.update_material_from_data(&key, data),
            None => {
                log::warn!("Failed to reload material '{}', keeping cached version", key);
                false
            }
        }
    }

    /// Reload a cached texture, retiring the previous one
    ///
    /// Cached materials that referenced the old texture are repointed at the
    /// new one. Meshes keep the texture they were loaded with. On failure the
    /// cached texture stays in place.
    pub fn reload_texture(&mut self, path: &str) -> Option<Arc<TextureAsset>> {
        let key = self.resolve_path(path);
        let Some(texture) = self.factory.load_texture(&key) else {
            self.stats.failures += 1;
            log::warn!("Failed to reload texture '{}', keeping cached version", key);
            return None;
        };

        let texture = Arc::new(texture);
        if let Some(old) = self.textures.insert(key.clone(), Arc::clone(&texture)) {
            for material in self.materials.values() {
                let mut state = material.state_mut();
                let mut touched = false;
                for slot in state.textures.iter_mut() {
                    if matches!(slot, Some(current) if Arc::ptr_eq(current, &old)) {
                        *slot = Some(Arc::clone(&texture));
                        touched = true;
                    }
                }
                if touched {
                    state.revision += 1;
                }
            }
            self.retire(Retired::Texture(old));
        }

        log::debug!("Reloaded texture '{}' as {:?}", key, texture.id());
        Some(texture)
    }

    /// Number of cached models, materials and textures
    pub fn cached_counts(&self) -> (usize, usize, usize) {
        (self.models.len(), self.materials.len(), self.textures.len())
    }

    /// Drop every cached asset and drain the retirement queue
    ///
    /// Textures still referenced from outside the cache stay parked until a
    /// later `clear` or retirement finds them unshared.
    pub fn clear(&mut self) {
        let retired: Vec<Retired> = self.retirement.drain().collect();
        for item in retired {
            self.destroy(item);
        }

        self.models.clear();
        let materials: Vec<_> = self.materials.drain().map(|(_, m)| m).collect();
        for material in materials {
            self.destroy(Retired::Material(material));
        }

        let textures: Vec<_> = self.textures.drain().map(|(_, t)| t).collect();
        for texture in textures {
            self.destroy(Retired::Texture(texture));
        }
        if let Some(texture) = self.default_texture.take() {
            self.destroy(Retired::Texture(texture));
        }
        self.retry_deferred();
    }

    fn resolve_material_textures(
        &mut self,
        data: &MaterialData,
    ) -> [Option<Arc<TextureAsset>>; MATERIAL_TEXTURE_SLOTS] {
        let mut textures: [Option<Arc<TextureAsset>>; MATERIAL_TEXTURE_SLOTS] = Default::default();
        for slot in TextureSlot::ALL {
            textures[slot.index()] = data.texture(slot).and_then(|p| self.load_texture(p));
        }
        textures
    }

    fn retire(&mut self, item: Retired) {
        self.retry_deferred();
        self.stats.retired += 1;
        if let Some(evicted) = self.retirement.retire(item) {
            self.destroy(evicted);
        }
    }

    fn retry_deferred(&mut self) {
        if self.deferred.is_empty() {
            return;
        }
        let parked = std::mem::take(&mut self.deferred);
        for item in parked {
            self.destroy(item);
        }
    }

    fn destroy(&mut self, item: Retired) {
        match item {
            Retired::Texture(texture) => match Arc::try_unwrap(texture) {
                Ok(texture) => {
                    self.stats.destroyed += 1;
                    self.factory.destroy_texture(texture);
                }
                Err(texture) => {
                    log::debug!("Texture '{}' still referenced, deferring destruction", texture.path());
                    self.deferred.push(Retired::Texture(texture));
                }
            },
            Retired::Material(material) => match Arc::try_unwrap(material) {
                Ok(material) => {
                    let textures = std::mem::take(&mut material.state_mut().textures);
                    for texture in textures.into_iter().flatten() {
                        self.destroy(Retired::Texture(texture));
                    }
                }
                Err(material) => {
                    log::debug!("Material '{}' still referenced, deferring destruction", material.path());
                    self.deferred.push(Retired::Material(material));
                }
            },
        }
    }
}

impl<F: AssetFactory> Drop for AssetCache<F> {
    fn drop(&mut self) {
        self.clear();
        if !self.deferred.is_empty() {
            log::warn!("{} assets still shared when the cache was dropped", self.deferred.len());
        }
    }
}
