//! Asset factory that uploads textures to the device
//!
//! Wraps any [`AssetFactory`] that decodes pixels. Every texture it hands out
//! gets a [`GpuImage`] registered under its `gpu_handle` in the pool's
//! [`TextureTable`]; destroying the texture unregisters and frees the image.
//! Textures without pixels, or whose upload fails, stay unregistered and
//! sample the pool's fallback.

use std::collections::HashMap;
use std::sync::Arc;

use super::context::VulkanContext;
use super::texture::{GpuImage, TextureTable};
use crate::assets::{AssetFactory, MaterialData, MeshAsset, TextureAsset};

/// Uploading wrapper around a decoding factory
pub struct VulkanAssetFactory<F: AssetFactory> {
    inner: F,
    table: TextureTable,
    images: HashMap<u64, GpuImage>,
    uploads: u64,
    context: Arc<VulkanContext>,
}

impl<F: AssetFactory> VulkanAssetFactory<F> {
    /// Upload through `context`, registering images in `table`
    pub fn new(context: Arc<VulkanContext>, table: TextureTable, inner: F) -> Self {
        Self {
            inner,
            table,
            images: HashMap::new(),
            uploads: 0,
            context,
        }
    }

    /// Wrapped factory
    pub fn inner(&self) -> &F {
        &self.inner
    }

    /// Mutable wrapped factory
    pub fn inner_mut(&mut self) -> &mut F {
        &mut self.inner
    }

    /// Images currently resident
    pub fn resident_images(&self) -> usize {
        self.images.len()
    }

    /// Successful uploads since creation
    pub fn uploads(&self) -> u64 {
        self.uploads
    }

    fn upload(&mut self, texture: &TextureAsset) {
        if texture.pixels().is_empty() {
            log::debug!("Texture '{}' has no pixels, binding the fallback", texture.path());
            return;
        }

        let (width, height) = texture.size();
        match GpuImage::from_rgba(Arc::clone(&self.context), width, height, texture.pixels()) {
            Ok(image) => {
                self.table.register(texture.gpu_handle(), image.view(), image.sampler());
                if self.images.insert(texture.gpu_handle(), image).is_some() {
                    log::warn!("Texture handle {} uploaded twice", texture.gpu_handle());
                }
                self.uploads += 1;
            }
            Err(e) => {
                log::warn!("Failed to upload texture '{}': {}", texture.path(), e);
            }
        }
    }
}

impl<F: AssetFactory> AssetFactory for VulkanAssetFactory<F> {
    fn load_model(&mut self, path: &str) -> Option<MeshAsset> {
        self.inner.load_model(path)
    }

    fn load_material_data(&mut self, path: &str) -> Option<MaterialData> {
        self.inner.load_material_data(path)
    }

    fn create_material(&mut self) -> MaterialData {
        self.inner.create_material()
    }

    fn save_material(&mut self, path: &str, data: &MaterialData) -> bool {
        self.inner.save_material(path, data)
    }

    fn load_texture(&mut self, path: &str) -> Option<TextureAsset> {
        let texture = self.inner.load_texture(path)?;
        self.upload(&texture);
        Some(texture)
    }

    fn default_texture(&mut self) -> TextureAsset {
        let texture = self.inner.default_texture();
        self.upload(&texture);
        texture
    }

    fn destroy_texture(&mut self, texture: TextureAsset) {
        let handle = texture.gpu_handle();
        self.table.unregister(handle);
        if self.images.remove(&handle).is_some() {
            log::debug!("Released GPU image of '{}' (handle {})", texture.path(), handle);
        }
        self.inner.destroy_texture(texture);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::MemoryAssetFactory;
    use crate::config::RuntimeConfig;
    use crate::foundation::math::Vec3;
    use crate::render::vulkan::{VulkanBackend, VulkanReplicaMemory};
    use crate::render::BindingOwner;
    use crate::scene::{ObjectKind, Scene};

    #[test]
    #[ignore = "requires a Vulkan driver"]
    fn test_sprite_binding_samples_uploaded_texture() {
        let config = RuntimeConfig::default()
            .with_max_objects(4)
            .with_frames_in_flight(2)
            .with_retirement_capacity(1);
        let context = Arc::new(VulkanContext::new("asset_factory_tests", false).unwrap());
        let replicas = VulkanReplicaMemory::for_config(Arc::clone(&context), &config).unwrap();
        let mut backend = VulkanBackend::new(Arc::clone(&context), &replicas, config.max_bindings()).unwrap();

        let pixels = [200, 40, 40, 255].repeat(4);
        let inner = MemoryAssetFactory::new().with_texture_pixels("red.png", 2, 2, pixels);
        let factory = VulkanAssetFactory::new(Arc::clone(&context), backend.pool().texture_table(), inner);
        let mut scene = Scene::new(config, factory, Box::new(replicas)).unwrap();

        let sprite = scene.create_sprite(Vec3::zeros(), Some("red.png")).unwrap();
        scene.prepare_frame(&mut backend).unwrap();

        let handle = match scene.object(sprite).unwrap().kind() {
            ObjectKind::Sprite(s) => s.texture.as_ref().unwrap().gpu_handle(),
            _ => unreachable!(),
        };
        let table = backend.pool().texture_table();
        assert!(table.lookup(handle).is_some());
        let binding = scene.bindings().peek(BindingOwner::Object(sprite), 0).unwrap();
        let desc = backend.pool().describe(binding).unwrap();
        assert_eq!(desc.texture.unwrap().gpu_handle, handle);

        // The second reload pushes the original out of the retirement queue
        assert!(scene.reload_texture("red.png"));
        assert!(scene.reload_texture("red.png"));
        assert!(table.lookup(handle).is_none());
        assert_eq!(scene.assets().factory().uploads(), 3);
        assert_eq!(scene.assets().factory().resident_images(), 2);

        context.wait_idle().unwrap();
    }
}
