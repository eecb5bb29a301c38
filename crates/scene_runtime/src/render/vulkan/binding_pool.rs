//! Descriptor-set backed binding pool
//!
//! Each binding is one descriptor set: the object's parameter block within
//! the replica's storage buffer at binding 0 and the object's texture at
//! binding 1. Textures are looked up by
//! the opaque handle the asset factory put on them in a [`TextureTable`]
//! shared with the uploader; unknown handles and untextured objects get a
//! white fallback image.

use std::collections::HashMap;
use std::sync::Arc;

use ash::vk::{self, Handle};

use super::context::VulkanContext;
use super::descriptor_set::{DescriptorPool, DescriptorSetLayout, DescriptorSetWriter};
use super::replica_memory::VulkanReplicaMemory;
use super::texture::{GpuImage, TextureTable};
use super::{VulkanError, VulkanResult};
use crate::render::backend::{BindingDesc, BindingHandle, BindingPool};
use crate::render::RenderError;

/// Binding pool over a fixed-size descriptor pool
pub struct VulkanBindingPool {
    live: HashMap<u64, BindingDesc>,
    textures: TextureTable,
    replica_buffers: Vec<vk::Buffer>,
    pool: DescriptorPool,
    layout: DescriptorSetLayout,
    fallback: GpuImage,
    context: Arc<VulkanContext>,
}

impl VulkanBindingPool {
    /// Create a pool of `capacity` bindings over `replicas`
    pub fn new(context: Arc<VulkanContext>, replicas: &VulkanReplicaMemory, capacity: usize) -> VulkanResult<Self> {
        let max_sets = u32::try_from(capacity).map_err(|_| VulkanError::InvalidOperation {
            reason: format!("binding capacity {} does not fit a descriptor pool", capacity),
        })?;

        let layout = DescriptorSetLayout::object_binding(Arc::clone(&context))?;
        let pool = DescriptorPool::new(Arc::clone(&context), max_sets)?;
        let fallback = GpuImage::solid_color(Arc::clone(&context), [255, 255, 255, 255])?;

        Ok(Self {
            live: HashMap::with_capacity(capacity),
            textures: TextureTable::new(),
            replica_buffers: replicas.buffer_handles(),
            pool,
            layout,
            fallback,
            context,
        })
    }

    /// Table the pool resolves texture handles through
    ///
    /// Hand a clone to [`VulkanAssetFactory`](super::VulkanAssetFactory) so
    /// its uploads become visible to new and updated bindings.
    pub fn texture_table(&self) -> TextureTable {
        self.textures.clone()
    }

    /// What a binding currently points at
    pub fn describe(&self, handle: BindingHandle) -> Option<&BindingDesc> {
        self.live.get(&handle.0)
    }

    /// Layout shared by every binding
    pub fn layout(&self) -> &DescriptorSetLayout {
        &self.layout
    }

    /// Descriptor set behind a binding handle
    pub fn descriptor_set(handle: BindingHandle) -> vk::DescriptorSet {
        vk::DescriptorSet::from_raw(handle.0)
    }

    fn replica_buffer(&self, replica: usize) -> Result<vk::Buffer, RenderError> {
        self.replica_buffers
            .get(replica)
            .copied()
            .ok_or(RenderError::ReplicaOutOfRange {
                replica,
                count: self.replica_buffers.len(),
            })
    }

    fn write(&self, set: vk::DescriptorSet, desc: &BindingDesc) -> Result<(), RenderError> {
        let buffer = self.replica_buffer(desc.replica)?;

        let (view, sampler) = desc
            .texture
            .and_then(|texture| self.textures.lookup(texture.gpu_handle))
            .unwrap_or((self.fallback.view(), self.fallback.sampler()));

        DescriptorSetWriter::new()
            .write_storage_buffer(set, 0, buffer, desc.param_offset, desc.param_size)
            .write_image(set, 1, view, sampler)
            .update(&self.context);
        Ok(())
    }
}

impl BindingPool for VulkanBindingPool {
    fn allocate(&mut self, desc: &BindingDesc) -> Result<BindingHandle, RenderError> {
        let capacity = self.capacity();
        if self.live.len() >= capacity {
            return Err(RenderError::PoolExhausted { capacity });
        }
        self.replica_buffer(desc.replica)?;

        let set = self.pool.allocate(self.layout.handle()).map_err(|e| match e {
            vk::Result::ERROR_OUT_OF_POOL_MEMORY | vk::Result::ERROR_FRAGMENTED_POOL => {
                RenderError::PoolExhausted { capacity }
            }
            other => RenderError::Vulkan(VulkanError::Api(other)),
        })?;
        self.write(set, desc)?;

        let handle = BindingHandle(set.as_raw());
        self.live.insert(handle.0, *desc);
        Ok(handle)
    }

    fn update(&mut self, handle: BindingHandle, desc: &BindingDesc) -> Result<(), RenderError> {
        if !self.live.contains_key(&handle.0) {
            return Err(RenderError::InvalidBinding(handle));
        }
        self.write(Self::descriptor_set(handle), desc)?;
        self.live.insert(handle.0, *desc);
        Ok(())
    }

    fn reset(&mut self) -> Result<(), RenderError> {
        self.pool.recreate()?;
        log::debug!("Binding pool reset, {} bindings dropped", self.live.len());
        self.live.clear();
        Ok(())
    }

    fn live_bindings(&self) -> usize {
        self.live.len()
    }

    fn capacity(&self) -> usize {
        self.pool.max_sets() as usize
    }
}
