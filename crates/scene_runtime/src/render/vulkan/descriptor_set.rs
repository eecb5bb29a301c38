//! Descriptor set layouts, pools and writes
//!
//! Object bindings use one layout: a storage buffer with the replica's
//! parameter blocks at binding 0 and the object's texture at binding 1.

use std::sync::Arc;

use ash::vk;

use super::context::VulkanContext;
use super::{VulkanError, VulkanResult};

/// Descriptor set layout builder for creating reusable layouts
#[derive(Default)]
pub struct DescriptorSetLayoutBuilder {
    bindings: Vec<vk::DescriptorSetLayoutBinding>,
}

impl DescriptorSetLayoutBuilder {
    /// Create a new descriptor set layout builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a storage buffer binding
    pub fn add_storage_buffer(self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.add(binding, vk::DescriptorType::STORAGE_BUFFER, stage_flags)
    }

    /// Add a combined image sampler binding
    pub fn add_combined_image_sampler(self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.add(binding, vk::DescriptorType::COMBINED_IMAGE_SAMPLER, stage_flags)
    }

    /// Build the descriptor set layout
    pub fn build(self, context: Arc<VulkanContext>) -> VulkanResult<DescriptorSetLayout> {
        let layout_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&self.bindings);
        let layout = unsafe { context.device().create_descriptor_set_layout(&layout_info, None) }
            .map_err(VulkanError::Api)?;

        Ok(DescriptorSetLayout {
            layout,
            bindings: self.bindings,
            context,
        })
    }

    fn add(mut self, binding: u32, ty: vk::DescriptorType, stage_flags: vk::ShaderStageFlags) -> Self {
        self.bindings.push(
            vk::DescriptorSetLayoutBinding::builder()
                .binding(binding)
                .descriptor_type(ty)
                .descriptor_count(1)
                .stage_flags(stage_flags)
                .build(),
        );
        self
    }
}

/// Descriptor set layout wrapper with automatic cleanup
pub struct DescriptorSetLayout {
    layout: vk::DescriptorSetLayout,
    bindings: Vec<vk::DescriptorSetLayoutBinding>,
    context: Arc<VulkanContext>,
}

impl DescriptorSetLayout {
    /// Layout used by per-object bindings
    pub fn object_binding(context: Arc<VulkanContext>) -> VulkanResult<Self> {
        DescriptorSetLayoutBuilder::new()
            .add_storage_buffer(0, vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT)
            .add_combined_image_sampler(1, vk::ShaderStageFlags::FRAGMENT)
            .build(context)
    }

    /// Get the Vulkan descriptor set layout handle
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }

    /// Get the bindings used in this layout
    pub fn bindings(&self) -> &[vk::DescriptorSetLayoutBinding] {
        &self.bindings
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.context.device().destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

/// Descriptor pool sized for a fixed number of object bindings
pub struct DescriptorPool {
    pool: vk::DescriptorPool,
    max_sets: u32,
    context: Arc<VulkanContext>,
}

impl DescriptorPool {
    /// Create a pool holding `max_sets` sets of one buffer and one image each
    pub fn new(context: Arc<VulkanContext>, max_sets: u32) -> VulkanResult<Self> {
        let pool = Self::create(&context, max_sets)?;
        Ok(Self {
            pool,
            max_sets,
            context,
        })
    }

    /// Allocate one set with `layout`
    pub fn allocate(&self, layout: vk::DescriptorSetLayout) -> Result<vk::DescriptorSet, vk::Result> {
        let layouts = [layout];
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(self.pool)
            .set_layouts(&layouts);

        let sets = unsafe { self.context.device().allocate_descriptor_sets(&alloc_info) }?;
        sets.into_iter().next().ok_or(vk::Result::ERROR_UNKNOWN)
    }

    /// Destroy the pool and create an empty one of the same size
    ///
    /// Every set allocated from the old pool becomes invalid.
    pub fn recreate(&mut self) -> VulkanResult<()> {
        let pool = Self::create(&self.context, self.max_sets)?;
        unsafe { self.context.device().destroy_descriptor_pool(self.pool, None) };
        self.pool = pool;
        Ok(())
    }

    /// Maximum number of sets
    pub fn max_sets(&self) -> u32 {
        self.max_sets
    }

    /// Get the pool handle
    pub fn handle(&self) -> vk::DescriptorPool {
        self.pool
    }

    fn create(context: &VulkanContext, max_sets: u32) -> VulkanResult<vk::DescriptorPool> {
        let pool_sizes = [
            vk::DescriptorPoolSize::builder()
                .ty(vk::DescriptorType::STORAGE_BUFFER)
                .descriptor_count(max_sets)
                .build(),
            vk::DescriptorPoolSize::builder()
                .ty(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .descriptor_count(max_sets)
                .build(),
        ];

        let pool_info = vk::DescriptorPoolCreateInfo::builder()
            .max_sets(max_sets)
            .pool_sizes(&pool_sizes);

        unsafe { context.device().create_descriptor_pool(&pool_info, None) }.map_err(VulkanError::Api)
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe {
            self.context.device().destroy_descriptor_pool(self.pool, None);
        }
    }
}

enum PendingWrite {
    Buffer {
        set: vk::DescriptorSet,
        binding: u32,
        info: vk::DescriptorBufferInfo,
    },
    Image {
        set: vk::DescriptorSet,
        binding: u32,
        info: vk::DescriptorImageInfo,
    },
}

/// Batches descriptor writes into one update call
#[derive(Default)]
pub struct DescriptorSetWriter {
    pending: Vec<PendingWrite>,
}

impl DescriptorSetWriter {
    /// Create a new descriptor set writer
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a storage buffer range
    pub fn write_storage_buffer(
        mut self,
        set: vk::DescriptorSet,
        binding: u32,
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        range: vk::DeviceSize,
    ) -> Self {
        let info = vk::DescriptorBufferInfo {
            buffer,
            offset,
            range,
        };
        self.pending.push(PendingWrite::Buffer { set, binding, info });
        self
    }

    /// Write a combined image sampler in shader-read layout
    pub fn write_image(
        mut self,
        set: vk::DescriptorSet,
        binding: u32,
        image_view: vk::ImageView,
        sampler: vk::Sampler,
    ) -> Self {
        let info = vk::DescriptorImageInfo {
            sampler,
            image_view,
            image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        };
        self.pending.push(PendingWrite::Image { set, binding, info });
        self
    }

    /// Number of queued writes
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is queued
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Execute all write operations
    pub fn update(self, context: &VulkanContext) {
        let writes: Vec<vk::WriteDescriptorSet> = self
            .pending
            .iter()
            .map(|pending| match pending {
                PendingWrite::Buffer { set, binding, info } => vk::WriteDescriptorSet::builder()
                    .dst_set(*set)
                    .dst_binding(*binding)
                    .descriptor_type(vk::DescriptorType::STORAGE_BUFFER)
                    .buffer_info(std::slice::from_ref(info))
                    .build(),
                PendingWrite::Image { set, binding, info } => vk::WriteDescriptorSet::builder()
                    .dst_set(*set)
                    .dst_binding(*binding)
                    .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                    .image_info(std::slice::from_ref(info))
                    .build(),
            })
            .collect();

        unsafe {
            context.device().update_descriptor_sets(&writes, &[]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_queues_without_device() {
        let writer = DescriptorSetWriter::new()
            .write_storage_buffer(vk::DescriptorSet::null(), 0, vk::Buffer::null(), 0, vk::WHOLE_SIZE)
            .write_image(vk::DescriptorSet::null(), 1, vk::ImageView::null(), vk::Sampler::null());
        assert_eq!(writer.len(), 2);
        assert!(DescriptorSetWriter::new().is_empty());
    }

    #[test]
    #[ignore = "requires a Vulkan driver"]
    fn test_pool_exhaustion_is_reported() {
        let context = Arc::new(VulkanContext::new("descriptor_tests", false).unwrap());
        let layout = DescriptorSetLayout::object_binding(Arc::clone(&context)).unwrap();
        let mut pool = DescriptorPool::new(Arc::clone(&context), 1).unwrap();

        assert!(pool.allocate(layout.handle()).is_ok());
        assert!(pool.allocate(layout.handle()).is_err());

        pool.recreate().unwrap();
        assert!(pool.allocate(layout.handle()).is_ok());
    }
}
