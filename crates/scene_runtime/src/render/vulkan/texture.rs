//! Sampled images for object bindings

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use ash::vk;

use super::buffer::Buffer;
use super::context::VulkanContext;
use super::{find_memory_type, VulkanError, VulkanResult};

const FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;

/// RGBA8 image with its view and sampler, ready for shader reads
pub struct GpuImage {
    image: vk::Image,
    memory: vk::DeviceMemory,
    view: vk::ImageView,
    sampler: vk::Sampler,
    extent: vk::Extent2D,
    context: Arc<VulkanContext>,
}

impl GpuImage {
    /// Upload tightly packed RGBA8 pixels
    pub fn from_rgba(context: Arc<VulkanContext>, width: u32, height: u32, pixels: &[u8]) -> VulkanResult<Self> {
        let expected = width as usize * height as usize * 4;
        if width == 0 || height == 0 || pixels.len() != expected {
            return Err(VulkanError::InvalidOperation {
                reason: format!(
                    "{}x{} image needs {} bytes, got {}",
                    width,
                    height,
                    expected,
                    pixels.len()
                ),
            });
        }

        // Null handles are valid to destroy, so a partially built image cleans up on drop
        let mut gpu_image = Self {
            image: vk::Image::null(),
            memory: vk::DeviceMemory::null(),
            view: vk::ImageView::null(),
            sampler: vk::Sampler::null(),
            extent: vk::Extent2D { width, height },
            context,
        };
        gpu_image.create_image()?;
        gpu_image.upload(pixels)?;
        gpu_image.create_view_and_sampler()?;

        log::debug!("Created {}x{} GPU image", width, height);
        Ok(gpu_image)
    }

    /// 1x1 image of a single color
    pub fn solid_color(context: Arc<VulkanContext>, rgba: [u8; 4]) -> VulkanResult<Self> {
        Self::from_rgba(context, 1, 1, &rgba)
    }

    /// Image view handle
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    /// Sampler handle
    pub fn sampler(&self) -> vk::Sampler {
        self.sampler
    }

    /// Image size
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    fn create_image(&mut self) -> VulkanResult<()> {
        let device = self.context.device();
        let image_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width: self.extent.width,
                height: self.extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .format(FORMAT)
            .tiling(vk::ImageTiling::OPTIMAL)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .samples(vk::SampleCountFlags::TYPE_1);

        self.image = unsafe { device.create_image(&image_info, None) }.map_err(VulkanError::Api)?;

        let requirements = unsafe { device.get_image_memory_requirements(self.image) };
        let memory_type = find_memory_type(
            &self.context,
            requirements.memory_type_bits,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;
        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type);

        self.memory = unsafe { device.allocate_memory(&alloc_info, None) }.map_err(VulkanError::Api)?;
        unsafe { device.bind_image_memory(self.image, self.memory, 0) }.map_err(VulkanError::Api)
    }

    fn upload(&self, pixels: &[u8]) -> VulkanResult<()> {
        let mut staging = Buffer::new(
            Arc::clone(&self.context),
            pixels.len() as vk::DeviceSize,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        staging.map_persistent()?;
        staging.write(0, pixels)?;

        let image = self.image;
        let extent = self.extent;
        let source = staging.handle();

        self.context.one_time_submit(|device, command_buffer| unsafe {
            let to_transfer = layout_barrier(
                image,
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::AccessFlags::empty(),
                vk::AccessFlags::TRANSFER_WRITE,
            );
            device.cmd_pipeline_barrier(
                command_buffer,
                vk::PipelineStageFlags::TOP_OF_PIPE,
                vk::PipelineStageFlags::TRANSFER,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[to_transfer],
            );

            let region = vk::BufferImageCopy::builder()
                .image_subresource(vk::ImageSubresourceLayers {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    mip_level: 0,
                    base_array_layer: 0,
                    layer_count: 1,
                })
                .image_extent(vk::Extent3D {
                    width: extent.width,
                    height: extent.height,
                    depth: 1,
                })
                .build();
            device.cmd_copy_buffer_to_image(
                command_buffer,
                source,
                image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            );

            let to_shader = layout_barrier(
                image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                vk::AccessFlags::TRANSFER_WRITE,
                vk::AccessFlags::SHADER_READ,
            );
            device.cmd_pipeline_barrier(
                command_buffer,
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::FRAGMENT_SHADER,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[to_shader],
            );
        })
    }

    fn create_view_and_sampler(&mut self) -> VulkanResult<()> {
        let device = self.context.device();
        let view_info = vk::ImageViewCreateInfo::builder()
            .image(self.image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(FORMAT)
            .subresource_range(color_range());
        self.view = unsafe { device.create_image_view(&view_info, None) }.map_err(VulkanError::Api)?;

        let sampler_info = vk::SamplerCreateInfo::builder()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::REPEAT)
            .address_mode_v(vk::SamplerAddressMode::REPEAT)
            .address_mode_w(vk::SamplerAddressMode::REPEAT)
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
            .compare_op(vk::CompareOp::ALWAYS)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR);
        self.sampler = unsafe { device.create_sampler(&sampler_info, None) }.map_err(VulkanError::Api)?;
        Ok(())
    }
}

impl Drop for GpuImage {
    fn drop(&mut self) {
        let device = self.context.device();
        unsafe {
            device.destroy_sampler(self.sampler, None);
            device.destroy_image_view(self.view, None);
            device.destroy_image(self.image, None);
            device.free_memory(self.memory, None);
        }
    }
}

/// Uploaded textures by the opaque handle the asset factory gave them
///
/// Clones share one table: the uploader registers images and the binding
/// pool looks them up when writing descriptor sets.
#[derive(Debug, Clone, Default)]
pub struct TextureTable {
    entries: Arc<RwLock<HashMap<u64, (vk::ImageView, vk::Sampler)>>>,
}

impl TextureTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `gpu_handle` resolve to an uploaded image
    ///
    /// Existing bindings keep what they were written with until updated.
    pub fn register(&self, gpu_handle: u64, view: vk::ImageView, sampler: vk::Sampler) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(gpu_handle, (view, sampler));
    }

    /// Forget a texture handle
    pub fn unregister(&self, gpu_handle: u64) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(&gpu_handle).is_some()
    }

    /// View and sampler registered for a handle
    pub fn lookup(&self, gpu_handle: u64) -> Option<(vk::ImageView, vk::Sampler)> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(&gpu_handle).copied()
    }

    /// Registered handles
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn color_range() -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: 1,
    }
}

fn layout_barrier(
    image: vk::Image,
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
    src_access: vk::AccessFlags,
    dst_access: vk::AccessFlags,
) -> vk::ImageMemoryBarrier {
    vk::ImageMemoryBarrier::builder()
        .old_layout(old_layout)
        .new_layout(new_layout)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(color_range())
        .src_access_mask(src_access)
        .dst_access_mask(dst_access)
        .build()
}
