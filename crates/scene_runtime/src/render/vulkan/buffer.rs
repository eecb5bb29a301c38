//! Buffer with its own memory allocation
//!
//! Host-visible buffers can be mapped once and kept mapped for their whole
//! lifetime, which is what the parameter replicas do.

use std::sync::Arc;

use ash::vk;

use super::context::VulkanContext;
use super::{find_memory_type, VulkanError, VulkanResult};

/// Buffer wrapper with memory management
pub struct Buffer {
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
    mapped: Option<*mut u8>,
    context: Arc<VulkanContext>,
}

// The mapped pointer is only dereferenced through `&mut self` or `&self`
// borrows of the owning buffer.
unsafe impl Send for Buffer {}
unsafe impl Sync for Buffer {}

impl Buffer {
    /// Create a new buffer with memory allocation
    pub fn new(
        context: Arc<VulkanContext>,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<Self> {
        let device = context.device();
        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.create_buffer(&buffer_info, None) }.map_err(VulkanError::Api)?;
        let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };

        let memory = find_memory_type(&context, requirements.memory_type_bits, properties).and_then(|index| {
            let alloc_info = vk::MemoryAllocateInfo::builder()
                .allocation_size(requirements.size)
                .memory_type_index(index);
            unsafe { device.allocate_memory(&alloc_info, None) }.map_err(VulkanError::Api)
        });
        let memory = match memory {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        if let Err(e) = unsafe { device.bind_buffer_memory(buffer, memory, 0) } {
            unsafe {
                device.destroy_buffer(buffer, None);
                device.free_memory(memory, None);
            }
            return Err(VulkanError::Api(e));
        }

        Ok(Self {
            buffer,
            memory,
            size,
            mapped: None,
            context,
        })
    }

    /// Map the whole buffer and keep it mapped until drop
    pub fn map_persistent(&mut self) -> VulkanResult<()> {
        if self.mapped.is_some() {
            return Ok(());
        }
        let ptr = unsafe {
            self.context
                .device()
                .map_memory(self.memory, 0, vk::WHOLE_SIZE, vk::MemoryMapFlags::empty())
        }
        .map_err(VulkanError::Api)?;
        self.mapped = Some(ptr.cast());
        Ok(())
    }

    /// Copy bytes into the mapped range
    pub fn write(&mut self, offset: usize, bytes: &[u8]) -> VulkanResult<()> {
        let ptr = self.mapped_range(offset, bytes.len())?;
        unsafe { std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr, bytes.len()) };
        Ok(())
    }

    /// Copy bytes out of the mapped range
    pub fn read(&self, offset: usize, len: usize) -> VulkanResult<Vec<u8>> {
        let ptr = self.mapped_range(offset, len)?;
        Ok(unsafe { std::slice::from_raw_parts(ptr, len) }.to_vec())
    }

    /// Flush the whole mapped range to the device
    pub fn flush(&self) -> VulkanResult<()> {
        let range = vk::MappedMemoryRange::builder()
            .memory(self.memory)
            .offset(0)
            .size(vk::WHOLE_SIZE)
            .build();
        unsafe { self.context.device().flush_mapped_memory_ranges(&[range]) }.map_err(VulkanError::Api)
    }

    /// Get buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Get size
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    fn mapped_range(&self, offset: usize, len: usize) -> VulkanResult<*mut u8> {
        let ptr = self.mapped.ok_or_else(|| VulkanError::InvalidOperation {
            reason: "buffer is not mapped".to_string(),
        })?;
        if (offset + len) as vk::DeviceSize > self.size {
            return Err(VulkanError::InvalidOperation {
                reason: format!("range {}..{} exceeds buffer size {}", offset, offset + len, self.size),
            });
        }
        Ok(unsafe { ptr.add(offset) })
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        let device = self.context.device();
        unsafe {
            if self.mapped.take().is_some() {
                device.unmap_memory(self.memory);
            }
            device.destroy_buffer(self.buffer, None);
            device.free_memory(self.memory, None);
        }
    }
}
