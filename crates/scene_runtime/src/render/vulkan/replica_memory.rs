//! Parameter replicas in host-visible storage buffers

use std::sync::Arc;

use ash::vk;

use super::buffer::Buffer;
use super::context::VulkanContext;
use super::VulkanResult;
use crate::config::RuntimeConfig;
use crate::render::backend::ReplicaMemory;
use crate::render::{ObjectParams, RenderError};

/// One persistently mapped storage buffer per frame in flight
pub struct VulkanReplicaMemory {
    buffers: Vec<Buffer>,
    size: usize,
    alignment: usize,
}

impl VulkanReplicaMemory {
    /// Allocate and map `count` buffers of `size` bytes
    pub fn new(context: Arc<VulkanContext>, count: usize, size: usize) -> VulkanResult<Self> {
        let alignment = Self::device_alignment(&context);
        let buffers = (0..count)
            .map(|_| {
                let mut buffer = Buffer::new(
                    Arc::clone(&context),
                    size as vk::DeviceSize,
                    vk::BufferUsageFlags::STORAGE_BUFFER,
                    vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
                )?;
                buffer.map_persistent()?;
                buffer.write(0, &vec![0; size])?;
                Ok(buffer)
            })
            .collect::<VulkanResult<Vec<_>>>()?;

        log::info!(
            "Allocated {} parameter replicas of {} bytes (record alignment {})",
            count,
            size,
            alignment
        );
        Ok(Self {
            buffers,
            size,
            alignment,
        })
    }

    /// Replicas sized for a scene built from `config`
    ///
    /// Each record is padded to the device's storage buffer offset alignment
    /// so every object's block can be bound as its own range.
    pub fn for_config(context: Arc<VulkanContext>, config: &RuntimeConfig) -> VulkanResult<Self> {
        let stride = ObjectParams::SIZE.next_multiple_of(Self::device_alignment(&context));
        Self::new(context, config.frames_in_flight, config.max_objects * stride)
    }

    fn device_alignment(context: &VulkanContext) -> usize {
        let alignment = context.properties().limits.min_storage_buffer_offset_alignment;
        usize::try_from(alignment).unwrap_or(1).max(1)
    }

    /// Buffer handle backing one replica
    pub fn buffer_handle(&self, replica: usize) -> Option<vk::Buffer> {
        self.buffers.get(replica).map(Buffer::handle)
    }

    /// Buffer handles of every replica, in replica order
    pub fn buffer_handles(&self) -> Vec<vk::Buffer> {
        self.buffers.iter().map(Buffer::handle).collect()
    }

    fn check(&self, replica: usize, offset: usize, len: usize) -> Result<&Buffer, RenderError> {
        let buffer = self.buffers.get(replica).ok_or(RenderError::ReplicaOutOfRange {
            replica,
            count: self.buffers.len(),
        })?;
        if offset + len > self.size {
            return Err(RenderError::OutOfBounds {
                offset,
                len,
                size: self.size,
            });
        }
        Ok(buffer)
    }
}

impl ReplicaMemory for VulkanReplicaMemory {
    fn replica_count(&self) -> usize {
        self.buffers.len()
    }

    fn replica_size(&self) -> usize {
        self.size
    }

    fn record_alignment(&self) -> usize {
        self.alignment
    }

    fn write(&mut self, replica: usize, offset: usize, bytes: &[u8]) -> Result<(), RenderError> {
        self.check(replica, offset, bytes.len())?;
        self.buffers[replica].write(offset, bytes)?;
        Ok(())
    }

    fn flush(&mut self, offset: usize, len: usize) -> Result<(), RenderError> {
        self.check(0, offset, len)?;
        // Coherent memory; the flush only orders host writes before submission
        for buffer in &self.buffers {
            buffer.flush()?;
        }
        Ok(())
    }

    fn read(&self, replica: usize, offset: usize, len: usize) -> Result<Vec<u8>, RenderError> {
        let buffer = self.check(replica, offset, len)?;
        Ok(buffer.read(offset, len)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore = "requires a Vulkan driver"]
    fn test_replicas_are_independent() {
        let context = Arc::new(VulkanContext::new("replica_tests", false).unwrap());
        let mut memory = VulkanReplicaMemory::new(context, 2, 64).unwrap();

        memory.write(1, 16, &[7; 8]).unwrap();
        memory.flush(16, 8).unwrap();
        assert_eq!(memory.read(1, 16, 8).unwrap(), vec![7; 8]);
        assert_eq!(memory.read(0, 16, 8).unwrap(), vec![0; 8]);
        assert!(matches!(
            memory.write(2, 0, &[1]),
            Err(RenderError::ReplicaOutOfRange { replica: 2, count: 2 })
        ));
        assert!(matches!(memory.read(0, 60, 8), Err(RenderError::OutOfBounds { .. })));
        assert!(memory.record_alignment().is_power_of_two());
    }
}
