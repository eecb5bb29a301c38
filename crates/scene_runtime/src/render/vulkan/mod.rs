//! Vulkan implementation of the backend traits
//!
//! A headless device is enough here: replicas are persistently mapped
//! host-visible storage buffers and bindings are descriptor sets pointing at
//! one replica plus one sampled image. Textures reach the device through
//! [`VulkanAssetFactory`]. Command submission and presentation are the
//! caller's business; [`VulkanBackend`] only collects draws.

pub mod asset_factory;
pub mod backend;
pub mod binding_pool;
pub mod buffer;
pub mod context;
pub mod descriptor_set;
pub mod replica_memory;
pub mod texture;

pub use asset_factory::VulkanAssetFactory;
pub use backend::VulkanBackend;
pub use binding_pool::VulkanBindingPool;
pub use buffer::Buffer;
pub use context::VulkanContext;
pub use descriptor_set::{DescriptorPool, DescriptorSetLayout, DescriptorSetLayoutBuilder, DescriptorSetWriter};
pub use replica_memory::VulkanReplicaMemory;
pub use texture::{GpuImage, TextureTable};

use ash::vk;
use thiserror::Error;

/// Vulkan-specific error types
#[derive(Error, Debug)]
pub enum VulkanError {
    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// Resource with specified handle could not be found
    #[error("Resource not found: {id}")]
    ResourceNotFound {
        /// Raw handle of the resource
        id: u64,
    },

    /// Invalid operation attempted
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// Description of why the operation is invalid
        reason: String,
    },

    /// Vulkan context initialization failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// No suitable memory type found for allocation
    #[error("No suitable memory type found")]
    NoSuitableMemoryType,
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;

/// Find a memory type index with the required properties
pub(crate) fn find_memory_type(
    context: &VulkanContext,
    type_filter: u32,
    properties: vk::MemoryPropertyFlags,
) -> VulkanResult<u32> {
    let memory_properties = unsafe {
        context
            .instance()
            .get_physical_device_memory_properties(context.physical_device())
    };

    (0..memory_properties.memory_type_count)
        .find(|&i| {
            (type_filter & (1 << i)) != 0
                && memory_properties.memory_types[i as usize]
                    .property_flags
                    .contains(properties)
        })
        .ok_or(VulkanError::NoSuitableMemoryType)
}
