//! Vulkan render backend
//!
//! Owns the binding pool and collects the draws frame preparation emits.
//! Recording them into command buffers belongs to the renderer driving the
//! swapchain, which also tells the backend when a frame was presented or the
//! surface was rebuilt.

use std::sync::Arc;

use super::binding_pool::VulkanBindingPool;
use super::context::VulkanContext;
use super::replica_memory::VulkanReplicaMemory;
use super::VulkanResult;
use crate::render::backend::{BindingPool, DrawCommand, RenderBackend, ReplicaMemory};

/// Backend over a headless Vulkan device
pub struct VulkanBackend {
    frame: usize,
    frames_in_flight: usize,
    pool: VulkanBindingPool,
    surface_recreated: bool,
    draws: Vec<DrawCommand>,
    context: Arc<VulkanContext>,
}

impl VulkanBackend {
    /// Create a backend rendering from `replicas` with room for `max_bindings`
    pub fn new(context: Arc<VulkanContext>, replicas: &VulkanReplicaMemory, max_bindings: usize) -> VulkanResult<Self> {
        let pool = VulkanBindingPool::new(Arc::clone(&context), replicas, max_bindings)?;
        log::info!(
            "Vulkan backend on {}: {} frames in flight, {} bindings",
            context.device_name(),
            replicas.replica_count(),
            max_bindings
        );

        Ok(Self {
            frame: 0,
            frames_in_flight: replicas.replica_count().max(1),
            pool,
            surface_recreated: false,
            draws: Vec::new(),
            context,
        })
    }

    /// Move to the next replica after a present
    pub fn advance_frame(&mut self) {
        self.frame = (self.frame + 1) % self.frames_in_flight;
    }

    /// Record that the swapchain was rebuilt
    pub fn signal_surface_recreated(&mut self) {
        self.surface_recreated = true;
    }

    /// Draws collected since the last take
    pub fn draws(&self) -> &[DrawCommand] {
        &self.draws
    }

    /// Take and clear the collected draws
    pub fn take_draws(&mut self) -> Vec<DrawCommand> {
        std::mem::take(&mut self.draws)
    }

    /// The concrete pool, for texture registration
    pub fn pool(&self) -> &VulkanBindingPool {
        &self.pool
    }

    /// Mutable access to the concrete pool
    pub fn pool_mut(&mut self) -> &mut VulkanBindingPool {
        &mut self.pool
    }

    /// Device context
    pub fn context(&self) -> &Arc<VulkanContext> {
        &self.context
    }
}

impl RenderBackend for VulkanBackend {
    fn current_frame(&self) -> usize {
        self.frame
    }

    fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }

    fn binding_pool(&mut self) -> &mut dyn BindingPool {
        &mut self.pool
    }

    fn take_surface_recreated(&mut self) -> bool {
        std::mem::take(&mut self.surface_recreated)
    }

    fn record_draw(&mut self, draw: &DrawCommand) {
        self.draws.push(draw.clone());
    }
}
