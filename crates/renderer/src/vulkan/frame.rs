//! Per-slot command storage and the timeline fence.

use std::sync::Arc;

use ash::vk;

use triangle_core::{Error, Result};
use triangle_rhi::command::{CommandBuffer, CommandPool};
use triangle_rhi::device::Device;
use triangle_rhi::sync::TimelineSemaphore;

use super::rhi_error;
use crate::frame::CommandAllocator;
use crate::sync::TimelineFence;

/// A command pool with the one command buffer recorded from it.
pub struct VulkanAllocator {
    cmd: CommandBuffer,
    pool: CommandPool,
}

impl VulkanAllocator {
    /// # Errors
    ///
    /// Returns [`Error::Setup`] if the pool or its buffer can not be created.
    pub fn new(device: Arc<Device>) -> Result<Self> {
        let pool = CommandPool::new(device.clone(), device.graphics_family())
            .map_err(|e| rhi_error("Can not create command allocator", e, Error::Setup))?;
        let cmd = CommandBuffer::new(device, &pool)
            .map_err(|e| rhi_error("Can not create command list", e, Error::Setup))?;
        Ok(Self { cmd, pool })
    }

    #[inline]
    pub fn command_buffer(&self) -> &CommandBuffer {
        &self.cmd
    }
}

impl CommandAllocator for VulkanAllocator {
    fn reset(&mut self) -> Result<()> {
        self.pool
            .reset()
            .map_err(|e| rhi_error("Can not reset command allocator", e, Error::Recording))
    }
}

/// Timeline semaphore signaled from the graphics queue.
pub struct VulkanFence {
    semaphore: TimelineSemaphore,
    queue: vk::Queue,
}

impl VulkanFence {
    /// Creates the fence at value 0.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Setup`] if the semaphore can not be created.
    pub fn new(device: Arc<Device>) -> Result<Self> {
        let queue = device.graphics_queue();
        let semaphore = TimelineSemaphore::new(device, 0)
            .map_err(|e| rhi_error("Can not create fence", e, Error::Setup))?;
        Ok(Self { semaphore, queue })
    }
}

impl TimelineFence for VulkanFence {
    fn signal(&self, value: u64) -> Result<()> {
        self.semaphore
            .signal_on_queue(self.queue, value)
            .map_err(|e| Error::DeviceLost(format!("Can not signal fence {}: {}", value, e)))
    }

    fn completed_value(&self) -> Result<u64> {
        self.semaphore
            .value()
            .map_err(|e| Error::DeviceLost(format!("Can not read fence: {}", e)))
    }

    fn wait(&self, value: u64) -> Result<()> {
        self.semaphore
            .wait(value, u64::MAX)
            .map_err(|e| Error::DeviceLost(format!("Can not wait for fence {}: {}", value, e)))
    }
}
