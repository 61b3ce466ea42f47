// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Owned command pool for running without a host renderer.

use ash::vk;

use crate::core::{Result, TextureError};

/// Vulkan command pool wrapper.
///
/// Textures only ever borrow the raw [`vk::CommandPool`]; drop every texture
/// that allocated from this pool before dropping the pool.
pub struct VulkanCommandPool {
    device: ash::Device,
    command_pool: vk::CommandPool,
}

impl VulkanCommandPool {
    /// Create a pool whose buffers can be reset individually.
    pub fn new(device: &ash::Device, queue_family_index: u32) -> Result<Self> {
        let pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family_index)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

        let command_pool = unsafe { device.create_command_pool(&pool_info, None) }
            .map_err(|e| TextureError::vulkan("vkCreateCommandPool", e))?;

        Ok(Self {
            device: device.clone(),
            command_pool,
        })
    }

    pub fn handle(&self) -> vk::CommandPool {
        self.command_pool
    }
}

impl Drop for VulkanCommandPool {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_command_pool(self.command_pool, None);
        }
    }
}
