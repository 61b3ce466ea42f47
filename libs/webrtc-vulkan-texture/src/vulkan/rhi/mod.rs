// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Vulkan RHI implementation.

mod vulkan_binding;
mod vulkan_command_pool;
mod vulkan_device;
mod vulkan_memory;
mod vulkan_sync;
mod vulkan_texture;

pub use vulkan_binding::{AshInstanceBinding, VulkanInstanceBinding};
pub use vulkan_command_pool::VulkanCommandPool;
pub use vulkan_device::VulkanDevice;
pub use vulkan_memory::{StagingMapping, StagingPolicy, find_memory_type_index};
#[cfg(not(feature = "frame-token-sync"))]
pub use vulkan_sync::FenceSync;
#[cfg(feature = "frame-token-sync")]
pub use vulkan_sync::FrameToken;
pub use vulkan_texture::{TextureState, VulkanTexture2D};
