// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Per-texture CPU/GPU synchronization.
//!
//! Exactly one variant is compiled in, chosen by the `frame-token-sync`
//! feature: a command buffer + fence pair owned by each texture (default),
//! or a frame counter with no GPU-side primitive.

#[cfg(not(feature = "frame-token-sync"))]
pub(crate) use fence::FenceSync as TextureSync;
#[cfg(not(feature = "frame-token-sync"))]
pub use fence::FenceSync;

#[cfg(feature = "frame-token-sync")]
pub(crate) use frame_token::FrameToken as TextureSync;
#[cfg(feature = "frame-token-sync")]
pub use frame_token::FrameToken;

#[cfg(not(feature = "frame-token-sync"))]
mod fence {
    use ash::vk;

    use crate::core::{Result, TextureError};
    use crate::vulkan::rhi::VulkanInstanceBinding;

    /// Command buffer and fence owned by one texture.
    ///
    /// The command pool is borrowed from the host; the buffer allocated from
    /// it and the fence belong to the texture and are released exactly once.
    #[derive(Debug, Default)]
    pub struct FenceSync {
        command_pool: vk::CommandPool,
        command_buffer: vk::CommandBuffer,
        fence: vk::Fence,
    }

    impl FenceSync {
        pub(crate) fn set_command_pool(&mut self, command_pool: vk::CommandPool) {
            self.command_pool = command_pool;
        }

        /// Allocate a fresh command buffer + fence, releasing any previous
        /// pair first. Either both are acquired or neither is kept.
        pub(crate) fn create<B: VulkanInstanceBinding>(
            &mut self,
            binding: &B,
            allocator: Option<&vk::AllocationCallbacks<'_>>,
            signaled: bool,
        ) -> Result<()> {
            if self.command_pool == vk::CommandPool::null() {
                return Err(TextureError::InvalidBinding(
                    "fence sync needs a command pool".into(),
                ));
            }

            self.release(binding, allocator);

            let command_buffer = binding
                .allocate_command_buffer(self.command_pool, vk::CommandBufferLevel::PRIMARY)
                .map_err(|e| TextureError::vulkan("vkAllocateCommandBuffers", e))?;

            let fence = match binding.create_fence(signaled, allocator) {
                Ok(fence) => fence,
                Err(e) => {
                    binding.free_command_buffer(self.command_pool, command_buffer);
                    return Err(TextureError::vulkan("vkCreateFence", e));
                }
            };

            self.command_buffer = command_buffer;
            self.fence = fence;
            Ok(())
        }

        /// Destroy the fence and return the command buffer to its pool.
        /// Null handles are skipped, so calling this repeatedly is harmless.
        pub(crate) fn release<B: VulkanInstanceBinding>(
            &mut self,
            binding: &B,
            allocator: Option<&vk::AllocationCallbacks<'_>>,
        ) {
            if self.fence != vk::Fence::null() {
                binding.destroy_fence(self.fence, allocator);
                self.fence = vk::Fence::null();
            }
            if self.command_buffer != vk::CommandBuffer::null() {
                binding.free_command_buffer(self.command_pool, self.command_buffer);
                self.command_buffer = vk::CommandBuffer::null();
            }
        }

        pub fn fence(&self) -> vk::Fence {
            self.fence
        }

        pub fn command_buffer(&self) -> vk::CommandBuffer {
            self.command_buffer
        }

        pub fn command_pool(&self) -> vk::CommandPool {
            self.command_pool
        }
    }
}

#[cfg(feature = "frame-token-sync")]
mod frame_token {
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Number of the last frame a texture was associated with.
    ///
    /// Bookkeeping only: it lives outside the texture's logical value and is
    /// updated through shared references.
    #[derive(Debug, Default)]
    pub struct FrameToken {
        current: AtomicU64,
    }

    impl FrameToken {
        pub fn get(&self) -> u64 {
            self.current.load(Ordering::Acquire)
        }

        pub fn set(&self, frame_number: u64) {
            self.current.store(frame_number, Ordering::Release);
        }

        /// Move to the next frame and return its number.
        pub fn advance(&self) -> u64 {
            self.current.fetch_add(1, Ordering::AcqRel) + 1
        }

        pub fn reset(&self) {
            self.current.store(0, Ordering::Release);
        }
    }

}
