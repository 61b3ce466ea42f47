// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Vulkan textures for handing rendered frames to a video encoder.
//!
//! A [`VulkanTexture2D`] owns a `VkImage` and its memory, created either
//! device-local (read by the encoder directly) or as a linear host-visible
//! staging texture (CPU upload / readback). Synchronization with in-flight
//! GPU work is chosen at build time:
//!
//! - default: each texture owns a command buffer and a fence;
//! - `frame-token-sync` feature: each texture tracks a frame number instead.
//!
//! The device itself is never owned here. Hosts implement or construct a
//! [`VulkanInstanceBinding`] (usually [`AshInstanceBinding`]) and lend it to
//! every texture for the texture's whole lifetime.

pub mod core;
pub mod vulkan;

pub use crate::core::rhi::{EncodableTexture, NativeTextureHandle, TextureFormat};
pub use crate::core::{Result, TextureConfig, TextureError};
pub use vulkan::rhi::{
    AshInstanceBinding, StagingMapping, StagingPolicy, TextureState, VulkanCommandPool,
    VulkanDevice, VulkanInstanceBinding, VulkanTexture2D,
};
#[cfg(not(feature = "frame-token-sync"))]
pub use vulkan::rhi::FenceSync;
#[cfg(feature = "frame-token-sync")]
pub use vulkan::rhi::FrameToken;
