// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Vulkan GPU backend.

pub mod rhi;

pub use rhi::{AshInstanceBinding, VulkanInstanceBinding, VulkanTexture2D};
