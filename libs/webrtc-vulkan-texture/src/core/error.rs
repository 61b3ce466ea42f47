// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use ash::vk;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TextureError {
    #[error("Out of device memory")]
    OutOfDeviceMemory,

    #[error("Out of host memory")]
    OutOfHostMemory,

    #[error("Unsupported texture format: {0}")]
    UnsupportedFormat(String),

    #[error("No memory type in {type_bits:#x} has properties {required:?}")]
    NoSuitableMemoryType {
        type_bits: u32,
        required: vk::MemoryPropertyFlags,
    },

    #[error("Invalid instance binding: {0}")]
    InvalidBinding(String),

    #[error("Vulkan device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("{operation} failed: {result}")]
    Vulkan {
        operation: &'static str,
        result: vk::Result,
    },

    #[error("Texture is not initialized")]
    NotInitialized,

    #[error("Texture is already initialized")]
    AlreadyInitialized,

    #[error("Texture was shut down; create a new texture instead of re-initializing")]
    ShutDown,

    #[error("Texture memory is not host visible")]
    NotHostVisible,

    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

impl TextureError {
    /// Classify a failed native call.
    ///
    /// Allocation failures and unsupported formats get their own kinds so
    /// callers can decide whether retrying with other parameters makes sense.
    pub fn vulkan(operation: &'static str, result: vk::Result) -> Self {
        match result {
            vk::Result::ERROR_OUT_OF_DEVICE_MEMORY => Self::OutOfDeviceMemory,
            vk::Result::ERROR_OUT_OF_HOST_MEMORY => Self::OutOfHostMemory,
            vk::Result::ERROR_FORMAT_NOT_SUPPORTED => {
                Self::UnsupportedFormat(format!("{operation} reported {result}"))
            }
            _ => Self::Vulkan { operation, result },
        }
    }

    /// Whether the failure came from running out of GPU or host memory.
    pub fn is_out_of_memory(&self) -> bool {
        matches!(self, Self::OutOfDeviceMemory | Self::OutOfHostMemory)
    }
}

pub type Result<T> = std::result::Result<T, TextureError>;
