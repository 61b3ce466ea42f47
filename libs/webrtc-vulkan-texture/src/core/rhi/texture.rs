// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Backend-agnostic view of a texture the encoder can consume.

use std::ffi::c_void;
use std::ptr::NonNull;

use serde::{Deserialize, Serialize};

/// Raw native handles of an encodable texture.
///
/// Handles are carried as raw integers so consumers that speak the native
/// API through their own bindings can import them without sharing types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeTextureHandle {
    /// `VkImage` handle.
    pub image: u64,
    /// `VkDeviceMemory` handle backing the image.
    pub memory: u64,
    /// Size of the backing allocation in bytes.
    pub memory_size: u64,
}

/// Texture pixel formats supported by the RHI.
///
/// Platform backends map these to native format constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum TextureFormat {
    /// 8-bit RGBA, unsigned normalized.
    Rgba8Unorm = 0,
    /// 8-bit RGBA, sRGB.
    Rgba8UnormSrgb = 1,
    /// 8-bit BGRA, unsigned normalized. What hardware encoders take natively.
    #[default]
    Bgra8Unorm = 2,
    /// 8-bit BGRA, sRGB.
    Bgra8UnormSrgb = 3,
    /// 16-bit float RGBA.
    Rgba16Float = 4,
    /// 32-bit float RGBA.
    Rgba32Float = 5,
    /// NV12 YUV (for video decode).
    Nv12 = 6,
}

impl TextureFormat {
    /// Bytes per pixel for this format.
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            Self::Rgba8Unorm | Self::Rgba8UnormSrgb | Self::Bgra8Unorm | Self::Bgra8UnormSrgb => 4,
            Self::Rgba16Float => 8,
            Self::Rgba32Float => 16,
            Self::Nv12 => 1, // Planar format, varies per plane
        }
    }

    /// Whether this format has an sRGB transfer function.
    pub fn is_srgb(&self) -> bool {
        matches!(self, Self::Rgba8UnormSrgb | Self::Bgra8UnormSrgb)
    }

    /// Whether all pixel data lives in a single plane.
    pub fn is_single_plane(&self) -> bool {
        !matches!(self, Self::Nv12)
    }
}

/// A texture that can be handed to a video encoder.
///
/// The encoder only ever reads through this trait; it never mutates the
/// texture's state.
pub trait EncodableTexture {
    /// Texture width in pixels.
    fn width(&self) -> u32;

    /// Texture height in pixels.
    fn height(&self) -> u32;

    /// Pixel format the texture was created with.
    fn format(&self) -> TextureFormat;

    /// Native texture object, `None` while the texture is not initialized.
    fn native_texture_ptr(&self) -> Option<NonNull<c_void>>;

    /// Secondary encode-side view of the texture.
    ///
    /// Backends without such a view return `None`; callers then use
    /// [`native_texture_ptr`](Self::native_texture_ptr).
    fn encode_texture_ptr(&self) -> Option<NonNull<c_void>> {
        None
    }

    /// All native handles needed to import the texture elsewhere.
    fn native_handle(&self) -> Option<NativeTextureHandle>;
}
