// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Render Hardware Interface (RHI) - what the encoder sees of a texture.

mod texture;

pub use texture::{EncodableTexture, NativeTextureHandle, TextureFormat};
