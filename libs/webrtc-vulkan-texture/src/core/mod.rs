// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Backend-independent types: errors, configuration, and the RHI view.

pub mod config;
pub mod error;
pub mod rhi;

pub use config::TextureConfig;
pub use error::{Result, TextureError};
