// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Texture configuration via `encode_texture.yaml`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::rhi::TextureFormat;
use super::{Result, TextureError};

/// How encode textures are created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TextureConfig {
    /// Pixel format of every texture created with this config.
    pub format: TextureFormat,
    /// Chain external-memory export info (opaque fd) onto GPU-resident
    /// textures so the encoder can import the allocation.
    pub export_memory: bool,
    /// Add sampled usage to GPU-resident textures.
    pub sampled: bool,
    /// Create the per-texture fence in the signaled state, so the first
    /// wait before any submission returns immediately.
    pub fence_signaled: bool,
}

impl Default for TextureConfig {
    fn default() -> Self {
        Self {
            format: TextureFormat::Bgra8Unorm,
            export_memory: false,
            sampled: false,
            fence_signaled: true,
        }
    }
}

impl TextureConfig {
    /// Configuration file name.
    pub const FILE_NAME: &'static str = "encode_texture.yaml";

    /// Parse a configuration from YAML text.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| TextureError::Configuration(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a directory. Returns error if the file is
    /// missing or cannot be parsed.
    pub fn load(dir: &Path) -> Result<Self> {
        let config_path = dir.join(Self::FILE_NAME);

        let content = std::fs::read_to_string(&config_path).map_err(|e| {
            TextureError::Configuration(format!("Failed to read {}: {}", config_path.display(), e))
        })?;

        let config = Self::from_yaml_str(&content).map_err(|e| {
            TextureError::Configuration(format!("{}: {}", config_path.display(), e))
        })?;

        tracing::info!("Loaded texture config from {}", config_path.display());
        Ok(config)
    }

    /// Load configuration from a directory, returning defaults if the file
    /// is missing or unparseable.
    pub fn load_or_default(dir: &Path) -> Self {
        let config_path = dir.join(Self::FILE_NAME);

        if !config_path.exists() {
            tracing::debug!(
                "No {} found in {}, using defaults",
                Self::FILE_NAME,
                dir.display()
            );
            return Self::default();
        }

        match Self::load(dir) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("{}, using defaults", e);
                Self::default()
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if !self.format.is_single_plane() {
            return Err(TextureError::Configuration(format!(
                "{:?} is planar; encode textures need a single-plane format",
                self.format
            )));
        }
        Ok(())
    }
}
