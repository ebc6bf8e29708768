// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Configuration management for Relabel

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main application configuration.
///
/// Passed explicitly into each component constructor; there is no
/// process-wide configuration state.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    /// Base directory for the tag catalog and thumbnail cache
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,

    /// Thumbnail cache settings
    #[serde(default)]
    pub thumbnails: ThumbnailOptions,

    /// Default tag vocabulary used when the catalog is missing or corrupt
    #[serde(default = "default_tags")]
    pub default_tags: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ThumbnailOptions {
    /// Maximum thumbnail dimension in pixels
    #[serde(default = "default_size")]
    pub size: u32,

    /// Background generation worker count
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// JPEG quality for normal thumbnails
    #[serde(default = "default_quality")]
    pub quality: u8,

    /// JPEG quality for error placeholders
    #[serde(default = "default_error_quality")]
    pub error_quality: u8,
}

// Default value functions
fn default_size() -> u32 { 150 }
fn default_workers() -> usize { 4 }
fn default_quality() -> u8 { 90 }
fn default_error_quality() -> u8 { 70 }

fn default_base_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".relabel")
}

fn default_tags() -> Vec<String> {
    crate::catalog::DEFAULT_TAGS
        .iter()
        .map(|t| t.to_string())
        .collect()
}

impl Default for ThumbnailOptions {
    fn default() -> Self {
        Self {
            size: default_size(),
            workers: default_workers(),
            quality: default_quality(),
            error_quality: default_error_quality(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            thumbnails: ThumbnailOptions::default(),
            default_tags: default_tags(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = serde_json::from_str(&content)
                .map_err(|e| crate::RelabelError::Config(format!("Failed to parse config: {}", e)))?;
            Ok(config)
        } else {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Directory holding the tag catalog file
    pub fn catalog_dir(&self) -> PathBuf {
        self.base_dir.clone()
    }

    /// Directory holding cached thumbnails
    pub fn cache_dir(&self) -> PathBuf {
        self.base_dir.join("cache").join("thumbnails")
    }
}
