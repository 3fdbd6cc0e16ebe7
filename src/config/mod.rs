// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Configuration management for SmartTrash

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main application configuration
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    /// Remote classification service
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Pre-upload compression
    #[serde(default)]
    pub compression: CompressionOptions,

    /// Local stand-in service settings
    #[serde(default)]
    pub mock: MockServiceConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ClassifierConfig {
    /// Full URL of the prediction endpoint, e.g. `http://backend:8000/predict`
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

/// Compression envelope applied before upload. Fixed per deployment.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CompressionOptions {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_max_size_bytes")]
    pub max_size_bytes: u64,
    #[serde(default = "default_max_dimension")]
    pub max_dimension_pixels: u32,
    #[serde(default = "default_true")]
    pub run_off_main_thread: bool,
    #[serde(default = "default_initial_quality")]
    pub initial_quality: u8,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MockServiceConfig {
    #[serde(default = "default_mock_host")]
    pub host: String,
    #[serde(default = "default_mock_port")]
    pub port: u16,
    /// Confidence reported for every accepted upload
    #[serde(default = "default_mock_confidence")]
    pub confidence: f64,
}

// Default value functions
fn default_endpoint() -> String { "http://localhost:8000/predict".to_string() }
fn default_true() -> bool { true }
fn default_max_size_bytes() -> u64 { 1024 * 1024 }
fn default_max_dimension() -> u32 { 1024 }
fn default_initial_quality() -> u8 { 85 }
fn default_mock_host() -> String { "127.0.0.1".to_string() }
fn default_mock_port() -> u16 { 8000 }
fn default_mock_confidence() -> f64 { 0.80 }

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
        }
    }
}

impl Default for CompressionOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            max_size_bytes: default_max_size_bytes(),
            max_dimension_pixels: default_max_dimension(),
            run_off_main_thread: true,
            initial_quality: default_initial_quality(),
        }
    }
}

impl Default for MockServiceConfig {
    fn default() -> Self {
        Self {
            host: default_mock_host(),
            port: default_mock_port(),
            confidence: default_mock_confidence(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = serde_json::from_str(&content)
                .map_err(|e| crate::SmartTrashError::Config(format!("Failed to parse config: {}", e)))?;
            config.validate()?;
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

    /// Reject values the client cannot work with
    pub fn validate(&self) -> crate::Result<()> {
        let endpoint = &self.classifier.endpoint;
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(crate::SmartTrashError::Config(format!(
                "classifier.endpoint must be an http(s) URL, got {:?}",
                endpoint
            )));
        }
        if self.compression.max_dimension_pixels == 0 || self.compression.max_size_bytes == 0 {
            return Err(crate::SmartTrashError::Config(
                "compression limits must be greater than zero".to_string(),
            ));
        }
        if !(1..=100).contains(&self.compression.initial_quality) {
            return Err(crate::SmartTrashError::Config(
                "compression.initial_quality must be between 1 and 100".to_string(),
            ));
        }
        Ok(())
    }
}
