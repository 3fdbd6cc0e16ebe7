// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Classification service client

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::compressor::CompressedImage;
use crate::error::NetworkError;
use crate::{Result, SmartTrashError};

/// JSON body returned by the classification service.
///
/// Every field tolerates absence so that error payloads carrying only
/// `material`/`tip` still decode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResponsePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<String>,
    #[serde(default, rename = "bin", skip_serializing_if = "Option::is_none")]
    pub bin_label: Option<String>,
    /// Hex colour of the bin, e.g. `#f1c40f`
    #[serde(default, rename = "color", skip_serializing_if = "Option::is_none")]
    pub bin_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub error: bool,
}

/// Anything that can turn an image into a classification payload
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(
        &self,
        image: &CompressedImage,
    ) -> std::result::Result<ClassificationResponsePayload, NetworkError>;
}

/// HTTP client for the prediction endpoint
pub struct ClassificationClient {
    client: Client,
    endpoint: Url,
}

impl ClassificationClient {
    /// Create a client bound to a fixed endpoint
    pub fn new(endpoint: &str) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| SmartTrashError::Config(format!("Invalid classifier endpoint {:?}: {}", endpoint, e)))?;

        // No request timeout: an analysis either resolves or fails once
        let client = Client::builder()
            .build()
            .map_err(|e| SmartTrashError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }

    /// Check that the service answers on `/health`
    pub async fn health_check(&self) -> Result<()> {
        let url = self
            .endpoint
            .join("/health")
            .map_err(|e| SmartTrashError::Config(format!("Cannot derive health URL: {}", e)))?;

        let response = self
            .client
            .get(url)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| {
                SmartTrashError::ServiceUnavailable(format!(
                    "Cannot connect to classifier at {}: {}",
                    self.endpoint, e
                ))
            })?;

        if !response.status().is_success() {
            return Err(SmartTrashError::ServiceUnavailable(format!(
                "Health check returned status {}",
                response.status()
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl Classifier for ClassificationClient {
    async fn classify(
        &self,
        image: &CompressedImage,
    ) -> std::result::Result<ClassificationResponsePayload, NetworkError> {
        let part = Part::bytes(image.bytes.clone())
            .file_name(image.filename.clone())
            .mime_str(&image.mime_type)?;
        let form = Form::new().part("file", part);

        debug!(
            "Uploading {} ({} bytes) to {}",
            image.filename,
            image.bytes.len(),
            self.endpoint
        );

        let response = self
            .client
            .post(self.endpoint.clone())
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(NetworkError::new(format!(
                "Classifier returned status {}",
                response.status()
            )));
        }

        let payload: ClassificationResponsePayload = response.json().await?;
        debug!("Classifier payload: {:?}", payload);
        Ok(payload)
    }
}
