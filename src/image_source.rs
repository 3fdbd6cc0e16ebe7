// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Image acquisition and preview handles
//!
//! A [`SelectedImage`] owns a [`PreviewHandle`] registered with the source's
//! [`PreviewRegistry`]. Dropping the image releases the handle, so replacing or
//! clearing a selection never leaks a preview.

use base64::{engine::general_purpose, Engine as _};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::debug;
use uuid::Uuid;

use crate::{Result, SmartTrashError};

/// A file handed over by the picker, before validation
#[derive(Debug, Clone)]
pub struct PickedFile {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl PickedFile {
    pub fn new(filename: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Read a file from disk, inferring its MIME type from the extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();
        let mime_type = image::ImageFormat::from_path(path)
            .map(|f| f.to_mime_type().to_string())
            .unwrap_or_else(|_| "application/octet-stream".to_string());

        Ok(Self { filename, mime_type, bytes })
    }
}

/// Tracks which preview handles are still alive
#[derive(Debug, Clone, Default)]
pub struct PreviewRegistry {
    live: Arc<Mutex<HashSet<Uuid>>>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&self, bytes: Arc<[u8]>, mime_type: &str) -> PreviewHandle {
        let id = Uuid::new_v4();
        if let Ok(mut live) = self.live.lock() {
            live.insert(id);
        }
        debug!("Allocated preview {}", id);
        PreviewHandle {
            id,
            bytes,
            mime_type: mime_type.to_string(),
            registry: self.clone(),
        }
    }

    fn release(&self, id: &Uuid) {
        if let Ok(mut live) = self.live.lock() {
            if live.remove(id) {
                debug!("Released preview {}", id);
            }
        }
    }

    /// Number of handles not yet released
    pub fn live_count(&self) -> usize {
        self.live.lock().map(|live| live.len()).unwrap_or(0)
    }

    pub fn is_live(&self, id: &Uuid) -> bool {
        self.live.lock().map(|live| live.contains(id)).unwrap_or(false)
    }
}

/// Renderable reference to a selected image. Released on drop.
#[derive(Debug)]
pub struct PreviewHandle {
    id: Uuid,
    bytes: Arc<[u8]>,
    mime_type: String,
    registry: PreviewRegistry,
}

impl PreviewHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Opaque identifier the presentation layer can key on
    pub fn url(&self) -> String {
        format!("preview://{}", self.id)
    }

    /// Inline `data:` URL for renderers that want the pixels
    pub fn data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime_type,
            general_purpose::STANDARD.encode(&self.bytes)
        )
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.registry.release(&self.id);
    }
}

/// The image currently chosen for analysis.
///
/// Clones share one preview; it is released when the last clone drops.
#[derive(Debug, Clone)]
pub struct SelectedImage {
    bytes: Arc<[u8]>,
    mime_type: String,
    filename: String,
    preview: Arc<PreviewHandle>,
}

impl SelectedImage {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Shared handle on the raw bytes, for handing to background work
    pub fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn preview(&self) -> &PreviewHandle {
        &self.preview
    }

    /// Discard this handle on the image; the preview goes with the last one
    pub fn clear(self) {
        drop(self);
    }
}

/// Turns picked files into [`SelectedImage`]s
#[derive(Debug, Clone, Default)]
pub struct ImageSource {
    previews: PreviewRegistry,
}

impl ImageSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate a picked file and allocate its preview
    pub fn select(&self, file: Option<PickedFile>) -> Result<SelectedImage> {
        let file = file.ok_or_else(|| SmartTrashError::InvalidFileKind("no file selected".to_string()))?;

        // Must survive the upload's multipart part, not just look like image/*
        let media_type: mime::Mime = file.mime_type.parse().map_err(|_| {
            SmartTrashError::InvalidFileKind(format!(
                "{} has a malformed type {:?}",
                file.filename, file.mime_type
            ))
        })?;
        if media_type.type_() != mime::IMAGE {
            return Err(SmartTrashError::InvalidFileKind(format!(
                "{} is {}, expected an image",
                file.filename, file.mime_type
            )));
        }

        let bytes: Arc<[u8]> = Arc::from(file.bytes);
        let preview = Arc::new(self.previews.allocate(Arc::clone(&bytes), &file.mime_type));

        Ok(SelectedImage {
            bytes,
            mime_type: file.mime_type,
            filename: file.filename,
            preview,
        })
    }

    /// Camera capture is not wired to any device
    pub fn capture(&self) -> Result<SelectedImage> {
        Err(SmartTrashError::InvalidFileKind(
            "camera capture is not available, pick a photo instead".to_string(),
        ))
    }

    pub fn previews(&self) -> &PreviewRegistry {
        &self.previews
    }
}
