// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Error types for SmartTrash

use thiserror::Error;

/// Result type alias for SmartTrash operations
pub type Result<T> = std::result::Result<T, SmartTrashError>;

/// SmartTrash error types
#[derive(Error, Debug)]
pub enum SmartTrashError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Compression error: {0}")]
    Compression(String),

    /// No file, or a file that is not an image, was picked
    #[error("Invalid file: {0}")]
    InvalidFileKind(String),

    /// `analyze` was requested before an image was selected
    #[error("No file selected!")]
    NoImageSelected,

    #[error("An analysis is already in progress")]
    AnalysisInProgress,

    /// A thread panicked while holding the session state
    #[error("Session state lock poisoned")]
    SessionPoisoned,

    #[error("Cannot {action} while {state}")]
    IllegalTransition {
        action: &'static str,
        state: &'static str,
    },

    #[error("Classification service not available: {0}")]
    ServiceUnavailable(String),

    #[error("Server error: {0}")]
    Server(String),
}

/// Transport failure, non-success status or undecodable body from the
/// classification service. The detail is for logs only.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Network error: {detail}")]
pub struct NetworkError {
    pub detail: String,
}

impl NetworkError {
    pub fn new<T: Into<String>>(detail: T) -> Self {
        Self { detail: detail.into() }
    }
}

impl From<reqwest::Error> for NetworkError {
    fn from(e: reqwest::Error) -> Self {
        Self::new(e.to_string())
    }
}
