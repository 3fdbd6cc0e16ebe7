// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! SmartTrash: which bin does this go in?
//!
//! Client side of a waste classification workflow. A photo is selected,
//! optionally compressed, uploaded once to a classification service, and the
//! answer is sorted into a confident match, a low-confidence match, or a
//! failure, each with its own guidance.

pub mod client;
pub mod compressor;
pub mod config;
pub mod error;
pub mod image_source;
pub mod interpreter;
pub mod mock_service;
pub mod session;

pub use config::AppConfig;
pub use error::{NetworkError, Result, SmartTrashError};
pub use interpreter::AnalysisResult;
pub use session::{SessionController, SessionView};
