// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Local stand-in for the classification service
//!
//! Speaks the same wire contract as the real service. The bin is picked from
//! a hash of the uploaded bytes, so the same photo always lands in the same
//! bin.

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::client::ClassificationResponsePayload;
use crate::config::MockServiceConfig;

struct BinSpec {
    material: &'static str,
    bin: &'static str,
    color: &'static str,
    tip: &'static str,
}

static BINS: [BinSpec; 5] = [
    BinSpec { material: "Plastic", bin: "Yellow", color: "#f1c40f", tip: "Flatten it" },
    BinSpec { material: "Paper", bin: "Blue", color: "#3498db", tip: "No receipts in here" },
    BinSpec { material: "Glass", bin: "Green", color: "#2ecc71", tip: "Remove the cap" },
    BinSpec { material: "Organic", bin: "Brown", color: "#8d6e63", tip: "Use a compostable bag" },
    BinSpec { material: "Residual", bin: "Grey", color: "#7f8c8d", tip: "Only what cannot be recycled" },
];

const ACCEPTED_TYPES: [&str; 2] = ["image/jpeg", "image/png"];

struct MockState {
    confidence: f64,
}

/// Create the mock service router
pub fn create_router(config: &MockServiceConfig) -> Router {
    let state = Arc::new(MockState {
        confidence: config.confidence,
    });

    Router::new()
        .route("/health", get(health))
        .route("/predict", post(predict))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn predict(
    State(state): State<Arc<MockState>>,
    mut multipart: Multipart,
) -> Result<Json<ClassificationResponsePayload>, (StatusCode, String)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let content_type = field.content_type().map(str::to_string);
        let filename = field.file_name().unwrap_or("upload").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

        debug!("Received {} ({:?}, {} bytes)", filename, content_type, bytes.len());
        return Ok(Json(predict_bytes(content_type.as_deref(), &bytes, state.confidence)));
    }

    Err((StatusCode::UNPROCESSABLE_ENTITY, "missing `file` field".to_string()))
}

/// Deterministic prediction for an upload
pub fn predict_bytes(content_type: Option<&str>, bytes: &[u8], confidence: f64) -> ClassificationResponsePayload {
    if !content_type.is_some_and(|ct| ACCEPTED_TYPES.contains(&ct)) {
        return ClassificationResponsePayload {
            material: Some("Unrecognized".to_string()),
            tip: Some("Please upload a JPG or PNG".to_string()),
            error: true,
            ..Default::default()
        };
    }

    let hash = blake3::hash(bytes);
    let spec = &BINS[hash.as_bytes()[0] as usize % BINS.len()];

    ClassificationResponsePayload {
        material: Some(spec.material.to_string()),
        bin_label: Some(spec.bin.to_string()),
        bin_color: Some(spec.color.to_string()),
        tip: Some(spec.tip.to_string()),
        confidence: Some(confidence),
        error: false,
    }
}

/// Serve the mock on the configured address until the process exits
pub async fn start_server(config: MockServiceConfig) -> crate::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Mock classifier listening at http://{}/predict", addr);

    axum::serve(listener, create_router(&config))
        .await
        .map_err(|e| crate::SmartTrashError::Server(format!("Server error: {}", e)))?;

    Ok(())
}
