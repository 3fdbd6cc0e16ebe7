// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Mapping of classifier payloads onto result tiers

use serde::{Deserialize, Serialize};

use crate::client::ClassificationResponsePayload;
use crate::error::NetworkError;

/// Below this confidence the user is asked to retake the photo
pub const LOW_CONFIDENCE_THRESHOLD: f64 = 0.60;

/// Shown for any transport or status failure
pub const CONNECTIVITY_MESSAGE: &str = "Could not connect to the classification server.";

/// Shown when the service flags an error without saying why
pub const UNRECOGNIZED_MESSAGE: &str = "The image could not be classified.";

/// Photographic-quality checklist for low-confidence results
pub const GUIDANCE_TIPS: [&str; 4] = [
    "Move closer to the object",
    "Use a neutral background (a white wall or a clean table)",
    "Avoid strong shadows or reflections",
    "When in doubt, check the packaging label",
];

const WARNING_COLOR: &str = "#e67e22";
const ERROR_COLOR: &str = "#e74c3c";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCause {
    NetworkError,
    ServerReportedError,
}

/// What the user is offered once a result is shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    AnalyzeAnother,
    RetakePhoto,
    TryAgain,
}

impl RecoveryAction {
    pub fn label(&self) -> &'static str {
        match self {
            RecoveryAction::AnalyzeAnother => "Analyze another",
            RecoveryAction::RetakePhoto => "Retake photo",
            RecoveryAction::TryAgain => "Try again",
        }
    }
}

/// Outcome of one completed analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tier", rename_all = "snake_case")]
pub enum AnalysisResult {
    Success {
        material: String,
        bin_label: String,
        bin_color: String,
        tip: String,
        confidence_percent_text: String,
    },
    LowConfidence {
        material: String,
        confidence_percent_text: String,
        guidance_tips: Vec<String>,
    },
    Failure {
        display_message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        material: Option<String>,
        cause: FailureCause,
    },
}

impl AnalysisResult {
    /// Wrap a failed request; the payload never reaches [`interpret`]
    pub fn from_network_error(_error: &NetworkError) -> Self {
        AnalysisResult::Failure {
            display_message: CONNECTIVITY_MESSAGE.to_string(),
            material: None,
            cause: FailureCause::NetworkError,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, AnalysisResult::Failure { .. })
    }

    pub fn headline(&self) -> &str {
        match self {
            AnalysisResult::Success { material, .. } => material,
            AnalysisResult::LowConfidence { .. } => "I'm not sure...",
            AnalysisResult::Failure { .. } => "Something went wrong",
        }
    }

    /// Colour the result card is drawn in
    pub fn accent_color(&self) -> &str {
        match self {
            AnalysisResult::Success { bin_color, .. } => bin_color,
            AnalysisResult::LowConfidence { .. } => WARNING_COLOR,
            AnalysisResult::Failure { .. } => ERROR_COLOR,
        }
    }

    pub fn recovery_action(&self) -> RecoveryAction {
        match self {
            AnalysisResult::Success { .. } => RecoveryAction::AnalyzeAnother,
            AnalysisResult::LowConfidence { .. } => RecoveryAction::RetakePhoto,
            AnalysisResult::Failure { .. } => RecoveryAction::TryAgain,
        }
    }
}

/// Classify a service payload into a result tier. First match wins:
/// explicit error flag, then low confidence, then success.
pub fn interpret(payload: &ClassificationResponsePayload) -> AnalysisResult {
    if payload.error {
        return AnalysisResult::Failure {
            display_message: payload
                .tip
                .clone()
                .unwrap_or_else(|| UNRECOGNIZED_MESSAGE.to_string()),
            material: payload.material.clone(),
            cause: FailureCause::ServerReportedError,
        };
    }

    // A missing or non-finite confidence counts as no confidence at all
    let confidence = payload.confidence.filter(|c| c.is_finite()).unwrap_or(0.0);
    let material = payload.material.clone().unwrap_or_default();

    if confidence < LOW_CONFIDENCE_THRESHOLD {
        return AnalysisResult::LowConfidence {
            material,
            confidence_percent_text: percent_text(confidence),
            guidance_tips: GUIDANCE_TIPS.iter().map(|t| t.to_string()).collect(),
        };
    }

    AnalysisResult::Success {
        material,
        bin_label: payload.bin_label.clone().unwrap_or_default(),
        bin_color: payload.bin_color.clone().unwrap_or_default(),
        tip: payload.tip.clone().unwrap_or_default(),
        confidence_percent_text: percent_text(confidence),
    }
}

/// One-decimal percentage. Exact ties round away from zero and a zero
/// percentage never carries a sign.
fn percent_text(confidence: f64) -> String {
    let percent = confidence * 100.0;
    if percent == 0.0 {
        return "0.0%".to_string();
    }

    // x.x5 ties are exactly the odd multiples of 0.25
    let quarters = percent * 4.0;
    if quarters.fract() == 0.0 && quarters % 2.0 != 0.0 {
        return format!("{:.1}%", (percent * 10.0).round() / 10.0);
    }

    format!("{:.1}%", percent)
}
