// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

#![no_main]

use libfuzzer_sys::fuzz_target;
use smarttrash::client::ClassificationResponsePayload;
use smarttrash::interpreter::{interpret, AnalysisResult};

fuzz_target!(|data: &[u8]| {
    if let Ok(payload) = serde_json::from_slice::<ClassificationResponsePayload>(data) {
        let result = interpret(&payload);
        if payload.error {
            assert!(matches!(result, AnalysisResult::Failure { .. }));
        }
    }
});
