// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Session lifecycle: pick an image, analyze it, show the result, start over
//!
//! ```text
//! Idle ──select──▶ ImageSelected ──analyze──▶ Analyzing ──▶ ResultReady ──reset──▶ Idle
//! ```
//!
//! The controller is shared by reference. The state lock is never held
//! across an `.await`, so observers can read the state while an analysis is
//! in flight, and a second `analyze` is turned away instead of queued.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::client::{ClassificationClient, Classifier};
use crate::compressor::Compressor;
use crate::config::AppConfig;
use crate::image_source::{ImageSource, PickedFile, PreviewRegistry, SelectedImage};
use crate::interpreter::{interpret, AnalysisResult};
use crate::{Result, SmartTrashError};

/// Where the session is in its lifecycle
#[derive(Debug)]
pub enum SessionState {
    Idle,
    ImageSelected(SelectedImage),
    Analyzing {
        attempt: u64,
        image: SelectedImage,
    },
    ResultReady {
        image: SelectedImage,
        result: AnalysisResult,
        completed_at: DateTime<Utc>,
    },
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::ImageSelected(_) => "image selected",
            SessionState::Analyzing { .. } => "analyzing",
            SessionState::ResultReady { .. } => "showing a result",
        }
    }

    fn view(&self) -> SessionView {
        match self {
            SessionState::Idle => SessionView::Idle,
            SessionState::ImageSelected(image) => SessionView::ImageSelected {
                filename: image.filename().to_string(),
                preview_url: image.preview().url(),
            },
            SessionState::Analyzing { image, .. } => SessionView::Analyzing {
                filename: image.filename().to_string(),
                preview_url: image.preview().url(),
            },
            SessionState::ResultReady { image, result, completed_at } => SessionView::ResultReady {
                filename: image.filename().to_string(),
                result: result.clone(),
                completed_at: *completed_at,
            },
        }
    }
}

/// Snapshot of the session for the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionView {
    Idle,
    ImageSelected {
        filename: String,
        preview_url: String,
    },
    Analyzing {
        filename: String,
        preview_url: String,
    },
    ResultReady {
        filename: String,
        result: AnalysisResult,
        completed_at: DateTime<Utc>,
    },
}

impl SessionView {
    pub fn can_select(&self) -> bool {
        matches!(self, SessionView::Idle | SessionView::ImageSelected { .. })
    }

    pub fn can_analyze(&self) -> bool {
        matches!(self, SessionView::ImageSelected { .. })
    }

    pub fn can_reset(&self) -> bool {
        !matches!(self, SessionView::Analyzing { .. })
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        match self {
            SessionView::ResultReady { result, .. } => Some(result),
            _ => None,
        }
    }
}

/// What a `reset` request did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetOutcome {
    Reset,
    /// An analysis was in flight; the session was left alone
    IgnoredWhileAnalyzing,
}

/// Drives one image through compress, classify and interpret
pub struct SessionController {
    source: ImageSource,
    compressor: Compressor,
    classifier: Box<dyn Classifier>,
    state: Mutex<SessionState>,
    attempts: AtomicU64,
    updates: watch::Sender<SessionView>,
}

impl SessionController {
    pub fn new(source: ImageSource, compressor: Compressor, classifier: Box<dyn Classifier>) -> Self {
        let (updates, _) = watch::channel(SessionView::Idle);
        Self {
            source,
            compressor,
            classifier,
            state: Mutex::new(SessionState::Idle),
            attempts: AtomicU64::new(0),
            updates,
        }
    }

    /// Build a session talking to the configured HTTP endpoint
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let client = ClassificationClient::new(&config.classifier.endpoint)?;
        Ok(Self::new(
            ImageSource::new(),
            Compressor::new(config.compression.clone()),
            Box::new(client),
        ))
    }

    /// Receive a fresh [`SessionView`] on every transition
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.updates.subscribe()
    }

    pub fn view(&self) -> SessionView {
        self.updates.borrow().clone()
    }

    pub fn previews(&self) -> &PreviewRegistry {
        self.source.previews()
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, SessionState>> {
        self.state.lock().map_err(|_| SmartTrashError::SessionPoisoned)
    }

    fn publish(&self, state: &SessionState) {
        debug!("Session is now {}", state.name());
        self.updates.send_replace(state.view());
    }

    /// Pick a new image, replacing (and releasing) any current one
    pub fn select_image(&self, file: Option<PickedFile>) -> Result<()> {
        let mut state = self.lock_state()?;

        match &*state {
            SessionState::Idle | SessionState::ImageSelected(_) => {}
            SessionState::Analyzing { .. } => return Err(SmartTrashError::AnalysisInProgress),
            other => {
                return Err(SmartTrashError::IllegalTransition {
                    action: "select an image",
                    state: other.name(),
                })
            }
        }

        let image = self.source.select(file)?;
        info!("Selected {} ({} bytes)", image.filename(), image.bytes().len());
        *state = SessionState::ImageSelected(image);
        self.publish(&state);
        Ok(())
    }

    /// Run the analysis chain for the selected image.
    ///
    /// Network and service failures come back as [`AnalysisResult::Failure`];
    /// `Err` is reserved for requests the current state does not allow.
    pub async fn analyze(&self) -> Result<AnalysisResult> {
        let (attempt, image) = {
            let mut state = self.lock_state()?;
            let image = match &*state {
                SessionState::ImageSelected(image) => image.clone(),
                SessionState::Idle => {
                    warn!("Analyze requested with no image selected");
                    return Err(SmartTrashError::NoImageSelected);
                }
                SessionState::Analyzing { .. } => return Err(SmartTrashError::AnalysisInProgress),
                other => {
                    return Err(SmartTrashError::IllegalTransition {
                        action: "analyze",
                        state: other.name(),
                    })
                }
            };
            let attempt = self.attempts.fetch_add(1, Ordering::Relaxed) + 1;
            *state = SessionState::Analyzing {
                attempt,
                image: image.clone(),
            };
            self.publish(&state);
            (attempt, image)
        };

        let mut guard = AnalyzingGuard {
            session: self,
            attempt,
            settled: false,
        };

        info!("Analyzing {} (attempt {})", image.filename(), attempt);
        let upload = self.compressor.compress(&image).await;
        let result = match self.classifier.classify(&upload).await {
            Ok(payload) => interpret(&payload),
            Err(e) => {
                warn!("Classification request failed: {}", e);
                AnalysisResult::from_network_error(&e)
            }
        };
        info!("Result for {}: {}", image.filename(), result.headline());

        let mut state = self.lock_state()?;
        *state = SessionState::ResultReady {
            image,
            result: result.clone(),
            completed_at: Utc::now(),
        };
        guard.settled = true;
        self.publish(&state);

        Ok(result)
    }

    /// Return to `Idle`, discarding the image and any result.
    ///
    /// Ignored while an analysis is in flight.
    pub fn reset(&self) -> Result<ResetOutcome> {
        let mut state = self.lock_state()?;

        if let SessionState::Analyzing { attempt, .. } = &*state {
            info!("Reset ignored: attempt {} still in flight", attempt);
            return Ok(ResetOutcome::IgnoredWhileAnalyzing);
        }

        *state = SessionState::Idle;
        self.publish(&state);
        Ok(ResetOutcome::Reset)
    }
}

/// Puts the image back in `ImageSelected` if an analysis future is dropped
/// before it settles.
struct AnalyzingGuard<'a> {
    session: &'a SessionController,
    attempt: u64,
    settled: bool,
}

impl Drop for AnalyzingGuard<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        // Recover a poisoned lock so an abandoned attempt never stays Analyzing
        let mut state = self
            .session
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if matches!(&*state, SessionState::Analyzing { attempt, .. } if *attempt == self.attempt) {
            if let SessionState::Analyzing { image, .. } = std::mem::replace(&mut *state, SessionState::Idle) {
                warn!("Analysis of {} abandoned", image.filename());
                *state = SessionState::ImageSelected(image);
            }
            self.session.publish(&state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClassificationResponsePayload;
    use crate::compressor::{CompressedImage, CompressionOptions};
    use crate::error::NetworkError;
    use crate::interpreter::{FailureCause, CONNECTIVITY_MESSAGE};
    use async_trait::async_trait;
    use std::sync::Arc;
    use tokio::sync::Notify;

    /// Replies with a fixed outcome and records every upload
    struct ScriptedClassifier {
        reply: std::result::Result<ClassificationResponsePayload, NetworkError>,
        uploads: Arc<Mutex<Vec<CompressedImage>>>,
        gate: Option<Arc<Notify>>,
    }

    impl ScriptedClassifier {
        fn new(reply: std::result::Result<ClassificationResponsePayload, NetworkError>) -> Self {
            Self {
                reply,
                uploads: Arc::new(Mutex::new(Vec::new())),
                gate: None,
            }
        }
    }

    #[async_trait]
    impl Classifier for ScriptedClassifier {
        async fn classify(
            &self,
            image: &CompressedImage,
        ) -> std::result::Result<ClassificationResponsePayload, NetworkError> {
            self.uploads.lock().unwrap().push(image.clone());
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.reply.clone()
        }
    }

    fn plastic() -> ClassificationResponsePayload {
        ClassificationResponsePayload {
            material: Some("Plastic".to_string()),
            bin_label: Some("Yellow".to_string()),
            bin_color: Some("#f1c40f".to_string()),
            tip: Some("Flatten it".to_string()),
            confidence: Some(0.94),
            error: false,
        }
    }

    fn no_compression() -> Compressor {
        Compressor::new(CompressionOptions {
            enabled: false,
            ..CompressionOptions::default()
        })
    }

    fn session(classifier: ScriptedClassifier) -> SessionController {
        SessionController::new(ImageSource::new(), no_compression(), Box::new(classifier))
    }

    fn photo() -> Option<PickedFile> {
        Some(PickedFile::new("item.jpg", "image/jpeg", vec![0xFF, 0xD8, 0xFF, 0xE0, 1, 2, 3]))
    }

    #[tokio::test]
    async fn test_full_lifecycle() {
        let session = session(ScriptedClassifier::new(Ok(plastic())));
        assert_eq!(session.view(), SessionView::Idle);

        session.select_image(photo()).unwrap();
        assert!(session.view().can_analyze());

        let result = session.analyze().await.unwrap();
        assert!(matches!(result, AnalysisResult::Success { ref confidence_percent_text, .. } if confidence_percent_text == "94.0%"));
        assert_eq!(session.view().result(), Some(&result));

        assert_eq!(session.reset().unwrap(), ResetOutcome::Reset);
        assert_eq!(session.view(), SessionView::Idle);
        assert_eq!(session.previews().live_count(), 0);
    }

    #[tokio::test]
    async fn test_network_error_still_reaches_result() {
        let session = session(ScriptedClassifier::new(Err(NetworkError::new("connection refused"))));
        session.select_image(photo()).unwrap();

        let result = session.analyze().await.unwrap();
        assert_eq!(
            result,
            AnalysisResult::Failure {
                display_message: CONNECTIVITY_MESSAGE.to_string(),
                material: None,
                cause: FailureCause::NetworkError,
            }
        );
        assert!(matches!(session.view(), SessionView::ResultReady { .. }));
    }

    #[tokio::test]
    async fn test_analyze_without_image_is_refused() {
        let session = session(ScriptedClassifier::new(Ok(plastic())));
        let err = session.analyze().await.unwrap_err();
        assert!(matches!(err, SmartTrashError::NoImageSelected));
        assert_eq!(err.to_string(), "No file selected!");
        assert_eq!(session.view(), SessionView::Idle);
    }

    #[tokio::test]
    async fn test_reset_is_idempotent() {
        let session = session(ScriptedClassifier::new(Ok(plastic())));
        assert_eq!(session.reset().unwrap(), ResetOutcome::Reset);
        assert_eq!(session.view(), SessionView::Idle);
        assert_eq!(session.reset().unwrap(), ResetOutcome::Reset);
        assert_eq!(session.view(), SessionView::Idle);
    }

    #[tokio::test]
    async fn test_invalid_pick_keeps_current_image() {
        let session = session(ScriptedClassifier::new(Ok(plastic())));
        session.select_image(photo()).unwrap();

        let err = session
            .select_image(Some(PickedFile::new("doc.pdf", "application/pdf", vec![1])))
            .unwrap_err();
        assert!(matches!(err, SmartTrashError::InvalidFileKind(_)));
        assert!(matches!(session.view(), SessionView::ImageSelected { ref filename, .. } if filename == "item.jpg"));

        assert!(matches!(session.select_image(None), Err(SmartTrashError::InvalidFileKind(_))));
        assert_eq!(session.previews().live_count(), 1);
    }

    #[tokio::test]
    async fn test_malformed_image_type_never_reaches_upload() {
        let classifier = ScriptedClassifier::new(Ok(plastic()));
        let uploads = Arc::clone(&classifier.uploads);
        let session = session(classifier);

        let err = session
            .select_image(Some(PickedFile::new("photo.png", "image/", vec![1, 2, 3])))
            .unwrap_err();
        assert!(matches!(err, SmartTrashError::InvalidFileKind(_)));
        assert_eq!(session.view(), SessionView::Idle);
        assert!(matches!(session.analyze().await, Err(SmartTrashError::NoImageSelected)));
        assert!(uploads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reselect_releases_previous_preview() {
        let session = session(ScriptedClassifier::new(Ok(plastic())));
        session.select_image(photo()).unwrap();
        session
            .select_image(Some(PickedFile::new("other.png", "image/png", vec![9])))
            .unwrap();
        assert_eq!(session.previews().live_count(), 1);
    }

    #[tokio::test]
    async fn test_result_must_be_reset_before_new_pick() {
        let session = session(ScriptedClassifier::new(Ok(plastic())));
        session.select_image(photo()).unwrap();
        session.analyze().await.unwrap();

        assert!(matches!(
            session.select_image(photo()),
            Err(SmartTrashError::IllegalTransition { .. })
        ));
        assert!(matches!(
            session.analyze().await,
            Err(SmartTrashError::IllegalTransition { .. })
        ));
        assert!(matches!(session.view(), SessionView::ResultReady { .. }));
    }

    #[tokio::test]
    async fn test_failed_compression_uploads_original_bytes() {
        let classifier = ScriptedClassifier::new(Ok(plastic()));
        let uploads = Arc::clone(&classifier.uploads);
        let compressor = Compressor::new(CompressionOptions {
            max_size_bytes: 1,
            ..CompressionOptions::default()
        });
        let session = SessionController::new(ImageSource::new(), compressor, Box::new(classifier));

        let garbage = vec![0x42; 512];
        session
            .select_image(Some(PickedFile::new("odd.png", "image/png", garbage.clone())))
            .unwrap();
        session.analyze().await.unwrap();

        let uploads = uploads.lock().unwrap();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].bytes, garbage);
        assert_eq!(uploads[0].filename, "odd.png");
    }

    #[tokio::test]
    async fn test_in_flight_guard() {
        let gate = Arc::new(Notify::new());
        let mut classifier = ScriptedClassifier::new(Ok(plastic()));
        classifier.gate = Some(Arc::clone(&gate));
        let uploads = Arc::clone(&classifier.uploads);
        let session = session(classifier);
        session.select_image(photo()).unwrap();
        let mut updates = session.subscribe();

        let (first, ()) = tokio::join!(session.analyze(), async {
            updates
                .wait_for(|view| matches!(view, SessionView::Analyzing { .. }))
                .await
                .unwrap();
            assert!(!session.view().can_analyze());
            assert!(matches!(session.analyze().await, Err(SmartTrashError::AnalysisInProgress)));
            assert!(matches!(session.select_image(photo()), Err(SmartTrashError::AnalysisInProgress)));
            assert_eq!(session.reset().unwrap(), ResetOutcome::IgnoredWhileAnalyzing);
            gate.notify_one();
        });

        assert!(matches!(first.unwrap(), AnalysisResult::Success { .. }));
        assert_eq!(uploads.lock().unwrap().len(), 1);
        assert!(matches!(session.view(), SessionView::ResultReady { .. }));
    }

    #[test]
    fn test_dropped_analysis_returns_to_image_selected() {
        let gate = Arc::new(Notify::new());
        let mut classifier = ScriptedClassifier::new(Ok(plastic()));
        classifier.gate = Some(gate);
        let session = session(classifier);
        session.select_image(photo()).unwrap();

        {
            let mut task = tokio_test::task::spawn(session.analyze());
            tokio_test::assert_pending!(task.poll());
            assert!(matches!(session.view(), SessionView::Analyzing { .. }));
        }

        assert!(matches!(session.view(), SessionView::ImageSelected { .. }));
        assert!(session.view().can_analyze());
        assert_eq!(session.previews().live_count(), 1);
    }

    fn poison(session: &SessionController) {
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _state = session.state.lock().unwrap();
            panic!("panic while holding the session state");
        }));
        assert!(outcome.is_err());
    }

    #[tokio::test]
    async fn test_poisoned_lock_is_reported_as_such() {
        let session = session(ScriptedClassifier::new(Ok(plastic())));
        poison(&session);

        assert!(matches!(session.select_image(photo()), Err(SmartTrashError::SessionPoisoned)));
        assert!(matches!(session.analyze().await, Err(SmartTrashError::SessionPoisoned)));
        assert!(matches!(session.reset(), Err(SmartTrashError::SessionPoisoned)));
    }

    #[test]
    fn test_poisoned_lock_after_chain_leaves_image_selected() {
        let gate = Arc::new(Notify::new());
        let mut classifier = ScriptedClassifier::new(Ok(plastic()));
        classifier.gate = Some(Arc::clone(&gate));
        let session = session(classifier);
        session.select_image(photo()).unwrap();

        let mut task = tokio_test::task::spawn(session.analyze());
        tokio_test::assert_pending!(task.poll());
        poison(&session);

        gate.notify_one();
        let err = tokio_test::assert_ready_err!(task.poll());
        assert!(matches!(err, SmartTrashError::SessionPoisoned));
        drop(task);

        let state = session.state.lock().unwrap_or_else(PoisonError::into_inner);
        assert!(matches!(&*state, SessionState::ImageSelected(image) if image.filename() == "item.jpg"));
        drop(state);
        assert!(session.view().can_analyze());
    }

    #[test]
    fn test_poisoned_lock_while_abandoned_leaves_image_selected() {
        let gate = Arc::new(Notify::new());
        let mut classifier = ScriptedClassifier::new(Ok(plastic()));
        classifier.gate = Some(gate);
        let session = session(classifier);
        session.select_image(photo()).unwrap();

        {
            let mut task = tokio_test::task::spawn(session.analyze());
            tokio_test::assert_pending!(task.poll());
            poison(&session);
        }

        assert!(matches!(session.view(), SessionView::ImageSelected { .. }));
        assert_eq!(session.previews().live_count(), 1);
    }
}
