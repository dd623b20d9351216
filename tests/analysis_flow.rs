use futures_util::future::BoxFuture;
use retiscan_app_lib::actions::Analyzer;
use retiscan_app_lib::analysis::Severity;
use retiscan_app_lib::classifier::{
    ClassifierError, ImagePayload, RemoteClassifier, RemoteServiceError, CLASSIFICATION_PROMPT,
};
use retiscan_app_lib::history::{HistoryCache, MAX_HISTORY_ENTRIES};
use retiscan_app_lib::intake::{
    IntakeError, SelectedFile, ValidationError, MAX_IMAGE_BYTES,
};
use retiscan_app_lib::lifecycle::{AnalysisError, AnalysisState};
use retiscan_app_lib::store::{JsonFileStore, KeyValueStore, MemoryStore};
use retiscan_app_lib::AppState;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Replies with a fixed text after an optional delay, counting calls.
struct FakeClassifier {
    reply: Result<String, ClassifierError>,
    delay: Duration,
    calls: AtomicUsize,
}

impl FakeClassifier {
    fn replying(text: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(text.to_string()),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        })
    }

    fn failing(err: ClassifierError) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(err),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        })
    }

    fn slow(text: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(text.to_string()),
            delay,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RemoteClassifier for FakeClassifier {
    fn classify<'a>(
        &'a self,
        instruction: &'a str,
        _image: &'a ImagePayload,
    ) -> BoxFuture<'a, Result<String, ClassifierError>> {
        Box::pin(async move {
            assert_eq!(instruction, CLASSIFICATION_PROMPT);
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.reply.clone()
        })
    }
}

fn analyzer_with(classifier: Arc<FakeClassifier>) -> Analyzer {
    let history = HistoryCache::load(Arc::new(MemoryStore::new()));
    Analyzer::new(history, classifier)
}

fn write_image(dir: &Path, name: &str, bytes: &[u8]) -> SelectedFile {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    SelectedFile {
        mime: retiscan_app_lib::intake::mime_for_path(&path).to_string(),
        size: bytes.len() as u64,
        path,
    }
}

#[tokio::test]
async fn level_two_reply_becomes_result_and_history() {
    let dir = tempfile::tempdir().unwrap();
    let classifier = FakeClassifier::replying("2");
    let analyzer = analyzer_with(classifier.clone());

    let file = write_image(dir.path(), "eye.png", b"\x89PNG fake");
    let result = analyzer.analyze(file).await.unwrap();

    assert_eq!(result.level(), Severity::Moderate);
    assert_eq!(result.description(), Severity::Moderate.description());
    assert!(result.image().starts_with("data:image/png;base64,"));
    assert_eq!(analyzer.state(), AnalysisState::Success(result.clone()));
    assert_eq!(analyzer.history(), vec![result]);
    assert_eq!(classifier.calls(), 1);
    // The preview belongs to the shown result until it is replaced or cleared.
    assert_eq!(analyzer.previews().live_count(), 1);
    assert!(analyzer.preview_url().unwrap().starts_with("blob:retiscan/"));

    analyzer.with_filters(|filters| filters.set_saturation(130));
    analyzer.reset();
    assert_eq!(analyzer.state(), AnalysisState::Idle);
    assert_eq!(analyzer.previews().live_count(), 0);
    assert!(analyzer.preview_url().is_none());
    assert!(analyzer.with_filters(|filters| filters.is_default()));
}

#[tokio::test]
async fn out_of_range_or_garbage_reply_adds_nothing() {
    let dir = tempfile::tempdir().unwrap();
    for reply in ["7", "abc"] {
        let analyzer = analyzer_with(FakeClassifier::replying(reply));
        let file = write_image(dir.path(), "eye.jpg", b"\xff\xd8\xff");

        let err = analyzer.analyze(file).await.unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::Classifier(ClassifierError::InvalidResponse(_))
        ));
        assert!(analyzer.history().is_empty());
        assert_eq!(analyzer.state(), AnalysisState::Error(err.user_message()));
        assert_eq!(analyzer.previews().live_count(), 0);
    }
}

#[tokio::test]
async fn gif_is_rejected_before_any_network_call() {
    let dir = tempfile::tempdir().unwrap();
    let classifier = FakeClassifier::replying("1");
    let analyzer = analyzer_with(classifier.clone());

    let file = write_image(dir.path(), "eye.gif", b"GIF89a");
    let err = analyzer.analyze(file).await.unwrap_err();

    assert!(matches!(
        err,
        AnalysisError::Intake(IntakeError::Validation(ValidationError::UnsupportedType(_)))
    ));
    assert_eq!(classifier.calls(), 0);
    assert!(matches!(analyzer.state(), AnalysisState::Error(_)));
    assert_eq!(analyzer.previews().live_count(), 0);
}

#[tokio::test]
async fn empty_file_fails_at_intake() {
    let dir = tempfile::tempdir().unwrap();
    let classifier = FakeClassifier::replying("1");
    let analyzer = analyzer_with(classifier.clone());

    let file = write_image(dir.path(), "eye.png", b"");
    let err = analyzer.analyze(file).await.unwrap_err();

    assert!(matches!(
        err,
        AnalysisError::Intake(IntakeError::Validation(ValidationError::Empty))
    ));
    assert_eq!(classifier.calls(), 0);
    assert_eq!(
        analyzer.state(),
        AnalysisState::Error("The selected image is empty.".to_string())
    );
}

#[tokio::test]
async fn size_boundary_is_checked_before_reading() {
    let classifier = FakeClassifier::replying("0");
    let analyzer = analyzer_with(classifier.clone());

    let oversized = SelectedFile {
        path: PathBuf::from("/not/read/eye.png"),
        mime: "image/png".into(),
        size: MAX_IMAGE_BYTES + 1,
    };
    assert!(matches!(
        analyzer.analyze(oversized).await,
        Err(AnalysisError::Intake(IntakeError::Validation(
            ValidationError::TooLarge { .. }
        )))
    ));
    assert_eq!(classifier.calls(), 0);

    let dir = tempfile::tempdir().unwrap();
    let exact = write_image(dir.path(), "big.png", &vec![0u8; MAX_IMAGE_BYTES as usize]);
    let result = analyzer.analyze(exact).await.unwrap();
    assert_eq!(result.level(), Severity::None);
}

#[tokio::test]
async fn timeout_fails_and_late_reply_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let classifier = FakeClassifier::slow("3", Duration::from_millis(400));
    let analyzer = analyzer_with(classifier.clone()).with_timeout(Duration::from_millis(50));

    let file = write_image(dir.path(), "eye.png", b"png");
    let err = analyzer.analyze(file).await.unwrap_err();
    assert!(matches!(
        err,
        AnalysisError::Classifier(ClassifierError::Timeout(_))
    ));
    let after_timeout = analyzer.state();

    // Give the abandoned reply time to arrive; nothing may change.
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(analyzer.state(), after_timeout);
    assert!(analyzer.history().is_empty());
}

#[tokio::test]
async fn remote_failures_map_to_distinct_messages() {
    let dir = tempfile::tempdir().unwrap();
    let kinds = [
        RemoteServiceError::Unauthenticated,
        RemoteServiceError::PermissionDenied,
        RemoteServiceError::QuotaExceeded,
        RemoteServiceError::Network("refused".into()),
    ];
    let mut messages = Vec::new();
    for kind in kinds {
        let analyzer = analyzer_with(FakeClassifier::failing(kind.into()));
        let file = write_image(dir.path(), "eye.png", b"png");
        let err = analyzer.analyze(file).await.unwrap_err();
        messages.push(err.user_message());
    }
    messages.sort();
    messages.dedup();
    assert_eq!(messages.len(), 4);
}

/// Blocks the first request until released; later requests answer at once.
struct GatedClassifier {
    started: Notify,
    release: Notify,
    calls: AtomicUsize,
}

impl RemoteClassifier for GatedClassifier {
    fn classify<'a>(
        &'a self,
        _instruction: &'a str,
        image: &'a ImagePayload,
    ) -> BoxFuture<'a, Result<String, ClassifierError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            // "c2xvdw==" is base64 for "slow".
            if image.base64_data == "c2xvdw==" {
                self.started.notify_one();
                self.release.notified().await;
                Ok("4".to_string())
            } else {
                Ok("1".to_string())
            }
        })
    }
}

#[tokio::test]
async fn superseded_request_cannot_overwrite_newer_result() {
    let dir = tempfile::tempdir().unwrap();
    let classifier = Arc::new(GatedClassifier {
        started: Notify::new(),
        release: Notify::new(),
        calls: AtomicUsize::new(0),
    });
    let history = HistoryCache::load(Arc::new(MemoryStore::new()));
    let analyzer = Analyzer::new(history, classifier.clone());

    let slow = write_image(dir.path(), "slow.png", b"slow");
    let fast = write_image(dir.path(), "fast.png", b"fast");

    let first = analyzer.analyze(slow);
    let second = async {
        classifier.started.notified().await;
        let result = analyzer.analyze(fast).await;
        classifier.release.notify_one();
        result
    };
    let (first, second) = tokio::join!(first, second);

    assert!(matches!(first, Err(AnalysisError::Superseded)));
    let second = second.unwrap();
    assert_eq!(second.level(), Severity::Mild);
    assert_eq!(analyzer.state(), AnalysisState::Success(second.clone()));
    assert_eq!(analyzer.history(), vec![second]);
    assert_eq!(classifier.calls.load(Ordering::SeqCst), 2);
    assert_eq!(analyzer.previews().live_count(), 1);
}

#[tokio::test]
async fn selecting_history_skips_the_network() {
    let dir = tempfile::tempdir().unwrap();
    let classifier = FakeClassifier::replying("3");
    let analyzer = analyzer_with(classifier.clone());

    let stored = analyzer
        .analyze(write_image(dir.path(), "eye.png", b"png"))
        .await
        .unwrap();
    analyzer.reset();
    assert_eq!(classifier.calls(), 1);

    let selected = analyzer.select_history(stored.id()).unwrap();
    assert_eq!(selected, stored);
    assert_eq!(analyzer.state(), AnalysisState::Success(stored.clone()));
    assert_eq!(classifier.calls(), 1);

    // Same entry twice yields the same state.
    analyzer.select_history(stored.id()).unwrap();
    assert_eq!(analyzer.state(), AnalysisState::Success(stored));
    assert_eq!(classifier.calls(), 1);
}

#[tokio::test]
async fn history_is_capped_and_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("store.json");
    let classifier = FakeClassifier::replying("0");

    let state = AppState::with_classifier(
        Arc::new(JsonFileStore::open(&store_path)),
        classifier.clone(),
    );
    let mut ids = Vec::new();
    for i in 0..=MAX_HISTORY_ENTRIES {
        let file = write_image(dir.path(), &format!("eye{i}.png"), b"png");
        ids.push(state.analyzer().analyze(file).await.unwrap().id().to_string());
    }
    assert_eq!(state.analyzer().history().len(), MAX_HISTORY_ENTRIES);
    drop(state);

    let reopened = JsonFileStore::open(&store_path);
    assert!(reopened.get("analysisHistory").is_some());
    let state = AppState::with_classifier(Arc::new(reopened), classifier);
    let restored: Vec<String> = state
        .analyzer()
        .history()
        .iter()
        .map(|r| r.id().to_string())
        .collect();

    let mut expected: Vec<String> = ids[1..].to_vec();
    expected.reverse();
    assert_eq!(restored, expected);
}
