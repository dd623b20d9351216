use futures_util::future::BoxFuture;
use retiscan_app_lib::classifier::{ClassifierError, ImagePayload, RemoteClassifier};
use retiscan_app_lib::commands::{analysis, classifier, history, theme};
use retiscan_app_lib::store::{KeyValueStore, MemoryStore, DARK_MODE_KEY};
use retiscan_app_lib::AppState;
use std::sync::Arc;

struct AlwaysFour;

impl RemoteClassifier for AlwaysFour {
    fn classify<'a>(
        &'a self,
        _instruction: &'a str,
        _image: &'a ImagePayload,
    ) -> BoxFuture<'a, Result<String, ClassifierError>> {
        Box::pin(async { Ok("4\n".to_string()) })
    }
}

fn state() -> (Arc<MemoryStore>, AppState) {
    let store = Arc::new(MemoryStore::new());
    let state = AppState::with_classifier(store.clone(), Arc::new(AlwaysFour));
    (store, state)
}

#[tokio::test]
async fn analyze_list_export_delete() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("fundus.jpeg");
    std::fs::write(&image, b"\xff\xd8\xff\xe0").unwrap();
    let (_, state) = state();

    let result = analysis::analyze_image(&state, image).await.unwrap();
    assert_eq!(result.level().code(), 4);

    let listed = history::get_history(&state);
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id(), result.id());

    let report = analysis::export_analysis(&state, result.id(), dir.path()).unwrap();
    let name = report.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("retinal-analysis-"));
    assert!(name.ends_with(&format!("{}.txt", result.id())));

    assert_eq!(
        history::select_history_entry(&state, result.id()).unwrap(),
        result
    );
    history::delete_history_entry(&state, result.id()).unwrap();
    assert!(history::get_history(&state).is_empty());
    assert!(history::delete_history_entry(&state, result.id()).is_err());
    assert!(analysis::export_analysis(&state, result.id(), dir.path()).is_err());
}

#[tokio::test]
async fn missing_file_reports_read_failure() {
    let (_, state) = state();
    let err = analysis::analyze_image(&state, "/no/such/fundus.png".into())
        .await
        .unwrap_err();
    assert_eq!(err, "The image could not be read. Please try another file.");
}

#[test]
fn theme_flag_is_persisted() {
    let (store, state) = state();
    assert!(!theme::get_dark_mode(&state));
    theme::set_dark_mode(&state, true).unwrap();
    assert_eq!(store.get(DARK_MODE_KEY).as_deref(), Some("true"));
    assert!(!theme::toggle_dark_mode(&state).unwrap());
    assert!(!theme::get_dark_mode(&state));
}

#[test]
fn classifier_settings_round_trip() {
    let (_, state) = state();
    classifier::set_classifier_model(&state, "gemini-2.5-pro".into()).unwrap();
    classifier::set_request_timeout(&state, 12).unwrap();
    assert!(classifier::set_request_timeout(&state, 0).is_err());
    assert!(classifier::set_classifier_model(&state, " ".into()).is_err());

    let config = classifier::get_classifier_config(&state);
    assert_eq!(config.model, "gemini-2.5-pro");
    assert_eq!(config.request_timeout_secs, 12);

    assert!(classifier::get_classifier_models()
        .iter()
        .any(|m| m.id == "gemini-2.0-flash"));
}
