pub mod actions;
pub mod analysis;
pub mod classifier;
pub mod commands;
pub mod export;
pub mod filters;
pub mod history;
pub mod intake;
pub mod lifecycle;
pub mod logging;
pub mod settings;
pub mod store;
pub mod theme;

use actions::Analyzer;
use classifier::gemini::GeminiClassifier;
use classifier::{RemoteClassifier, Unconfigured};
use history::HistoryCache;
use log::{info, warn};
use settings::{load_or_create_app_settings, AppSettings};
use std::path::PathBuf;
use std::sync::Arc;
use store::{JsonFileStore, KeyValueStore};

/// Everything a front end needs: the persistent store and the analyzer.
pub struct AppState {
    store: Arc<dyn KeyValueStore>,
    analyzer: Analyzer,
}

impl AppState {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        let settings = load_or_create_app_settings(store.as_ref());
        let classifier = build_classifier(&settings);
        Self::with_classifier(store, classifier)
    }

    pub fn with_classifier(
        store: Arc<dyn KeyValueStore>,
        classifier: Arc<dyn RemoteClassifier>,
    ) -> Self {
        let settings = load_or_create_app_settings(store.as_ref());
        let history = HistoryCache::load(Arc::clone(&store));
        let analyzer =
            Analyzer::new(history, classifier).with_timeout(settings.request_timeout());
        Self { store, analyzer }
    }

    pub fn open(path: impl Into<PathBuf>) -> Self {
        let store = JsonFileStore::open(path);
        info!("Using store at {}", store.path().display());
        Self::new(Arc::new(store))
    }

    pub fn store(&self) -> &dyn KeyValueStore {
        self.store.as_ref()
    }

    pub fn analyzer(&self) -> &Analyzer {
        &self.analyzer
    }
}

pub fn build_classifier(settings: &AppSettings) -> Arc<dyn RemoteClassifier> {
    let Some(api_key) = settings.resolved_api_key() else {
        warn!(
            "No Gemini API key configured; set {} or run `config set-api-key`",
            settings::API_KEY_ENV
        );
        return Arc::new(Unconfigured::new("no Gemini API key set"));
    };

    match GeminiClassifier::new(&api_key, &settings.model) {
        Ok(classifier) => Arc::new(classifier),
        Err(e) => {
            warn!("Failed to create Gemini classifier: {}", e);
            Arc::new(Unconfigured::new(e.to_string()))
        }
    }
}
