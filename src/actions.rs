use crate::analysis::{AnalysisResult, Severity};
use crate::classifier::{self, RemoteClassifier};
use crate::filters::ImageFilters;
use crate::history::HistoryCache;
use crate::intake::{self, PreviewRegistry, SelectedFile};
use crate::lifecycle::{AnalysisError, AnalysisLifecycle, AnalysisState, Ticket, Transition};
use log::{debug, info};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Drives intake, classification and the lifecycle for each picked image.
///
/// The lifecycle lock is only taken between awaits, so a newer call to
/// [`Analyzer::analyze`] can start while an older one is still waiting on the
/// network; the older one then completes as [`AnalysisError::Superseded`].
#[derive(Clone)]
pub struct Analyzer {
    lifecycle: Arc<Mutex<AnalysisLifecycle>>,
    classifier: Arc<dyn RemoteClassifier>,
    previews: PreviewRegistry,
    timeout: Duration,
}

impl Analyzer {
    pub fn new(history: HistoryCache, classifier: Arc<dyn RemoteClassifier>) -> Self {
        Self {
            lifecycle: Arc::new(Mutex::new(AnalysisLifecycle::new(history))),
            classifier,
            previews: PreviewRegistry::new(),
            timeout: classifier::DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn lock(&self) -> MutexGuard<'_, AnalysisLifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub async fn analyze(&self, file: SelectedFile) -> Result<AnalysisResult, AnalysisError> {
        info!(
            "Analyze requested: path={}, mime={}, size={}",
            file.path.display(),
            file.mime,
            file.size
        );

        if let Err(e) = intake::validate(&file) {
            let err = AnalysisError::from(e);
            self.lock().reject(&err);
            return Err(err);
        }

        let ticket = {
            let preview = self.previews.acquire(&file);
            self.lock().begin(preview)
        };

        let outcome = match intake::read_data_url(&file).await {
            Ok(data_url) => {
                match classifier::classify_image(self.classifier.as_ref(), &data_url, self.timeout)
                    .await
                {
                    Ok(level) => Ok((data_url, level)),
                    Err(e) => Err(AnalysisError::from(e)),
                }
            }
            Err(e) => Err(AnalysisError::from(e)),
        };

        // Success persists history through the store, which may block on disk.
        let lifecycle = Arc::clone(&self.lifecycle);
        let completion = tokio::task::spawn_blocking(move || {
            let mut lifecycle = lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
            complete(&mut lifecycle, ticket, outcome)
        });
        match completion.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => {
                debug!("Analysis completion was cancelled: {}", e);
                Err(AnalysisError::Superseded)
            }
        }
    }

    pub fn select_history(&self, id: &str) -> Option<AnalysisResult> {
        self.lock().select(id).cloned()
    }

    pub fn delete_history(&self, id: &str) -> bool {
        self.lock().delete(id)
    }

    pub fn history(&self) -> Vec<AnalysisResult> {
        self.lock().history().list().to_vec()
    }

    pub fn reset(&self) {
        self.lock().reset();
    }

    pub fn state(&self) -> AnalysisState {
        self.lock().state().clone()
    }

    pub fn preview_url(&self) -> Option<String> {
        self.lock().preview_url().map(str::to_string)
    }

    /// Adjusts the display filters of the image on screen.
    pub fn with_filters<R>(&self, f: impl FnOnce(&mut ImageFilters) -> R) -> R {
        f(self.lock().filters_mut())
    }

    pub fn previews(&self) -> &PreviewRegistry {
        &self.previews
    }
}

fn complete(
    lifecycle: &mut AnalysisLifecycle,
    ticket: Ticket,
    outcome: Result<(String, Severity), AnalysisError>,
) -> Result<AnalysisResult, AnalysisError> {
    match outcome {
        Ok((data_url, level)) => match lifecycle.succeed(ticket, data_url, level) {
            Transition::Applied => lifecycle
                .current_result()
                .cloned()
                .ok_or(AnalysisError::Superseded),
            Transition::Stale => Err(AnalysisError::Superseded),
        },
        Err(err) => match lifecycle.fail(ticket, &err) {
            Transition::Applied => Err(err),
            Transition::Stale => {
                debug!("Ignoring failure of superseded analysis: {}", err);
                Err(AnalysisError::Superseded)
            }
        },
    }
}
