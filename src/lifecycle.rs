//! The analysis state machine: `Idle -> Loading -> {Success, Error}`.
//!
//! Every attempt is stamped with a generation number. Completions carrying an
//! older generation than the lifecycle's current one are dropped, so a slow
//! request can never overwrite the outcome of a newer one.

use crate::analysis::{AnalysisResult, Severity};
use crate::classifier::{ClassifierError, RemoteServiceError};
use crate::filters::ImageFilters;
use crate::history::HistoryCache;
use crate::intake::{IntakeError, PreviewHandle, ValidationError};
use log::{debug, info, warn};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisState {
    Idle,
    Loading,
    Success(AnalysisResult),
    Error(String),
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Intake(#[from] IntakeError),
    #[error(transparent)]
    Classifier(#[from] ClassifierError),
    #[error("a newer analysis replaced this one")]
    Superseded,
}

impl AnalysisError {
    /// The single message shown to the user for this failure.
    pub fn user_message(&self) -> String {
        match self {
            AnalysisError::Intake(IntakeError::Validation(v)) => match v {
                ValidationError::NoFile => "Please select an image to analyze.".to_string(),
                ValidationError::MultipleFiles(_) => {
                    "Please select a single image.".to_string()
                }
                ValidationError::UnsupportedType(_) => {
                    "Please upload a JPEG or PNG image.".to_string()
                }
                ValidationError::TooLarge { .. } => {
                    "The image is too large. The maximum size is 4 MB.".to_string()
                }
                ValidationError::Empty => "The selected image is empty.".to_string(),
            },
            AnalysisError::Intake(IntakeError::Read { .. }) => {
                "The image could not be read. Please try another file.".to_string()
            }
            AnalysisError::Classifier(e) => match e {
                ClassifierError::Format(_) => {
                    "The image data is malformed. Please upload it again.".to_string()
                }
                ClassifierError::Timeout(_) => {
                    "The analysis timed out. Please try again.".to_string()
                }
                ClassifierError::InvalidResponse(_) => {
                    "The model returned an unexpected answer. Please try again.".to_string()
                }
                ClassifierError::NotConfigured(_) => {
                    "The classifier is not configured. Set an API key first.".to_string()
                }
                ClassifierError::Remote(remote) => match remote {
                    RemoteServiceError::Unauthenticated => {
                        "Invalid API key. Please check your configuration.".to_string()
                    }
                    RemoteServiceError::PermissionDenied => {
                        "The API key does not have access to this model.".to_string()
                    }
                    RemoteServiceError::QuotaExceeded => {
                        "API quota exceeded - please check your account.".to_string()
                    }
                    RemoteServiceError::PayloadTooLarge => {
                        "The image is too large for the analysis service.".to_string()
                    }
                    RemoteServiceError::Network(_) => {
                        "Network error - please check your connection.".to_string()
                    }
                    RemoteServiceError::Other { .. } => {
                        "The analysis service reported an error. Please try again.".to_string()
                    }
                },
            },
            AnalysisError::Superseded => "This analysis was replaced by a newer one.".to_string(),
        }
    }
}

/// Identifies one attempt started by [`AnalysisLifecycle::begin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Applied,
    Stale,
}

pub struct AnalysisLifecycle {
    state: AnalysisState,
    preview: Option<PreviewHandle>,
    filters: ImageFilters,
    generation: u64,
    history: HistoryCache,
}

impl AnalysisLifecycle {
    pub fn new(history: HistoryCache) -> Self {
        Self {
            state: AnalysisState::Idle,
            preview: None,
            filters: ImageFilters::default(),
            generation: 0,
            history,
        }
    }

    pub fn state(&self) -> &AnalysisState {
        &self.state
    }

    pub fn current_result(&self) -> Option<&AnalysisResult> {
        match &self.state {
            AnalysisState::Success(result) => Some(result),
            _ => None,
        }
    }

    pub fn preview_url(&self) -> Option<&str> {
        self.preview.as_ref().map(PreviewHandle::url)
    }

    pub fn filters(&self) -> &ImageFilters {
        &self.filters
    }

    pub fn filters_mut(&mut self) -> &mut ImageFilters {
        &mut self.filters
    }

    pub fn history(&self) -> &HistoryCache {
        &self.history
    }

    pub fn begin(&mut self, preview: PreviewHandle) -> Ticket {
        self.generation += 1;
        debug!("Starting analysis generation {}", self.generation);
        self.state = AnalysisState::Loading;
        // Replacing the handle releases the previous preview.
        self.preview = Some(preview);
        Ticket(self.generation)
    }

    fn is_current(&self, ticket: Ticket) -> bool {
        ticket.0 == self.generation && self.state == AnalysisState::Loading
    }

    pub fn succeed(&mut self, ticket: Ticket, image: String, level: Severity) -> Transition {
        if !self.is_current(ticket) {
            debug!(
                "Discarding stale result for generation {} (current {})",
                ticket.0, self.generation
            );
            return Transition::Stale;
        }

        let result = AnalysisResult::new(image, level);
        info!("Analysis {} finished with level {}", result.id(), level.code());
        self.history.add(result.clone());
        self.state = AnalysisState::Success(result);
        Transition::Applied
    }

    pub fn fail(&mut self, ticket: Ticket, error: &AnalysisError) -> Transition {
        if !self.is_current(ticket) {
            debug!(
                "Discarding stale failure for generation {}: {}",
                ticket.0, error
            );
            return Transition::Stale;
        }

        warn!("Analysis failed: {}", error);
        self.state = AnalysisState::Error(error.user_message());
        self.preview = None;
        Transition::Applied
    }

    /// Records a failure that happened before an attempt could start.
    pub fn reject(&mut self, error: &AnalysisError) {
        self.generation += 1;
        warn!("Rejected image: {}", error);
        self.state = AnalysisState::Error(error.user_message());
        self.preview = None;
    }

    pub fn reset(&mut self) {
        self.generation += 1;
        self.state = AnalysisState::Idle;
        self.preview = None;
        self.filters.reset();
    }

    /// Shows a stored result without contacting the classifier.
    pub fn select(&mut self, id: &str) -> Option<&AnalysisResult> {
        let result = self.history.get(id)?.clone();
        self.generation += 1;
        self.preview = None;
        self.filters.reset();
        self.state = AnalysisState::Success(result);
        self.current_result()
    }

    pub fn delete(&mut self, id: &str) -> bool {
        self.history.delete(id)
    }
}
