pub mod gemini;

use crate::analysis::Severity;
use crate::intake::ACCEPTED_MIME_TYPES;
use futures_util::future::BoxFuture;
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub const CLASSIFICATION_PROMPT: &str = "You are grading a retinal fundus photograph for diabetic retinopathy. \
Classify the image on the international clinical scale: \
0 = no diabetic retinopathy, 1 = mild nonproliferative, 2 = moderate nonproliferative, \
3 = severe nonproliferative, 4 = proliferative. \
Respond with a single digit from 0 to 4 and nothing else.";

static DATA_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^data:([A-Za-z0-9.+-]+/[A-Za-z0-9.+-]+);base64,([A-Za-z0-9+/]+={0,2})$")
        .expect("data URL pattern is valid")
});

/// Failure signals reported by the remote model service.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RemoteServiceError {
    #[error("the API key was rejected")]
    Unauthenticated,
    #[error("the API key lacks permission for this model")]
    PermissionDenied,
    #[error("the API quota is exhausted")]
    QuotaExceeded,
    #[error("the image is too large for the service")]
    PayloadTooLarge,
    #[error("network error: {0}")]
    Network(String),
    #[error("service error ({status}): {message}")]
    Other { status: u16, message: String },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClassifierError {
    #[error("malformed image data: {0}")]
    Format(String),
    #[error("no response within {0:?}")]
    Timeout(Duration),
    #[error("unexpected classifier response: {0:?}")]
    InvalidResponse(String),
    #[error(transparent)]
    Remote(#[from] RemoteServiceError),
    #[error("classifier is not configured: {0}")]
    NotConfigured(String),
}

/// Image bytes as carried to the remote model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub mime_type: String,
    pub base64_data: String,
}

/// The opaque remote capability: instruction + image in, free text out.
pub trait RemoteClassifier: Send + Sync {
    fn classify<'a>(
        &'a self,
        instruction: &'a str,
        image: &'a ImagePayload,
    ) -> BoxFuture<'a, Result<String, ClassifierError>>;
}

/// Stand-in used when no API key is available; every call fails.
pub struct Unconfigured {
    reason: String,
}

impl Unconfigured {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl RemoteClassifier for Unconfigured {
    fn classify<'a>(
        &'a self,
        _instruction: &'a str,
        _image: &'a ImagePayload,
    ) -> BoxFuture<'a, Result<String, ClassifierError>> {
        let err = ClassifierError::NotConfigured(self.reason.clone());
        Box::pin(async move { Err(err) })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierModel {
    pub id: String,
    pub name: String,
    pub description: String,
}

pub fn parse_data_url(data_url: &str) -> Result<ImagePayload, ClassifierError> {
    let caps = DATA_URL_RE.captures(data_url).ok_or_else(|| {
        ClassifierError::Format("expected data:<mime>;base64,<payload>".to_string())
    })?;

    let mime_type = caps[1].to_string();
    if !ACCEPTED_MIME_TYPES.contains(&mime_type.as_str()) {
        return Err(ClassifierError::Format(format!(
            "unsupported image type {}",
            mime_type
        )));
    }

    Ok(ImagePayload {
        mime_type,
        base64_data: caps[2].to_string(),
    })
}

pub fn parse_severity(text: &str) -> Result<Severity, ClassifierError> {
    let trimmed = text.trim();
    trimmed
        .parse::<u8>()
        .ok()
        .and_then(Severity::from_code)
        .ok_or_else(|| ClassifierError::InvalidResponse(trimmed.to_string()))
}

/// Sends the image to `classifier` and waits at most `timeout` for the reply.
///
/// Whichever of the request and the timer settles first decides the outcome;
/// the other future is dropped and its eventual result never surfaces.
pub async fn classify_image(
    classifier: &dyn RemoteClassifier,
    data_url: &str,
    timeout: Duration,
) -> Result<Severity, ClassifierError> {
    let payload = parse_data_url(data_url)?;
    debug!(
        "Classifying {} image, {} base64 chars",
        payload.mime_type,
        payload.base64_data.len()
    );

    let text = tokio::select! {
        reply = classifier.classify(CLASSIFICATION_PROMPT, &payload) => reply?,
        _ = tokio::time::sleep(timeout) => {
            warn!("Classifier did not answer within {:?}", timeout);
            return Err(ClassifierError::Timeout(timeout));
        }
    };

    let level = parse_severity(&text)?;
    info!("Classifier graded image as level {}", level.code());
    Ok(level)
}
