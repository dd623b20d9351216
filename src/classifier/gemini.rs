use super::{ClassifierError, ClassifierModel, ImagePayload, RemoteClassifier, RemoteServiceError};
use futures_util::future::BoxFuture;
use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
// Transport ceiling only; the analysis timeout is enforced by `classify_image`.
const REQUEST_TIMEOUT_SECS: u64 = 60;

const API_KEY_HEADER: &str = "x-goog-api-key";

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiPart {
    Text { text: String },
    InlineData { inline_data: GeminiInlineData },
}

#[derive(Debug, Serialize)]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    error: Option<GeminiError>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiResponseContent,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
    status: Option<String>,
    #[allow(dead_code)]
    code: Option<i32>,
}

pub fn get_available_models() -> Vec<ClassifierModel> {
    vec![
        ClassifierModel {
            id: "gemini-2.0-flash".to_string(),
            name: "Gemini 2.0 Flash".to_string(),
            description: "Fast and capable - Recommended".to_string(),
        },
        ClassifierModel {
            id: "gemini-2.5-flash".to_string(),
            name: "Gemini 2.5 Flash".to_string(),
            description: "Improved visual reasoning".to_string(),
        },
        ClassifierModel {
            id: "gemini-2.5-pro".to_string(),
            name: "Gemini 2.5 Pro".to_string(),
            description: "Most accurate, higher latency".to_string(),
        },
        ClassifierModel {
            id: "gemini-1.5-flash".to_string(),
            name: "Gemini 1.5 Flash".to_string(),
            description: "Stable version".to_string(),
        },
    ]
}

pub struct GeminiClassifier {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    transport_timeout: Duration,
}

impl GeminiClassifier {
    pub fn new(api_key: &str, model: &str) -> Result<Self, ClassifierError> {
        if api_key.trim().is_empty() {
            return Err(ClassifierError::NotConfigured(
                "no Gemini API key set".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ClassifierError::NotConfigured(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.trim().to_string(),
            model: model.to_string(),
            base_url: GEMINI_API_URL.to_string(),
            transport_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        })
    }

    /// Points the client at another `.../models` root, e.g. a proxy.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_transport_timeout(mut self, timeout: Duration) -> Self {
        self.transport_timeout = timeout;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        instruction: &str,
        image: &ImagePayload,
    ) -> Result<String, ClassifierError> {
        info!(
            "Gemini classify: model={}, mime={}, payload_chars={}",
            self.model,
            image.mime_type,
            image.base64_data.len()
        );

        let request = build_request(instruction, image);
        let url = format!("{}/{}:generateContent", self.base_url, self.model);

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header(API_KEY_HEADER, &self.api_key)
            .timeout(self.transport_timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                let err = map_transport_error(e);
                error!("Gemini API request failed: {}", err);
                err
            })?;

        let status = response.status();
        let response_text = response.text().await.map_err(map_transport_error)?;

        debug!("Gemini API response status: {}", status);

        if !status.is_success() {
            error!(
                "Gemini API error: status={}, body={}",
                status, response_text
            );
            return Err(map_api_error(status.as_u16(), &response_text).into());
        }

        extract_text(&response_text)
    }
}

impl RemoteClassifier for GeminiClassifier {
    fn classify<'a>(
        &'a self,
        instruction: &'a str,
        image: &'a ImagePayload,
    ) -> BoxFuture<'a, Result<String, ClassifierError>> {
        Box::pin(self.generate(instruction, image))
    }
}

fn build_request(instruction: &str, image: &ImagePayload) -> GeminiRequest {
    GeminiRequest {
        contents: vec![GeminiContent {
            parts: vec![
                GeminiPart::Text {
                    text: instruction.to_string(),
                },
                GeminiPart::InlineData {
                    inline_data: GeminiInlineData {
                        mime_type: image.mime_type.clone(),
                        data: image.base64_data.clone(),
                    },
                },
            ],
        }],
    }
}

/// `Timeout` is reserved for the analysis race, so a transport timeout is a
/// network failure here.
fn map_transport_error(e: reqwest::Error) -> ClassifierError {
    let e = e.without_url();
    if e.is_timeout() || e.is_connect() || e.is_request() || e.is_body() {
        RemoteServiceError::Network(e.to_string()).into()
    } else {
        RemoteServiceError::Other {
            status: e.status().map(|s| s.as_u16()).unwrap_or(0),
            message: e.to_string(),
        }
        .into()
    }
}

/// Maps a non-success Gemini reply onto the error kinds shown to the user.
fn map_api_error(status: u16, body: &str) -> RemoteServiceError {
    let parsed = serde_json::from_str::<GeminiResponse>(body)
        .ok()
        .and_then(|r| r.error);

    let (api_status, message) = match parsed {
        Some(err) => (err.status, err.message),
        None => (None, body.to_string()),
    };
    let lower = message.to_lowercase();

    match (api_status.as_deref(), status) {
        (Some("UNAUTHENTICATED"), _) | (_, 401) => RemoteServiceError::Unauthenticated,
        (Some("INVALID_ARGUMENT"), _) if message.contains("API key") => {
            RemoteServiceError::Unauthenticated
        }
        (Some("PERMISSION_DENIED"), _) | (_, 403) => RemoteServiceError::PermissionDenied,
        (Some("RESOURCE_EXHAUSTED"), _) | (_, 429) => RemoteServiceError::QuotaExceeded,
        (_, 413) => RemoteServiceError::PayloadTooLarge,
        _ if lower.contains("too large") || lower.contains("size") => {
            RemoteServiceError::PayloadTooLarge
        }
        _ => RemoteServiceError::Other { status, message },
    }
}

fn extract_text(response_text: &str) -> Result<String, ClassifierError> {
    let gemini_response: GeminiResponse = serde_json::from_str(response_text)
        .map_err(|e| ClassifierError::InvalidResponse(format!("unparseable reply: {}", e)))?;

    if let Some(error) = gemini_response.error {
        return Err(RemoteServiceError::Other {
            status: 200,
            message: error.message,
        }
        .into());
    }

    let text = gemini_response
        .candidates
        .and_then(|c| c.into_iter().next())
        .and_then(|c| c.content.parts.into_iter().find_map(|p| p.text))
        .ok_or_else(|| ClassifierError::InvalidResponse("no text in reply".to_string()))?;

    debug!("Gemini reply: {:?}", text);
    Ok(text.trim().to_string())
}

pub async fn test_connection(api_key: &str) -> Result<bool, String> {
    test_connection_at(GEMINI_API_URL, api_key).await
}

async fn test_connection_at(base_url: &str, api_key: &str) -> Result<bool, String> {
    info!("Testing Gemini API connection");

    let url = format!("{}/{}:generateContent", base_url, DEFAULT_MODEL);

    let request = GeminiRequest {
        contents: vec![GeminiContent {
            parts: vec![GeminiPart::Text {
                text: "Say 'ok'".to_string(),
            }],
        }],
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| format!("Failed to create HTTP client: {}", e))?;

    let response = client
        .post(&url)
        .header("Content-Type", "application/json")
        .header(API_KEY_HEADER, api_key)
        .json(&request)
        .send()
        .await
        .map_err(|e| {
            let e = e.without_url();
            if e.is_timeout() {
                "Connection timeout".to_string()
            } else if e.is_connect() {
                "Network error - please check your connection".to_string()
            } else {
                format!("Connection failed: {}", e)
            }
        })?;

    let status = response.status();

    if status.is_success() {
        info!("Gemini API connection test successful");
        Ok(true)
    } else {
        let response_text = response.text().await.unwrap_or_default();
        error!(
            "Gemini API connection test failed: status={}, body={}",
            status, response_text
        );
        Err(map_api_error(status.as_u16(), &response_text).to_string())
    }
}
