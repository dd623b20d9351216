use crate::classifier::{gemini, ClassifierModel};
use crate::settings::{get_settings, write_settings};
use crate::AppState;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ClassifierConfig {
    pub model: String,
    pub request_timeout_secs: u64,
    pub api_key_set: bool,
}

pub fn get_classifier_models() -> Vec<ClassifierModel> {
    gemini::get_available_models()
}

pub async fn test_classifier_connection(state: &AppState) -> Result<bool, String> {
    let api_key = get_settings(state.store())
        .resolved_api_key()
        .ok_or_else(|| "No API key configured".to_string())?;
    gemini::test_connection(&api_key).await
}

pub fn set_classifier_api_key(state: &AppState, api_key: String) -> Result<(), String> {
    let mut settings = get_settings(state.store());
    let api_key = api_key.trim().to_string();
    settings.api_key = if api_key.is_empty() { None } else { Some(api_key) };
    write_settings(state.store(), &settings).map_err(|e| e.to_string())
}

pub fn set_classifier_model(state: &AppState, model_id: String) -> Result<(), String> {
    if model_id.trim().is_empty() {
        return Err("Model id cannot be empty".to_string());
    }
    let mut settings = get_settings(state.store());
    settings.model = model_id.trim().to_string();
    write_settings(state.store(), &settings).map_err(|e| e.to_string())
}

pub fn set_request_timeout(state: &AppState, secs: u64) -> Result<(), String> {
    if secs == 0 {
        return Err("Timeout must be at least one second".to_string());
    }
    let mut settings = get_settings(state.store());
    settings.request_timeout_secs = secs;
    write_settings(state.store(), &settings).map_err(|e| e.to_string())
}

pub fn get_classifier_config(state: &AppState) -> ClassifierConfig {
    let settings = get_settings(state.store());
    ClassifierConfig {
        api_key_set: settings.resolved_api_key().is_some(),
        model: settings.model,
        request_timeout_secs: settings.request_timeout_secs,
    }
}
