use crate::analysis::AnalysisResult;
use crate::AppState;

pub fn get_history(state: &AppState) -> Vec<AnalysisResult> {
    state.analyzer().history()
}

pub fn select_history_entry(state: &AppState, id: &str) -> Result<AnalysisResult, String> {
    state
        .analyzer()
        .select_history(id)
        .ok_or_else(|| format!("No analysis with id {}", id))
}

pub fn delete_history_entry(state: &AppState, id: &str) -> Result<(), String> {
    if state.analyzer().delete_history(id) {
        Ok(())
    } else {
        Err(format!("No analysis with id {}", id))
    }
}
