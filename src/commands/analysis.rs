use crate::analysis::AnalysisResult;
use crate::export::{export_result, TextReportRenderer};
use crate::intake::SelectedFile;
use crate::lifecycle::AnalysisError;
use crate::AppState;
use std::path::{Path, PathBuf};

pub async fn analyze_image(state: &AppState, path: PathBuf) -> Result<AnalysisResult, String> {
    let file = SelectedFile::from_path(path)
        .await
        .map_err(|e| AnalysisError::from(e).user_message())?;

    state
        .analyzer()
        .analyze(file)
        .await
        .map_err(|e| e.user_message())
}

pub fn export_analysis(state: &AppState, id: &str, dir: &Path) -> Result<PathBuf, String> {
    let result = state
        .analyzer()
        .history()
        .into_iter()
        .find(|r| r.id() == id)
        .ok_or_else(|| format!("No analysis with id {}", id))?;

    export_result(&TextReportRenderer, &result, dir)
        .ok_or_else(|| "Export failed; see the log for details".to_string())
}
