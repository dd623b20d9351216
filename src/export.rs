//! Export of a result into a downloadable document.

use crate::analysis::AnalysisResult;
use chrono::NaiveDate;
use log::{error, info};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

pub trait DocumentRenderer {
    fn extension(&self) -> &'static str;
    fn render(&self, result: &AnalysisResult) -> anyhow::Result<Vec<u8>>;
}

/// Plain-text report, one field per line.
pub struct TextReportRenderer;

impl DocumentRenderer for TextReportRenderer {
    fn extension(&self) -> &'static str {
        "txt"
    }

    fn render(&self, result: &AnalysisResult) -> anyhow::Result<Vec<u8>> {
        let mut out = String::new();
        writeln!(out, "Diabetic Retinopathy Analysis Report")?;
        writeln!(out, "====================================")?;
        writeln!(out, "Analysis ID: {}", result.id())?;
        writeln!(
            out,
            "Date:        {}",
            result.timestamp().format("%Y-%m-%d %H:%M:%S UTC")
        )?;
        writeln!(out, "Level:       {}", result.level().code())?;
        writeln!(out, "Finding:     {}", result.description())?;
        writeln!(
            out,
            "Image:       {} ({} encoded bytes)",
            result.image_mime().unwrap_or("unknown"),
            result.image().len()
        )?;
        writeln!(out)?;
        writeln!(
            out,
            "This automated grading is not a medical diagnosis. Consult an eye-care professional."
        )?;
        Ok(out.into_bytes())
    }
}

pub fn export_filename(result: &AnalysisResult, date: NaiveDate, extension: &str) -> String {
    format!(
        "retinal-analysis-{}-{}.{}",
        date.format("%Y-%m-%d"),
        result.id(),
        extension
    )
}

/// Writes the rendered report into `dir`. Failures are logged and yield `None`.
pub fn export_result(
    renderer: &dyn DocumentRenderer,
    result: &AnalysisResult,
    dir: &Path,
) -> Option<PathBuf> {
    let file_name = export_filename(
        result,
        chrono::Local::now().date_naive(),
        renderer.extension(),
    );
    let path = dir.join(file_name);

    let bytes = match renderer.render(result) {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("Failed to render report for {}: {:#}", result.id(), e);
            return None;
        }
    };

    if let Err(e) = std::fs::write(&path, bytes) {
        error!("Failed to write report {}: {}", path.display(), e);
        return None;
    }

    info!("Exported analysis {} to {}", result.id(), path.display());
    Some(path)
}
