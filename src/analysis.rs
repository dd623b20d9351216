//! Severity grades and the immutable record of one classification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Diabetic retinopathy stage, graded 0 through 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Severity {
    None,
    Mild,
    Moderate,
    Severe,
    Proliferative,
}

impl Severity {
    pub const ALL: [Severity; 5] = [
        Severity::None,
        Severity::Mild,
        Severity::Moderate,
        Severity::Severe,
        Severity::Proliferative,
    ];

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Severity::None),
            1 => Some(Severity::Mild),
            2 => Some(Severity::Moderate),
            3 => Some(Severity::Severe),
            4 => Some(Severity::Proliferative),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Severity::None => 0,
            Severity::Mild => 1,
            Severity::Moderate => 2,
            Severity::Severe => 3,
            Severity::Proliferative => 4,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Severity::None => "No diabetic retinopathy",
            Severity::Mild => "Mild nonproliferative diabetic retinopathy",
            Severity::Moderate => "Moderate nonproliferative diabetic retinopathy",
            Severity::Severe => "Severe nonproliferative diabetic retinopathy",
            Severity::Proliferative => "Proliferative diabetic retinopathy",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code(), self.description())
    }
}

impl From<Severity> for u8 {
    fn from(level: Severity) -> Self {
        level.code()
    }
}

impl TryFrom<u8> for Severity {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Severity::from_code(code).ok_or_else(|| format!("severity level {} is outside 0-4", code))
    }
}

/// One finished classification. Only [`AnalysisResult::new`] creates these,
/// so the description always matches the level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StoredResult")]
pub struct AnalysisResult {
    id: String,
    timestamp: DateTime<Utc>,
    image: String,
    level: Severity,
    description: String,
}

/// Persisted shape. The description is ignored on load and re-derived.
#[derive(Deserialize)]
struct StoredResult {
    id: String,
    timestamp: DateTime<Utc>,
    image: String,
    level: Severity,
    #[serde(default)]
    #[allow(dead_code)]
    description: Option<String>,
}

impl TryFrom<StoredResult> for AnalysisResult {
    type Error = String;

    fn try_from(stored: StoredResult) -> Result<Self, Self::Error> {
        if stored.id.trim().is_empty() {
            return Err("stored result has an empty id".to_string());
        }
        Ok(Self {
            id: stored.id,
            timestamp: stored.timestamp,
            image: stored.image,
            level: stored.level,
            description: stored.level.description().to_string(),
        })
    }
}

impl AnalysisResult {
    pub fn new(image: String, level: Severity) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            image,
            level,
            description: level.description().to_string(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn level(&self) -> Severity {
        self.level
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// MIME type embedded in the image data URL, if it has one.
    pub fn image_mime(&self) -> Option<&str> {
        self.image
            .strip_prefix("data:")
            .and_then(|rest| rest.split_once(';'))
            .map(|(mime, _)| mime)
    }
}
