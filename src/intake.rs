//! Image intake: validation of a picked file, data-URL encoding, and the
//! temporary preview handles shown while an analysis runs.

use base64::{engine::general_purpose::STANDARD, Engine};
use log::{debug, warn};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

pub const MAX_IMAGE_BYTES: u64 = 4 * 1024 * 1024;
pub const ACCEPTED_MIME_TYPES: [&str; 2] = ["image/jpeg", "image/png"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("no file was selected")]
    NoFile,
    #[error("only one image can be analyzed at a time ({0} selected)")]
    MultipleFiles(usize),
    #[error("unsupported file type {0}; expected image/jpeg or image/png")]
    UnsupportedType(String),
    #[error("image is {size} bytes; the limit is {limit} bytes")]
    TooLarge { size: u64, limit: u64 },
    #[error("image file is empty")]
    Empty,
}

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub path: PathBuf,
    pub mime: String,
    pub size: u64,
}

impl SelectedFile {
    pub async fn from_path(path: impl Into<PathBuf>) -> Result<Self, IntakeError> {
        let path = path.into();
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|source| IntakeError::Read {
                path: path.clone(),
                source,
            })?;
        let mime = mime_for_path(&path).to_string();

        Ok(Self {
            path,
            mime,
            size: metadata.len(),
        })
    }
}

pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Drop and pick dialogs may hand over several files; only one is analyzed.
pub fn pick_single(mut files: Vec<SelectedFile>) -> Result<SelectedFile, IntakeError> {
    match files.len() {
        0 => Err(ValidationError::NoFile.into()),
        1 => Ok(files.remove(0)),
        n => Err(ValidationError::MultipleFiles(n).into()),
    }
}

pub fn validate(file: &SelectedFile) -> Result<(), IntakeError> {
    if !ACCEPTED_MIME_TYPES.contains(&file.mime.as_str()) {
        return Err(ValidationError::UnsupportedType(file.mime.clone()).into());
    }
    if file.size == 0 {
        return Err(ValidationError::Empty.into());
    }
    if file.size > MAX_IMAGE_BYTES {
        return Err(ValidationError::TooLarge {
            size: file.size,
            limit: MAX_IMAGE_BYTES,
        }
        .into());
    }
    Ok(())
}

pub fn encode_data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

/// Reads the file and encodes it as `data:<mime>;base64,<payload>`.
pub async fn read_data_url(file: &SelectedFile) -> Result<String, IntakeError> {
    let bytes = tokio::fs::read(&file.path)
        .await
        .map_err(|source| IntakeError::Read {
            path: file.path.clone(),
            source,
        })?;

    // The file may have changed between picking and reading.
    let size = bytes.len() as u64;
    if size == 0 {
        return Err(ValidationError::Empty.into());
    }
    if size > MAX_IMAGE_BYTES {
        return Err(ValidationError::TooLarge {
            size,
            limit: MAX_IMAGE_BYTES,
        }
        .into());
    }

    debug!("Read {} bytes from {}", size, file.path.display());
    Ok(encode_data_url(&file.mime, &bytes))
}

/// Tracks outstanding preview URLs so leaks are observable.
#[derive(Clone, Default)]
pub struct PreviewRegistry {
    live: Arc<Mutex<HashSet<String>>>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self, file: &SelectedFile) -> PreviewHandle {
        let url = format!("blob:retiscan/{}", uuid::Uuid::new_v4());
        debug!("Created preview {} for {}", url, file.path.display());
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.clone());
        PreviewHandle {
            url,
            live: Arc::clone(&self.live),
        }
    }

    pub fn live_count(&self) -> usize {
        self.live.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// A temporary preview URL. Released when dropped.
#[derive(Debug)]
pub struct PreviewHandle {
    url: String,
    live: Arc<Mutex<HashSet<String>>>,
}

impl PreviewHandle {
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        let removed = self
            .live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.url);
        if removed {
            debug!("Released preview {}", self.url);
        } else {
            warn!("Preview {} was already released", self.url);
        }
    }
}
