//! File storage for uploaded documents and flyers
//!
//! Files live under `<upload_dir>/<scope>/<uuid>.<ext>`. The original
//! filename is kept in the database only.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Family documents and announcement flyers
pub const ALLOWED_EXTENSIONS: [&str; 7] = ["pdf", "doc", "docx", "txt", "jpg", "jpeg", "png"];

/// Church-wide shared documents also take media, spreadsheets, slides and archives
pub const SHARED_EXTENSIONS: [&str; 18] = [
    "pdf", "doc", "docx", "txt", "rtf", "jpg", "jpeg", "png", "gif", "mp3", "wav", "mp4", "csv", "xls", "xlsx",
    "ppt", "pptx", "zip",
];

/// A file received in a multipart upload
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Where and what was written
#[derive(Debug, Clone, PartialEq)]
pub struct StoredFile {
    pub original_filename: String,
    pub stored_path: String,
    pub size: i64,
    pub checksum: String,
}

#[derive(Debug, Clone)]
pub struct StorageService {
    root: PathBuf,
    max_bytes: usize,
}

impl StorageService {
    pub fn new(root: impl AsRef<Path>, max_bytes: usize) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            max_bytes,
        }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Check name, extension and size without writing anything.
    /// Returns the sanitized filename and lowercase extension.
    pub fn validate(&self, file: &UploadedFile, allowed: &[&str]) -> AppResult<(String, String)> {
        let filename = sanitize_filename(&file.filename);
        if filename.is_empty() {
            return Err(AppError::bad_request("A filename is required"));
        }

        let extension = Path::new(&filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase)
            .filter(|ext| allowed.contains(&ext.as_str()))
            .ok_or_else(|| {
                AppError::BadRequest(format!("File type not allowed. Allowed types: {}", allowed.join(", ")))
            })?;

        if file.bytes.is_empty() {
            return Err(AppError::bad_request("Uploaded file is empty"));
        }
        if file.bytes.len() > self.max_bytes {
            return Err(AppError::PayloadTooLarge(format!(
                "File exceeds the maximum size of {} bytes",
                self.max_bytes
            )));
        }

        Ok((filename, extension))
    }

    /// Validate against `allowed` and write the file under `scope`
    pub async fn store(&self, scope: &str, file: &UploadedFile, allowed: &[&str]) -> AppResult<StoredFile> {
        let (original_filename, extension) = self.validate(file, allowed)?;

        let directory = self.root.join(scope);
        fs::create_dir_all(&directory).await?;

        let path = directory.join(format!("{}.{}", Uuid::new_v4(), extension));
        fs::write(&path, &file.bytes).await?;
        debug!(path = %path.display(), size = file.bytes.len(), "Stored upload");

        Ok(StoredFile {
            original_filename,
            stored_path: path.to_string_lossy().into_owned(),
            size: i64::try_from(file.bytes.len()).unwrap_or(i64::MAX),
            checksum: hex::encode(Sha256::digest(&file.bytes)),
        })
    }

    pub async fn read(&self, stored_path: &str) -> AppResult<Vec<u8>> {
        match fs::read(stored_path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(AppError::not_found("Stored file"))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a stored file; a file that is already gone is not an error
    pub async fn remove(&self, stored_path: &str) {
        if let Err(e) = fs::remove_file(stored_path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = stored_path, error = %e, "Failed to remove stored file");
            }
        }
    }
}

/// MIME type from the file extension
pub fn content_type(filename: &str) -> &'static str {
    let extension = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase);
    match extension.as_deref() {
        Some("pdf") => "application/pdf",
        Some("doc") => "application/msword",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        Some("rtf") => "application/rtf",
        Some("txt") => "text/plain; charset=utf-8",
        Some("csv") => "text/csv",
        Some("xls") => "application/vnd.ms-excel",
        Some("xlsx") => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        Some("ppt") => "application/vnd.ms-powerpoint",
        Some("pptx") => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("mp4") => "video/mp4",
        Some("zip") => "application/zip",
        _ => "application/octet-stream",
    }
}

/// Last path component with control characters and quotes dropped
fn sanitize_filename(filename: &str) -> String {
    filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .chars()
        .filter(|c| !c.is_control() && *c != '"')
        .collect::<String>()
        .trim()
        .to_string()
}
