//! Multipart parsing and file download responses

use std::collections::HashMap;

use axum::{
    extract::Multipart,
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};

use crate::error::{AppError, AppResult};
use crate::services::storage_service::{content_type, UploadedFile};

/// A multipart form with one file part and any number of text fields
#[derive(Debug)]
pub struct UploadForm {
    pub file: UploadedFile,
    pub fields: HashMap<String, String>,
}

impl UploadForm {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Read the whole form. The part named `file_field` is the upload.
pub async fn read_form(mut multipart: Multipart, file_field: &str) -> AppResult<UploadForm> {
    let mut file = None;
    let mut fields = HashMap::new();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        if name == file_field {
            let filename = field.file_name().unwrap_or_default().to_string();
            let bytes = field.bytes().await?.to_vec();
            file = Some(UploadedFile { filename, bytes });
        } else {
            fields.insert(name, field.text().await?);
        }
    }

    let file = file.ok_or_else(|| AppError::BadRequest(format!("Missing '{}' file", file_field)))?;
    Ok(UploadForm { file, fields })
}

/// Bytes served as an attachment under their original filename
pub fn attachment(filename: &str, bytes: Vec<u8>) -> Response {
    let disposition = format!("attachment; filename=\"{}\"", filename.replace('"', ""));
    let disposition = HeaderValue::from_str(&disposition)
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    (
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(content_type(filename))),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response()
}
