use crate::dtos::UploadResponse;
use crate::services::metrics::{UPLOADS_TOTAL, UPLOAD_BYTES_TOTAL};
use crate::startup::AppState;
use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    Json,
};
use bytes::BytesMut;
use metrics::counter;
use service_core::error::AppError;
use uuid::Uuid;

const FILE_FIELD: &str = "file";

/// Store the multipart `file` field in object storage under a fresh key.
pub async fn upload_file(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    match store_upload(&state, multipart).await {
        Ok(response) => {
            counter!(UPLOADS_TOTAL, "result" => "stored").increment(1);
            Ok(Json(response))
        }
        Err(err) => {
            let result = match err {
                AppError::BadRequest(_) => "rejected",
                _ => "failed",
            };
            counter!(UPLOADS_TOTAL, "result" => result).increment(1);
            Err(err)
        }
    }
}

async fn store_upload(
    state: &AppState,
    mut multipart: Multipart,
) -> Result<UploadResponse, AppError> {
    let limits = &state.config.upload;
    let max_size = limits.max_file_size;

    let mut field = loop {
        match multipart
            .next_field()
            .await
            .map_err(|e| multipart_error(e, max_size))?
        {
            Some(field) if field.name() == Some(FILE_FIELD) => break field,
            Some(_) => continue,
            None => return Err(AppError::bad_request("no file part in request")),
        }
    };

    let original_name = match field.file_name() {
        None => return Err(AppError::bad_request("no file part in request")),
        Some("") => return Err(AppError::bad_request("no file selected")),
        Some(name) => name.to_string(),
    };

    let extension = match file_extension(&original_name) {
        Some(ext) if limits.is_allowed(&ext) => ext,
        Some(ext) => {
            return Err(AppError::bad_request(format!(
                "unsupported file type: {}",
                ext
            )))
        }
        None => {
            return Err(AppError::bad_request(
                "unsupported file type: file has no extension",
            ))
        }
    };

    let mut data = BytesMut::new();
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| multipart_error(e, max_size))?
    {
        if data.len() + chunk.len() > max_size {
            tracing::warn!(filename = %original_name, max_size, "Upload exceeds size limit");
            return Err(too_large(max_size));
        }
        data.extend_from_slice(&chunk);
    }

    let size = data.len();
    let key = format!("{}{}", Uuid::new_v4(), extension);

    tracing::info!(
        filename = %original_name,
        key = %key,
        size_bytes = size,
        "Uploading file to object storage"
    );

    let url = state
        .storage
        .upload(&key, data.freeze())
        .await
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("file upload failed: {}", e)))?;

    counter!(UPLOAD_BYTES_TOTAL).increment(size as u64);
    tracing::info!(key = %key, url = %url, "File upload succeeded");

    Ok(UploadResponse {
        success: true,
        url,
        filename: key,
    })
}

/// Lowercased extension with its leading dot, e.g. `.png`.
fn file_extension(filename: &str) -> Option<String> {
    std::path::Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(|ext| format!(".{}", ext.to_lowercase()))
}

fn too_large(max_size: usize) -> AppError {
    AppError::bad_request(format!(
        "file size exceeds limit ({}MB)",
        max_size as f64 / 1024.0 / 1024.0
    ))
}

fn multipart_error(err: MultipartError, max_size: usize) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        too_large(max_size)
    } else {
        AppError::bad_request(format!("invalid multipart body: {}", err.body_text()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_lowercased_with_dot() {
        assert_eq!(file_extension("a.PNG").as_deref(), Some(".png"));
        assert_eq!(file_extension("clip.final.Mp4").as_deref(), Some(".mp4"));
    }

    #[test]
    fn names_without_extension_have_none() {
        assert_eq!(file_extension("README"), None);
        assert_eq!(file_extension(".bashrc"), None);
        assert_eq!(file_extension("trailing."), None);
    }

    #[test]
    fn size_message_is_in_megabytes() {
        let err = too_large(1024 * 1024);
        assert_eq!(err.to_string(), "Bad request: file size exceeds limit (1MB)");
    }
}
