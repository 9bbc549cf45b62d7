use crate::startup::AppState;
use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};
use service_core::error::AppError;

/// Serve a file from the local scratch directory.
pub async fn get_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let data = state.local_files.read(&filename).await?;
    let mime = mime_guess::from_path(&filename).first_or_octet_stream();

    tracing::debug!(filename = %filename, size = data.len(), "Serving local file");

    Ok(([(header::CONTENT_TYPE, mime.to_string())], data))
}
