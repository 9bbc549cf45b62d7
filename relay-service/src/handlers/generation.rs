use crate::dtos::{GenerateRequest, GenerateResponse, TaskStatusResponse};
use crate::services::metrics::{JOBS_SUBMITTED_TOTAL, STATUS_QUERIES_TOTAL};
use crate::services::GenerationJob;
use crate::startup::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Extension, Json,
};
use metrics::counter;
use service_core::error::AppError;
use service_core::middleware::RequestId;

pub async fn generate_video(
    State(state): State<AppState>,
    request_id: Option<Extension<RequestId>>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<GenerateResponse>, AppError> {
    let Json(request) = payload.map_err(|rejection| {
        counter!(JOBS_SUBMITTED_TOTAL, "result" => "rejected").increment(1);
        AppError::bad_request(format!("invalid request body: {}", rejection.body_text()))
    })?;

    let Some((image_url, video_url)) = request.urls() else {
        tracing::warn!(
            image_url = ?request.image_url,
            video_url = ?request.video_url,
            "Generation request is missing a URL"
        );
        counter!(JOBS_SUBMITTED_TOTAL, "result" => "rejected").increment(1);
        return Err(AppError::bad_request("missing image_url or video_url"));
    };

    let job = GenerationJob {
        image_url: image_url.to_string(),
        video_url: video_url.to_string(),
    };

    let request_id = request_id.as_ref().map(|Extension(id)| id.0.as_str());
    let task_id = state
        .provider
        .submit(&job, request_id)
        .await
        .map_err(|e| {
            counter!(JOBS_SUBMITTED_TOTAL, "result" => "failed").increment(1);
            AppError::from(e)
        })?;

    counter!(JOBS_SUBMITTED_TOTAL, "result" => "submitted").increment(1);

    Ok(Json(GenerateResponse {
        success: true,
        task_id,
    }))
}

pub async fn check_status(
    State(state): State<AppState>,
    request_id: Option<Extension<RequestId>>,
    Path(task_id): Path<String>,
) -> Result<Json<TaskStatusResponse>, AppError> {
    let request_id = request_id.as_ref().map(|Extension(id)| id.0.as_str());
    let data = state
        .provider
        .task_status(&task_id, request_id)
        .await
        .map_err(|e| {
            counter!(STATUS_QUERIES_TOTAL, "result" => "failed").increment(1);
            AppError::from(e)
        })?;

    counter!(STATUS_QUERIES_TOTAL, "result" => "ok").increment(1);

    Ok(Json(TaskStatusResponse {
        success: true,
        data,
    }))
}
