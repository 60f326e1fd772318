use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::debug;
use validator::Validate;

use super::dto::{GenerateRequest, JobAccepted, JobStatusResponse};
use super::service::JobError;
use crate::common::response::{ApiError, ApiSuccess, ErrorBody};
use crate::state::AppState;

impl From<JobError> for ApiError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::PromptRequired => ApiError::new(StatusCode::BAD_REQUEST, "prompt_required")
                .with_message(JobError::PromptRequired.to_string()),
            JobError::ModelNotReady(message) => {
                ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "model_not_ready")
                    .with_message(message)
            }
            JobError::QueueUnavailable { job_id, .. } => {
                ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "queue_unavailable")
                    .with_message("Failed to queue job; please retry.")
                    .with_job_id(job_id)
            }
            JobError::NotFound => ApiError::new(StatusCode::NOT_FOUND, "job_not_found"),
            JobError::StoreUnavailable(_) => {
                ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "store_unavailable")
                    .with_message("Job status is temporarily unavailable.")
            }
        }
    }
}

/// Queue a video generation job
#[utoipa::path(
    post,
    path = "/api/generate",
    request_body = GenerateRequest,
    responses(
        (status = 202, description = "Job accepted", body = JobAccepted),
        (status = 400, description = "Prompt missing", body = ErrorBody),
        (status = 503, description = "Model not ready or queue unavailable", body = ErrorBody)
    ),
    tag = "Jobs"
)]
pub async fn generate(
    State(state): State<AppState>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    // An unreadable body is treated like one without a prompt.
    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => {
            debug!("Ignoring unreadable generate body: {}", rejection);
            GenerateRequest::default()
        }
    };

    if req.validate().is_err() {
        return Err(JobError::PromptRequired.into());
    }

    let handle = state.jobs.submit(&req.prompt).await?;

    Ok(ApiSuccess(
        JobAccepted {
            job_id: handle.job_id,
            status: handle.status.state.to_string(),
            percent_complete: handle.status.percent.unwrap_or(0),
            handled_by: handle.handled_by,
        },
        StatusCode::ACCEPTED,
    ))
}

/// Get job status
#[utoipa::path(
    get,
    path = "/api/jobs/{job_id}",
    params(
        ("job_id" = String, Path, description = "Job ID")
    ),
    responses(
        (status = 200, description = "Current job status", body = JobStatusResponse),
        (status = 404, description = "Unknown job", body = ErrorBody),
        (status = 503, description = "Status store unavailable", body = ErrorBody)
    ),
    tag = "Jobs"
)]
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let view = state.jobs.status(&job_id).await?;

    Ok(ApiSuccess(
        JobStatusResponse {
            job_id: view.job_id,
            status: view.status.state.to_string(),
            percent_complete: view.status.percent,
        },
        StatusCode::OK,
    ))
}
