use axum::{
    body::Body,
    extract::{Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use tokio_util::io::ReaderStream;

use super::resolver::{ARTIFACT_NAME, ResolveError};
use crate::common::response::{ApiError, ErrorBody};
use crate::state::AppState;

impl From<ResolveError> for ApiError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::InvalidId => ApiError::new(StatusCode::BAD_REQUEST, "invalid_job_id"),
            ResolveError::NotFound => ApiError::new(StatusCode::NOT_FOUND, "file_not_found"),
        }
    }
}

/// Stream a generated video
#[utoipa::path(
    get,
    path = "/files/{job_id}/out.mp4",
    params(
        ("job_id" = String, Path, description = "Job ID")
    ),
    responses(
        (status = 200, description = "Generated video", content_type = "video/mp4", body = Vec<u8>),
        (status = 400, description = "Invalid job id", body = ErrorBody),
        (status = 404, description = "Video not available", body = ErrorBody)
    ),
    tag = "Files"
)]
pub async fn get_output(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let path = state.resolver.resolve(&job_id).await?;

    // The artifact can disappear between resolving and opening it.
    let file = tokio::fs::File::open(&path).await.map_err(|e| {
        tracing::warn!("Failed to open {}: {}", path.display(), e);
        ApiError::from(ResolveError::NotFound)
    })?;
    let length = file
        .metadata()
        .await
        .map(|meta| meta.len())
        .map_err(|_| ApiError::from(ResolveError::NotFound))?;

    let body = Body::from_stream(ReaderStream::new(file));

    Ok((
        [
            (header::CONTENT_TYPE, "video/mp4".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{ARTIFACT_NAME}\""),
            ),
            (header::CONTENT_LENGTH, length.to_string()),
        ],
        body,
    ))
}
