use axum::{extract::State, http::StatusCode, response::IntoResponse};

use super::gate::ReadinessStatus;
use crate::common::response::ApiSuccess;
use crate::state::AppState;

/// Current model readiness
#[utoipa::path(
    get,
    path = "/api/model-status",
    responses(
        (status = 200, description = "Readiness of the compute tier", body = ReadinessStatus)
    ),
    tag = "Model"
)]
pub async fn model_status(State(state): State<AppState>) -> impl IntoResponse {
    ApiSuccess(state.readiness.status(), StatusCode::OK)
}
