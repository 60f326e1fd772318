use axum::Router;
use axum::routing::get;

use crate::state::AppState;

pub mod handler;
pub mod resolver;

/// Mounted under both `/files` and `/generated`.
pub fn router() -> Router<AppState> {
    Router::new().route("/{job_id}/out.mp4", get(handler::get_output))
}
