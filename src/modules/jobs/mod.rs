use axum::Router;
use axum::routing::{get, post};

use crate::state::AppState;

pub mod dto;
pub mod handler;
pub mod model;
pub mod service;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/generate", post(handler::generate))
        .route("/jobs/{job_id}", get(handler::get_job))
}
