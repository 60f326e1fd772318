use axum::Router;
use axum::routing::get;

use crate::state::AppState;

pub mod gate;
pub mod handler;

pub fn router() -> Router<AppState> {
    Router::new().route("/model-status", get(handler::model_status))
}
