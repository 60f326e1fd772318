use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::docs::ApiDoc;
use crate::state::AppState;

pub fn configure_routes() -> Router<AppState> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", axum::routing::get(|| async { "ok" }))
        .nest("/api", api_routes())
        .nest("/files", crate::modules::files::router())
        .nest("/generated", crate::modules::files::router())
        .layer(cors)
}

fn api_routes() -> Router<AppState> {
    crate::modules::jobs::router().merge(crate::modules::readiness::router())
}
