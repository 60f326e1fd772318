use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::modules::jobs::handler::generate,
        crate::modules::jobs::handler::get_job,
        crate::modules::readiness::handler::model_status,
        crate::modules::files::handler::get_output,
    ),
    components(
        schemas(
            crate::modules::jobs::dto::GenerateRequest,
            crate::modules::jobs::dto::JobAccepted,
            crate::modules::jobs::dto::JobStatusResponse,
            crate::modules::readiness::gate::ReadinessStatus,
            crate::common::response::ErrorBody,
        )
    ),
    tags(
        (name = "Jobs", description = "Video generation jobs"),
        (name = "Model", description = "Compute tier readiness"),
        (name = "Files", description = "Generated videos")
    )
)]
pub struct ApiDoc;
