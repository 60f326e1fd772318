use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct GenerateRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "prompt is required"))]
    pub prompt: String,
}

/// Returned once a job is accepted; nothing has been processed yet.
#[derive(Debug, Serialize, ToSchema)]
pub struct JobAccepted {
    pub job_id: String,
    pub status: String,
    pub percent_complete: u8,
    pub handled_by: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct JobStatusResponse {
    pub job_id: String,
    pub status: String,
    /// Only present when the status record carries one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent_complete: Option<u8>,
}
