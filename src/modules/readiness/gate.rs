use std::path::PathBuf;

use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ReadinessStatus {
    pub ready: bool,
    pub building: bool,
    pub message: String,
}

/// Reports whether the compute tier can take jobs, based on marker files that
/// the model provisioning scripts create and remove.
#[derive(Debug, Clone, Default)]
pub struct ReadinessGate {
    ready_file: Option<PathBuf>,
    building_file: Option<PathBuf>,
}

impl ReadinessGate {
    pub fn new(ready_file: Option<PathBuf>, building_file: Option<PathBuf>) -> Self {
        Self {
            ready_file,
            building_file,
        }
    }

    /// A gate without a ready marker always reports ready.
    pub fn untracked() -> Self {
        Self::default()
    }

    pub fn status(&self) -> ReadinessStatus {
        let Some(ready_file) = &self.ready_file else {
            return ReadinessStatus {
                ready: true,
                building: false,
                message: "Model readiness is not tracked; assuming ready.".to_string(),
            };
        };

        if ready_file.exists() {
            return ReadinessStatus {
                ready: true,
                building: false,
                message: "Model is ready.".to_string(),
            };
        }

        let building = self
            .building_file
            .as_ref()
            .is_some_and(|marker| marker.exists());

        let message = if building {
            "Model is still being prepared; try again shortly."
        } else {
            "Model is not ready and no build is in progress."
        };

        ReadinessStatus {
            ready: false,
            building,
            message: message.to_string(),
        }
    }
}
