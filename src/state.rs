use std::sync::Arc;

use crate::config::settings::AppConfig;
use crate::infrastructure::store::JobStore;
use crate::modules::files::resolver::OutputResolver;
use crate::modules::jobs::service::JobService;
use crate::modules::readiness::gate::ReadinessGate;

#[derive(Clone)]
pub struct AppState {
    pub jobs: JobService,
    pub readiness: ReadinessGate,
    pub resolver: OutputResolver,
}

impl AppState {
    pub fn new(config: &AppConfig, store: Arc<dyn JobStore>) -> Self {
        let readiness = ReadinessGate::new(config.ready_file.clone(), config.building_file.clone());

        Self {
            jobs: JobService::new(store, readiness.clone(), config.instance_id.clone()),
            readiness,
            resolver: OutputResolver::new(config.generated_root.clone()),
        }
    }
}
