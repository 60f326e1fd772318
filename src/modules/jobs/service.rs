use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::model::{JobDescriptor, JobStatus};
use crate::infrastructure::store::{JobStore, StoreError};
use crate::modules::readiness::gate::ReadinessGate;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("prompt is required")]
    PromptRequired,

    #[error("{0}")]
    ModelNotReady(String),

    /// The id was allocated but nothing reached the queue.
    #[error("failed to queue job {job_id}: {source}")]
    QueueUnavailable {
        job_id: String,
        #[source]
        source: StoreError,
    },

    #[error("job not found")]
    NotFound,

    #[error("status store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub job_id: String,
    pub status: JobStatus,
    pub handled_by: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusView {
    pub job_id: String,
    pub status: JobStatus,
}

/// Submission and status lookups. Holds no per-request state, so any number
/// of replicas can serve the same store.
#[derive(Clone)]
pub struct JobService {
    store: Arc<dyn JobStore>,
    readiness: ReadinessGate,
    instance_id: String,
}

impl JobService {
    pub fn new(store: Arc<dyn JobStore>, readiness: ReadinessGate, instance_id: String) -> Self {
        Self {
            store,
            readiness,
            instance_id,
        }
    }

    pub async fn submit(&self, prompt: &str) -> Result<JobHandle, JobError> {
        if prompt.is_empty() {
            return Err(JobError::PromptRequired);
        }

        // Readiness can flip right after this check; a job queued around the
        // transition simply waits for a worker.
        let readiness = self.readiness.status();
        if !readiness.ready {
            return Err(JobError::ModelNotReady(readiness.message));
        }

        let job = JobDescriptor {
            job_id: Uuid::new_v4().to_string(),
            prompt: prompt.to_string(),
            handled_by: Some(self.instance_id.clone()),
        };
        let status = JobStatus::queued();

        if let Err(source) = self.store.publish(&job, &status).await {
            error!("Failed to queue job {}: {}", job.job_id, source);
            return Err(JobError::QueueUnavailable {
                job_id: job.job_id,
                source,
            });
        }

        info!("Queued job {} on {}", job.job_id, self.instance_id);
        Ok(JobHandle {
            job_id: job.job_id,
            status,
            handled_by: self.instance_id.clone(),
        })
    }

    pub async fn status(&self, job_id: &str) -> Result<StatusView, JobError> {
        let raw = self.store.status(job_id).await?.ok_or(JobError::NotFound)?;

        if let Err(e) = self.store.set_handler(job_id, &self.instance_id).await {
            warn!("Failed to record handler for job {}: {}", job_id, e);
        }

        Ok(StatusView {
            job_id: job_id.to_string(),
            status: JobStatus::decode(&raw),
        })
    }
}
