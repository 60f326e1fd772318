use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::generator::{GenerationError, GenerationRequest, ProgressReporter, VideoGenerator};
use crate::config::settings::GenerationSettings;
use crate::infrastructure::store::JobStore;
use crate::modules::files::resolver::{OutputResolver, is_safe_job_id};
use crate::modules::jobs::model::{JobDescriptor, JobStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    Failed { percent: u8, reason: String },
}

/// Pops one job at a time from the shared queue and drives it to a terminal
/// status. Jobs are never retried; a job popped by a worker that dies stays
/// `running`.
pub struct InferenceWorker {
    name: String,
    store: Arc<dyn JobStore>,
    generator: Arc<dyn VideoGenerator>,
    resolver: OutputResolver,
    settings: GenerationSettings,
    backoff: Duration,
}

impl InferenceWorker {
    pub fn new(
        name: impl Into<String>,
        store: Arc<dyn JobStore>,
        generator: Arc<dyn VideoGenerator>,
        resolver: OutputResolver,
        settings: GenerationSettings,
        backoff: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            store,
            generator,
            resolver,
            settings,
            backoff,
        }
    }

    /// Runs until `shutdown` is cancelled. Cancellation is only observed while
    /// waiting for work, so a job in flight always finishes.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(
            "Starting inference worker {} writing to {}",
            self.name,
            self.resolver.root().display()
        );

        loop {
            let popped = tokio::select! {
                _ = shutdown.cancelled() => break,
                popped = self.store.pop() => popped,
            };

            match popped {
                Ok(Some(payload)) => {
                    self.handle_payload(&payload).await;
                }
                Ok(None) => continue,
                Err(e) => {
                    error!(
                        "Unhandled error in worker loop; continuing in {:?}: {}",
                        self.backoff, e
                    );
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.backoff) => {}
                    }
                }
            }
        }

        info!("Inference worker {} shutting down.", self.name);
    }

    /// Returns `None` when the payload was discarded.
    pub async fn handle_payload(&self, payload: &str) -> Option<JobOutcome> {
        info!("Dequeued job payload: {}", payload);
        let job = decode_job(payload)?;
        Some(self.process_job(job).await)
    }

    pub async fn process_job(&self, job: JobDescriptor) -> JobOutcome {
        let job_id = job.job_id.as_str();

        if let Some(handler) = &job.handled_by {
            if let Err(e) = self.store.set_handler(job_id, handler).await {
                warn!("Failed to record handler for job {}: {}", job_id, e);
            }
        }

        if let Err(e) = self.store.set_status(job_id, &JobStatus::running(0)).await {
            warn!("Failed to mark job {} as running: {}", job_id, e);
        }

        let progress = ProgressReporter::new(self.store.clone(), job_id);
        let output_path = self.resolver.artifact_path(job_id);

        match self.execute(&job, &output_path, &progress).await {
            Ok(()) => {
                self.publish(job_id, JobStatus::completed()).await;
                info!("Job {} completed successfully.", job_id);
                JobOutcome::Completed
            }
            Err(e) => {
                let percent = progress.last_percent();
                self.publish(job_id, JobStatus::failed(i64::from(percent))).await;
                error!("Job {} failed during inference at {}%: {:#}", job_id, percent, e);
                JobOutcome::Failed {
                    percent,
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn execute(
        &self,
        job: &JobDescriptor,
        output_path: &Path,
        progress: &ProgressReporter,
    ) -> Result<(), GenerationError> {
        if let Some(dir) = output_path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }

        let request = GenerationRequest {
            job_id: &job.job_id,
            prompt: &job.prompt,
            output_path,
            settings: &self.settings,
        };

        AssertUnwindSafe(self.generator.generate(request, progress))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(GenerationError::Panicked(panic_message(panic))))
    }

    async fn publish(&self, job_id: &str, status: JobStatus) {
        if let Err(e) = self.store.set_status(job_id, &status).await {
            error!("Failed to record status {} for job {}: {}", status, job_id, e);
        }
    }
}

/// Parses a queue payload, logging and discarding anything unusable.
pub fn decode_job(payload: &str) -> Option<JobDescriptor> {
    let job: JobDescriptor = match serde_json::from_str(payload) {
        Ok(job) => job,
        Err(e) => {
            error!("Invalid job payload; discarding. Error: {}", e);
            return None;
        }
    };

    if job.prompt.is_empty() {
        error!("Job {} has an empty prompt; discarding.", job.job_id);
        return None;
    }
    if !is_safe_job_id(&job.job_id) {
        error!("Job id {:?} is not a valid path segment; discarding.", job.job_id);
        return None;
    }
    Some(job)
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
