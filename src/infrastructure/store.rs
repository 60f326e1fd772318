use async_trait::async_trait;
use thiserror::Error;

use crate::modules::jobs::model::{JobDescriptor, JobStatus};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("failed to encode job descriptor: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Shared state between front-end replicas and workers: the status map, the
/// handler attribution map and the FIFO job queue.
///
/// Single-field writes are last-writer-wins. `publish` is the only multi-field
/// write and must be applied as one indivisible batch.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Records `status` (and `handled_by`, when set) for the job and pushes the
    /// descriptor to the tail of the queue, all or nothing.
    async fn publish(&self, job: &JobDescriptor, status: &JobStatus) -> Result<(), StoreError>;

    /// Raw encoded status, `None` when the job is unknown.
    async fn status(&self, job_id: &str) -> Result<Option<String>, StoreError>;

    async fn set_status(&self, job_id: &str, status: &JobStatus) -> Result<(), StoreError>;

    async fn set_handler(&self, job_id: &str, handler: &str) -> Result<(), StoreError>;

    async fn handler(&self, job_id: &str) -> Result<Option<String>, StoreError>;

    /// Blocks until a payload is available at the head of the queue and
    /// removes it. `Ok(None)` means the wait ended without a payload.
    async fn pop(&self) -> Result<Option<String>, StoreError>;
}
