use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use crate::infrastructure::store::{JobStore, StoreError};
use crate::modules::jobs::model::{JobDescriptor, JobStatus};

#[derive(Default)]
struct State {
    statuses: HashMap<String, String>,
    handlers: HashMap<String, String>,
    history: HashMap<String, Vec<String>>,
    queue: VecDeque<String>,
    unavailable: bool,
}

impl State {
    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable {
            return Err(StoreError::Unavailable("memory store is offline".into()));
        }
        Ok(())
    }

    fn write_status(&mut self, job_id: &str, encoded: String) {
        self.history
            .entry(job_id.to_string())
            .or_default()
            .push(encoded.clone());
        self.statuses.insert(job_id.to_string(), encoded);
    }
}

/// In-process `JobStore`. Every operation takes one lock, so `publish` is
/// trivially atomic. Also keeps the sequence of status writes per job.
#[derive(Default)]
pub struct MemoryJobStore {
    state: Mutex<State>,
    pushed: Notify,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a raw payload, bypassing `publish`.
    pub async fn push_raw(&self, payload: impl Into<String>) {
        self.state.lock().await.queue.push_back(payload.into());
        self.pushed.notify_one();
    }

    /// Every encoded status written for `job_id`, oldest first.
    pub async fn history(&self, job_id: &str) -> Vec<String> {
        self.state
            .lock()
            .await
            .history
            .get(job_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn queue_len(&self) -> usize {
        self.state.lock().await.queue.len()
    }

    /// While offline every operation fails with `StoreError::Unavailable`.
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().await.unavailable = unavailable;
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn publish(&self, job: &JobDescriptor, status: &JobStatus) -> Result<(), StoreError> {
        let payload = serde_json::to_string(job)?;
        {
            let mut state = self.state.lock().await;
            state.check()?;
            state.write_status(&job.job_id, status.encode());
            if let Some(handler) = &job.handled_by {
                state.handlers.insert(job.job_id.clone(), handler.clone());
            }
            state.queue.push_back(payload);
        }
        self.pushed.notify_one();
        Ok(())
    }

    async fn status(&self, job_id: &str) -> Result<Option<String>, StoreError> {
        let state = self.state.lock().await;
        state.check()?;
        Ok(state.statuses.get(job_id).cloned())
    }

    async fn set_status(&self, job_id: &str, status: &JobStatus) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.check()?;
        state.write_status(job_id, status.encode());
        Ok(())
    }

    async fn set_handler(&self, job_id: &str, handler: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.check()?;
        state.handlers.insert(job_id.to_string(), handler.to_string());
        Ok(())
    }

    async fn handler(&self, job_id: &str) -> Result<Option<String>, StoreError> {
        let state = self.state.lock().await;
        state.check()?;
        Ok(state.handlers.get(job_id).cloned())
    }

    async fn pop(&self) -> Result<Option<String>, StoreError> {
        loop {
            {
                let mut state = self.state.lock().await;
                state.check()?;
                if let Some(payload) = state.queue.pop_front() {
                    return Ok(Some(payload));
                }
            }
            self.pushed.notified().await;
        }
    }
}
