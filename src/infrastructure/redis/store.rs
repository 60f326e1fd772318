use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::client::RedisService;
use crate::config::settings::StoreConfig;
use crate::infrastructure::store::{JobStore, StoreError};
use crate::modules::jobs::model::{JobDescriptor, JobStatus};

/// `BLPOP` timeout meaning "wait forever".
const BLOCK_FOREVER: f64 = 0.0;

/// Status map and attribution map are Redis hashes keyed by job id; the queue
/// is a list fed with `RPUSH` and drained with `BLPOP`.
pub struct RedisJobStore {
    redis: RedisService,
    blocking: Mutex<Option<MultiplexedConnection>>,
    queue_key: String,
    status_key: String,
    metadata_key: String,
}

impl RedisJobStore {
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let redis = RedisService::new(&config.redis_url).await?;

        Ok(Self {
            redis,
            blocking: Mutex::new(None),
            queue_key: config.queue_key.clone(),
            status_key: config.status_key.clone(),
            metadata_key: config.metadata_key(),
        })
    }

    async fn blocking_pop(&self) -> Result<Option<String>, StoreError> {
        let mut guard = self.blocking.lock().await;
        let mut conn = match guard.take() {
            Some(conn) => conn,
            None => self.redis.dedicated_conn().await?,
        };

        let popped: Result<Option<(String, String)>, redis::RedisError> =
            conn.blpop(&self.queue_key, BLOCK_FOREVER).await;

        match popped {
            Ok(entry) => {
                *guard = Some(conn);
                Ok(entry.map(|(_, payload)| payload))
            }
            Err(e) => {
                // The connection is not put back, so the next pop reconnects.
                warn!("Queue connection failed, will reconnect: {}", e);
                Err(e.into())
            }
        }
    }
}

#[async_trait]
impl JobStore for RedisJobStore {
    async fn publish(&self, job: &JobDescriptor, status: &JobStatus) -> Result<(), StoreError> {
        let payload = serde_json::to_string(job)?;
        let mut conn = self.redis.conn();

        let mut pipe = redis::pipe();
        pipe.atomic()
            .hset(&self.status_key, &job.job_id, status.encode())
            .ignore();
        if let Some(handler) = &job.handled_by {
            pipe.hset(&self.metadata_key, &job.job_id, handler).ignore();
        }
        pipe.rpush(&self.queue_key, payload).ignore();

        let _: () = pipe.query_async(&mut conn).await?;
        debug!("Published job {} to '{}'", job.job_id, self.queue_key);
        Ok(())
    }

    async fn status(&self, job_id: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.redis.conn();
        let raw: Option<String> = conn.hget(&self.status_key, job_id).await?;
        Ok(raw)
    }

    async fn set_status(&self, job_id: &str, status: &JobStatus) -> Result<(), StoreError> {
        let mut conn = self.redis.conn();
        let _: () = conn
            .hset(&self.status_key, job_id, status.encode())
            .await?;
        Ok(())
    }

    async fn set_handler(&self, job_id: &str, handler: &str) -> Result<(), StoreError> {
        let mut conn = self.redis.conn();
        let _: () = conn.hset(&self.metadata_key, job_id, handler).await?;
        Ok(())
    }

    async fn handler(&self, job_id: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.redis.conn();
        let handler: Option<String> = conn.hget(&self.metadata_key, job_id).await?;
        Ok(handler)
    }

    async fn pop(&self) -> Result<Option<String>, StoreError> {
        self.blocking_pop().await
    }
}
