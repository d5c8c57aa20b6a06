//! Redis-backed inbox queue.

use apalis::prelude::*;
use apalis_redis::{Config, RedisStorage};
use async_trait::async_trait;
use tracing::debug;

use apserve_common::{AppError, AppResult};
use apserve_federation::{InboxJob, InboxQueue};

/// Storage namespace of inbox jobs, after the configured prefix.
pub const INBOX_NAMESPACE: &str = "inbox";

/// Open the inbox job storage at `redis_url`, namespaced under `prefix`.
pub async fn connect_inbox_storage(
    redis_url: &str,
    prefix: &str,
) -> AppResult<RedisStorage<InboxJob>> {
    let client =
        redis::Client::open(redis_url).map_err(|e| AppError::Queue(format!("invalid Redis URL: {e}")))?;
    let conn = redis::aio::ConnectionManager::new(client)
        .await
        .map_err(|e| AppError::Queue(format!("failed to connect to Redis: {e}")))?;
    let config = Config::default().set_namespace(&format!("{prefix}:{INBOX_NAMESPACE}"));
    Ok(RedisStorage::new_with_config(conn, config))
}

/// [`InboxQueue`] pushing jobs to apalis Redis storage.
#[derive(Clone)]
pub struct RedisInboxQueue {
    storage: RedisStorage<InboxJob>,
}

impl RedisInboxQueue {
    #[must_use]
    pub const fn new(storage: RedisStorage<InboxJob>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl InboxQueue for RedisInboxQueue {
    async fn enqueue(&self, job: InboxJob) -> AppResult<()> {
        let request_id = job.request_id.clone();
        self.storage
            .clone()
            .push(job)
            .await
            .map_err(|e| AppError::Queue(format!("failed to queue inbox job: {e}")))?;

        debug!(request_id = %request_id, "Queued inbox job");
        Ok(())
    }
}
