use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Config, Connection, Pool, Runtime};
use tokio::sync::{Mutex, Notify};
use tracing::{debug, info};

use crate::{NotificationError, Task};

const QUEUE_KEY: &str = "hospital:tasks";

#[async_trait]
pub trait TaskQueue: Send + Sync {
    async fn enqueue(&self, task: Task) -> Result<(), NotificationError>;

    /// Waits up to `wait` for a task. `None` means the queue stayed empty.
    async fn dequeue(&self, wait: Duration) -> Result<Option<Task>, NotificationError>;

    async fn pending(&self) -> Result<usize, NotificationError>;

    fn backend(&self) -> &'static str;
}

/// Process-local FIFO queue.
#[derive(Default)]
pub struct InMemoryQueue {
    tasks: Mutex<VecDeque<Task>>,
    notify: Notify,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskQueue for InMemoryQueue {
    async fn enqueue(&self, task: Task) -> Result<(), NotificationError> {
        debug!("Queued task {} ({})", task.id, task.kind);
        self.tasks.lock().await.push_back(task);
        self.notify.notify_one();
        Ok(())
    }

    async fn dequeue(&self, wait: Duration) -> Result<Option<Task>, NotificationError> {
        if let Some(task) = self.tasks.lock().await.pop_front() {
            return Ok(Some(task));
        }

        let _ = tokio::time::timeout(wait, self.notify.notified()).await;
        Ok(self.tasks.lock().await.pop_front())
    }

    async fn pending(&self) -> Result<usize, NotificationError> {
        Ok(self.tasks.lock().await.len())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

/// Redis list used as a shared queue between processes.
pub struct RedisTaskQueue {
    pool: Pool,
}

impl RedisTaskQueue {
    pub async fn connect(redis_url: &str) -> Result<Self, NotificationError> {
        let pool = Config::from_url(redis_url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| NotificationError::PoolError(format!("Failed to create Redis pool: {}", e)))?;

        let queue = Self { pool };
        let mut conn = queue.connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;

        info!("Redis task queue connected");
        Ok(queue)
    }

    async fn connection(&self) -> Result<Connection, NotificationError> {
        self.pool
            .get()
            .await
            .map_err(|e| NotificationError::PoolError(format!("Failed to get Redis connection: {}", e)))
    }
}

#[async_trait]
impl TaskQueue for RedisTaskQueue {
    async fn enqueue(&self, task: Task) -> Result<(), NotificationError> {
        let mut conn = self.connection().await?;
        let data = serde_json::to_string(&task)?;
        let _: i64 = redis::cmd("LPUSH")
            .arg(QUEUE_KEY)
            .arg(data)
            .query_async(&mut conn)
            .await?;
        debug!("Queued task {} ({}) in Redis", task.id, task.kind);
        Ok(())
    }

    async fn dequeue(&self, wait: Duration) -> Result<Option<Task>, NotificationError> {
        let mut conn = self.connection().await?;
        let timeout_secs = wait.as_secs().max(1);
        let popped: Option<(String, String)> = redis::cmd("BRPOP")
            .arg(QUEUE_KEY)
            .arg(timeout_secs)
            .query_async(&mut conn)
            .await?;

        match popped {
            Some((_, data)) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    async fn pending(&self) -> Result<usize, NotificationError> {
        let mut conn = self.connection().await?;
        let len: usize = redis::cmd("LLEN").arg(QUEUE_KEY).query_async(&mut conn).await?;
        Ok(len)
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}
