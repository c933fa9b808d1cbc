use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::services::queue::TaskQueue;
use crate::{NotificationError, QueueStats, Task, TaskOutcome, WorkerConfig};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(&self, task: &Task) -> TaskOutcome;
}

#[derive(Default)]
struct Counters {
    completed: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
}

/// Pulls tasks off a [`TaskQueue`] and hands them to a [`TaskHandler`].
pub struct TaskWorker {
    config: WorkerConfig,
    queue: Arc<dyn TaskQueue>,
    handler: Arc<dyn TaskHandler>,
    counters: Counters,
}

impl TaskWorker {
    pub fn new(config: WorkerConfig, queue: Arc<dyn TaskQueue>, handler: Arc<dyn TaskHandler>) -> Self {
        Self {
            config,
            queue,
            handler,
            counters: Counters::default(),
        }
    }

    /// Runs until `shutdown` flips to `true`.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!("Starting task worker {}", self.config.worker_id);

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = shutdown.changed() => continue,
                result = self.queue.dequeue(self.config.poll_interval) => match result {
                    Ok(Some(task)) => self.process(task).await,
                    Ok(None) => {}
                    Err(e) => {
                        error!("Worker {} failed to dequeue: {}", self.config.worker_id, e);
                        tokio::time::sleep(self.config.error_backoff).await;
                    }
                },
            }
        }

        info!("Task worker {} stopped", self.config.worker_id);
    }

    /// Processes queued tasks until the queue is empty. Returns how many ran.
    pub async fn drain(&self) -> Result<usize, NotificationError> {
        let mut processed = 0;
        while let Some(task) = self.queue.dequeue(Duration::ZERO).await? {
            self.process(task).await;
            processed += 1;
        }
        Ok(processed)
    }

    pub async fn stats(&self) -> Result<QueueStats, NotificationError> {
        Ok(QueueStats {
            backend: self.queue.backend().to_string(),
            pending_tasks: self.queue.pending().await?,
            completed: self.counters.completed.load(Ordering::Relaxed),
            skipped: self.counters.skipped.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        })
    }

    async fn process(&self, task: Task) {
        let started = Instant::now();
        let outcome = self.handler.handle(&task).await;
        let elapsed = started.elapsed().as_millis();

        match &outcome {
            TaskOutcome::Completed(_) => {
                self.counters.completed.fetch_add(1, Ordering::Relaxed);
                debug!("Task {} ({}) {} in {}ms", task.id, task.kind, outcome, elapsed);
            }
            TaskOutcome::Skipped(_) => {
                self.counters.skipped.fetch_add(1, Ordering::Relaxed);
                debug!("Task {} ({}) {}", task.id, task.kind, outcome);
            }
            TaskOutcome::Failed(_) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                warn!("Task {} ({}) {}", task.id, task.kind, outcome);
            }
        }
    }
}
