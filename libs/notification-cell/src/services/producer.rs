use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::services::queue::TaskQueue;
use crate::Task;

/// Enqueues background work without blocking the caller on failures.
#[derive(Clone)]
pub struct TaskProducer {
    queue: Arc<dyn TaskQueue>,
}

impl TaskProducer {
    pub fn new(queue: Arc<dyn TaskQueue>) -> Self {
        Self { queue }
    }

    pub fn queue(&self) -> Arc<dyn TaskQueue> {
        self.queue.clone()
    }

    /// Returns `false` when the task could not be built or queued. The error
    /// is logged and the request that triggered it carries on.
    pub async fn dispatch<P: Serialize>(&self, kind: &str, payload: &P) -> bool {
        let task = match Task::new(kind, payload) {
            Ok(task) => task,
            Err(e) => {
                warn!("Could not build {} task: {}", kind, e);
                return false;
            }
        };

        let id = task.id;
        match self.queue.enqueue(task).await {
            Ok(()) => {
                debug!("Dispatched {} task {}", kind, id);
                true
            }
            Err(e) => {
                warn!("Could not enqueue {} task: {}", kind, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::queue::InMemoryQueue;
    use serde_json::json;

    #[tokio::test]
    async fn dispatch_places_task_on_queue() {
        let queue = Arc::new(InMemoryQueue::new());
        let producer = TaskProducer::new(queue.clone());

        assert!(producer.dispatch("appointment.confirmation", &json!({ "id": 1 })).await);
        assert_eq!(queue.pending().await.unwrap(), 1);
    }
}
