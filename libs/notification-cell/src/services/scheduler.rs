use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::DailySchedule;

/// A job run by the [`Scheduler`]. Returns how many items it acted on.
#[async_trait]
pub trait PeriodicTask: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, now: DateTime<Utc>) -> anyhow::Result<usize>;
}

struct Job {
    schedule: DailySchedule,
    task: Arc<dyn PeriodicTask>,
}

#[derive(Default)]
pub struct Scheduler {
    jobs: Vec<Job>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn every_day(mut self, schedule: DailySchedule, task: Arc<dyn PeriodicTask>) -> Self {
        self.jobs.push(Job { schedule, task });
        self
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Spawns one loop per job. Each loop exits when `shutdown` flips to `true`.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        self.jobs
            .into_iter()
            .map(|job| {
                let shutdown = shutdown.clone();
                tokio::spawn(run_job(job, shutdown))
            })
            .collect()
    }
}

async fn run_job(job: Job, mut shutdown: watch::Receiver<bool>) {
    let name = job.task.name();
    loop {
        let now = Utc::now();
        let next = job.schedule.next_after(now);
        let wait = (next - now).to_std().unwrap_or_default();
        info!("Job {} next runs at {}", name, next);

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("Job {} stopped", name);
                    return;
                }
                continue;
            }
        }

        match job.task.run(Utc::now()).await {
            Ok(count) => info!("Job {} finished, {} item(s) processed", name, count),
            Err(e) => error!("Job {} failed: {}", name, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Counting(AtomicUsize);

    #[async_trait]
    impl PeriodicTask for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn run(&self, _now: DateTime<Utc>) -> anyhow::Result<usize> {
            Ok(self.0.fetch_add(1, Ordering::SeqCst))
        }
    }

    #[tokio::test]
    async fn spawned_jobs_stop_on_shutdown() {
        let task = Arc::new(Counting(AtomicUsize::new(0)));
        let scheduler = Scheduler::new().every_day(DailySchedule::at(3, 0), task.clone());
        assert_eq!(scheduler.len(), 1);

        let (tx, rx) = watch::channel(false);
        let handles = scheduler.spawn(rx);
        tx.send(true).unwrap();

        for handle in handles {
            tokio::time::timeout(Duration::from_secs(2), handle).await.unwrap().unwrap();
        }
        assert_eq!(task.0.load(Ordering::SeqCst), 0);
    }
}
