pub mod mailer;
pub mod producer;
pub mod queue;
pub mod scheduler;
pub mod templates;
pub mod worker;

pub use mailer::{mailer_from_config, ConsoleMailer, HttpMailer, Mailer, MemoryMailer};
pub use producer::TaskProducer;
pub use queue::{InMemoryQueue, RedisTaskQueue, TaskQueue};
pub use scheduler::{PeriodicTask, Scheduler};
pub use templates::EmailTemplates;
pub use worker::{TaskHandler, TaskWorker};
