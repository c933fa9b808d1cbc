use std::fmt;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::NotificationError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub text_body: String,
    pub html_body: Option<String>,
}

impl EmailMessage {
    pub fn new(from: &str, to: &str, subject: &str, rendered: RenderedEmail) -> Self {
        Self {
            from: from.to_string(),
            to: vec![to.to_string()],
            subject: subject.to_string(),
            text_body: rendered.text,
            html_body: rendered.html,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedEmail {
    pub text: String,
    pub html: Option<String>,
}

/// A unit of background work. `kind` selects the handler, `payload` carries
/// its JSON arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub kind: String,
    pub payload: Value,
    pub enqueued_at: DateTime<Utc>,
}

impl Task {
    pub fn new<P: Serialize>(kind: &str, payload: &P) -> Result<Self, NotificationError> {
        Ok(Self {
            id: Uuid::new_v4(),
            kind: kind.to_string(),
            payload: serde_json::to_value(payload)?,
            enqueued_at: Utc::now(),
        })
    }

    pub fn payload_as<P: DeserializeOwned>(&self) -> Result<P, NotificationError> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum TaskOutcome {
    Completed(String),
    /// The task referenced something that no longer exists.
    Skipped(String),
    Failed(String),
}

impl fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskOutcome::Completed(detail) => write!(f, "completed: {}", detail),
            TaskOutcome::Skipped(detail) => write!(f, "skipped: {}", detail),
            TaskOutcome::Failed(detail) => write!(f, "failed: {}", detail),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueStats {
    pub backend: String,
    pub pending_tasks: usize,
    pub completed: u64,
    pub skipped: u64,
    pub failed: u64,
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub worker_id: String,
    /// How long a single dequeue blocks before the shutdown flag is rechecked.
    pub poll_interval: Duration,
    /// Pause after a queue error before polling again.
    pub error_backoff: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: "notification-worker".to_string(),
            poll_interval: Duration::from_secs(1),
            error_backoff: Duration::from_secs(5),
        }
    }
}

/// Fires once per day at `hour:minute` UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySchedule {
    pub hour: u32,
    pub minute: u32,
}

impl DailySchedule {
    pub fn at(hour: u32, minute: u32) -> Self {
        Self {
            hour: hour.min(23),
            minute: minute.min(59),
        }
    }

    /// The first firing strictly after `now`.
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now
            .date_naive()
            .and_hms_opt(self.hour, self.minute, 0)
            .map(|naive| Utc.from_utc_datetime(&naive))
            .unwrap_or(now);

        if today > now {
            today
        } else {
            today + chrono::Duration::days(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_fires_later_today_when_time_not_reached() {
        let now = Utc.with_ymd_and_hms(2024, 3, 4, 7, 30, 0).unwrap();
        let next = DailySchedule::at(9, 0).next_after(now);
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap());
    }

    #[test]
    fn schedule_rolls_over_to_tomorrow() {
        let now = Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap();
        let next = DailySchedule::at(9, 0).next_after(now);
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 3, 5, 9, 0, 0).unwrap());
    }

    #[test]
    fn task_payload_round_trips() {
        #[derive(Serialize, Deserialize, PartialEq, Debug)]
        struct Payload {
            appointment_id: Uuid,
        }

        let payload = Payload {
            appointment_id: Uuid::new_v4(),
        };
        let task = Task::new("appointment.confirmation", &payload).unwrap();
        assert_eq!(task.payload_as::<Payload>().unwrap(), payload);
    }
}
