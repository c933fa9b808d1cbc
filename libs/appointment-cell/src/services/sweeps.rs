use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::{info, instrument, warn};

use notification_cell::PeriodicTask;

use crate::services::booking::AppointmentService;
use crate::{AppointmentNotice, NO_SHOW_TASK, REMINDER_TASK};

/// Queues a reminder for every scheduled or confirmed appointment dated
/// tomorrow.
pub struct ReminderSweep {
    service: Arc<AppointmentService>,
}

impl ReminderSweep {
    pub fn new(service: Arc<AppointmentService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl PeriodicTask for ReminderSweep {
    fn name(&self) -> &'static str {
        "appointment-reminders"
    }

    #[instrument(skip(self))]
    async fn run(&self, now: DateTime<Utc>) -> anyhow::Result<usize> {
        let tomorrow = now.date_naive() + Duration::days(1);
        let due = self
            .service
            .appointments
            .filter(|a| a.appointment_date == tomorrow && a.status.is_pending())
            .await;

        let mut queued = 0;
        for appointment in &due {
            let notice = AppointmentNotice {
                appointment_id: appointment.id,
            };
            if self.service.producer.dispatch(REMINDER_TASK, &notice).await {
                queued += 1;
            }
        }

        info!("Queued {} reminder(s) for {}", queued, tomorrow);
        Ok(queued)
    }
}

/// Flips appointments dated before today that never started to `no_show`
/// and tells the patient.
pub struct NoShowSweep {
    service: Arc<AppointmentService>,
}

impl NoShowSweep {
    pub fn new(service: Arc<AppointmentService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl PeriodicTask for NoShowSweep {
    fn name(&self) -> &'static str {
        "no-show-sweep"
    }

    #[instrument(skip(self))]
    async fn run(&self, now: DateTime<Utc>) -> anyhow::Result<usize> {
        let today = now.date_naive();
        let overdue = self
            .service
            .appointments
            .filter(|a| a.appointment_date < today && a.status.is_pending())
            .await;

        let mut marked = 0;
        for appointment in overdue {
            match self.service.mark_no_show(appointment.id).await {
                Ok(_) => {
                    marked += 1;
                    let notice = AppointmentNotice {
                        appointment_id: appointment.id,
                    };
                    self.service.producer.dispatch(NO_SHOW_TASK, &notice).await;
                }
                // Someone moved it on since the filter ran.
                Err(e) => warn!("Skipping no-show for appointment {}: {}", appointment.id, e),
            }
        }

        info!("Marked {} appointment(s) as no-show", marked);
        Ok(marked)
    }
}
