use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, error, info, instrument};

use notification_cell::{EmailMessage, EmailTemplates, Mailer, NotificationError, Task, TaskHandler, TaskOutcome};

use crate::services::booking::{AppointmentService, Participants};
use crate::{
    Appointment, AppointmentNotice, CANCELLATION_TASK, CONFIRMATION_TASK, NO_SHOW_TASK, REMINDER_TASK,
};

#[derive(Debug, Serialize)]
struct EmailContext<'a> {
    patient_name: &'a str,
    doctor_name: &'a str,
    recipient_name: &'a str,
    appointment_date: String,
    appointment_time: String,
    reason: &'a str,
    cancelled_by: &'a str,
    site_name: &'a str,
}

#[derive(Clone, Copy)]
struct Recipient<'a> {
    email: &'a str,
    name: &'a str,
}

impl<'a> Recipient<'a> {
    fn mail(self, subject: &'static str, template: &'static str) -> Outgoing<'a> {
        Outgoing {
            to: self.email,
            recipient_name: self.name,
            subject,
            template,
        }
    }
}

struct Outgoing<'a> {
    to: &'a str,
    recipient_name: &'a str,
    subject: &'static str,
    template: &'static str,
}

/// Turns appointment tasks into emails for the patient and the doctor.
pub struct AppointmentNotifier {
    service: Arc<AppointmentService>,
    mailer: Arc<dyn Mailer>,
    templates: EmailTemplates,
}

impl AppointmentNotifier {
    pub fn new(service: Arc<AppointmentService>, mailer: Arc<dyn Mailer>) -> Result<Self, NotificationError> {
        Ok(Self {
            service,
            mailer,
            templates: EmailTemplates::new()?,
        })
    }

    async fn cancelled_by_name(&self, appointment: &Appointment) -> String {
        match appointment.cancelled_by {
            Some(id) => match self.service.accounts().get(id).await {
                Ok(account) => account.full_name(),
                Err(_) => "a staff member".to_string(),
            },
            None => "the clinic".to_string(),
        }
    }

    async fn deliver(
        &self,
        appointment: &Appointment,
        parties: &Participants,
        reason: &str,
        cancelled_by: &str,
        outgoing: &[Outgoing<'_>],
    ) -> Result<usize, NotificationError> {
        let config = self.service.config();
        let mut sent = 0;
        let mut last_error = None;

        for mail in outgoing {
            let context = EmailContext {
                patient_name: &parties.patient_name,
                doctor_name: &parties.doctor_name,
                recipient_name: mail.recipient_name,
                appointment_date: appointment.appointment_date.format("%B %-d, %Y").to_string(),
                appointment_time: parties
                    .start_time
                    .map(|t| t.format("%H:%M").to_string())
                    .unwrap_or_default(),
                reason,
                cancelled_by,
                site_name: &config.site_name,
            };
            let rendered = self.templates.render(mail.template, &context)?;
            let message = EmailMessage::new(&config.default_from_email, mail.to, mail.subject, rendered);

            match self.mailer.send(message).await {
                Ok(()) => sent += 1,
                Err(e) => {
                    error!("Failed to send '{}' to {}: {}", mail.subject, mail.to, e);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) => Err(e),
            None => Ok(sent),
        }
    }
}

#[async_trait]
impl TaskHandler for AppointmentNotifier {
    #[instrument(skip(self, task), fields(task_id = %task.id, kind = %task.kind))]
    async fn handle(&self, task: &Task) -> TaskOutcome {
        let notice: AppointmentNotice = match task.payload_as() {
            Ok(notice) => notice,
            Err(e) => return TaskOutcome::Failed(format!("Malformed payload: {}", e)),
        };

        let Some(appointment) = self.service.appointments.get(notice.appointment_id).await else {
            debug!("Appointment {} no longer exists, skipping {}", notice.appointment_id, task.kind);
            return TaskOutcome::Skipped(format!("Appointment {} not found", notice.appointment_id));
        };

        let parties = match self.service.participants(&appointment).await {
            Ok(parties) => parties,
            Err(e) => return TaskOutcome::Failed(e.to_string()),
        };
        let patient = Recipient {
            email: &parties.patient_email,
            name: &parties.patient_name,
        };
        let doctor = Recipient {
            email: &parties.doctor_email,
            name: &parties.doctor_name,
        };

        let mut reason = appointment.reason.clone();
        let mut cancelled_by = String::new();
        let outgoing = match task.kind.as_str() {
            CONFIRMATION_TASK => vec![
                patient.mail("Appointment Confirmation", "confirmation"),
                doctor.mail("New Appointment Scheduled", "doctor_notification"),
            ],
            CANCELLATION_TASK => {
                reason = appointment.cancellation_reason.clone();
                cancelled_by = self.cancelled_by_name(&appointment).await;
                vec![
                    patient.mail("Appointment Cancelled", "cancellation"),
                    doctor.mail("Appointment Cancelled", "cancellation"),
                ]
            }
            REMINDER_TASK => vec![
                patient.mail("Appointment Reminder", "reminder"),
                doctor.mail("Appointment Reminder", "reminder"),
            ],
            NO_SHOW_TASK => vec![patient.mail("Missed Appointment Notification", "no_show")],
            other => return TaskOutcome::Failed(format!("Unknown task kind {}", other)),
        };

        match self.deliver(&appointment, &parties, &reason, &cancelled_by, &outgoing).await {
            Ok(sent) => {
                info!("Sent {} email(s) for appointment {}", sent, appointment.id);
                TaskOutcome::Completed(format!("{} email(s) sent", sent))
            }
            Err(e) => TaskOutcome::Failed(e.to_string()),
        }
    }
}
