use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_models::auth::{Role, User};

use crate::services::booking::{AppointmentService, BookingFields};
use crate::{
    Appointment, AppointmentError, AppointmentNotice, AppointmentStatus, CancelAppointmentRequest,
    CompleteAppointmentRequest, RescheduleAppointmentRequest, CANCELLATION_TASK,
};

const RESCHEDULE_FIELDS: BookingFields = BookingFields {
    date: "new_date",
    slot: "new_time_slot",
};

#[derive(Debug, Clone, Copy, Default)]
pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Validate that a status transition is allowed
    pub fn validate_status_transition(
        &self,
        current_status: AppointmentStatus,
        new_status: AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        debug!("Validating status transition from {} to {}", current_status, new_status);

        if !self.valid_transitions(current_status).contains(&new_status) {
            warn!("Invalid status transition attempted: {} -> {}", current_status, new_status);
            return Err(AppointmentError::InvalidStatusTransition {
                from: current_status,
                to: new_status,
            });
        }
        Ok(())
    }

    pub fn valid_transitions(&self, current_status: AppointmentStatus) -> &'static [AppointmentStatus] {
        match current_status {
            AppointmentStatus::Scheduled => &[
                AppointmentStatus::Confirmed,
                AppointmentStatus::Cancelled,
                AppointmentStatus::NoShow,
            ],
            AppointmentStatus::Confirmed => &[
                AppointmentStatus::InProgress,
                AppointmentStatus::Completed,
                AppointmentStatus::Cancelled,
                AppointmentStatus::NoShow,
            ],
            AppointmentStatus::InProgress => &[AppointmentStatus::Completed, AppointmentStatus::Cancelled],
            AppointmentStatus::NoShow => &[AppointmentStatus::Cancelled],
            // Terminal states - no transitions allowed
            AppointmentStatus::Completed | AppointmentStatus::Cancelled => &[],
        }
    }

    pub fn check_cancel(&self, current_status: AppointmentStatus) -> Result<(), AppointmentError> {
        match current_status {
            AppointmentStatus::Completed => Err(AppointmentError::status("Cannot cancel a completed appointment.")),
            AppointmentStatus::Cancelled => Err(AppointmentError::status("Appointment is already cancelled.")),
            status => self.validate_status_transition(status, AppointmentStatus::Cancelled),
        }
    }

    pub fn check_complete(&self, current_status: AppointmentStatus) -> Result<(), AppointmentError> {
        if !matches!(current_status, AppointmentStatus::Confirmed | AppointmentStatus::InProgress) {
            return Err(AppointmentError::status(
                "Only confirmed or in-progress appointments can be completed.",
            ));
        }
        Ok(())
    }

    /// Rescheduling keeps the status, so anything not yet finished may move.
    pub fn check_reschedule(&self, current_status: AppointmentStatus) -> Result<(), AppointmentError> {
        if current_status.is_terminal() {
            return Err(AppointmentError::status(format!(
                "Cannot reschedule a {} appointment.",
                current_status.as_str().replace('_', " ")
            )));
        }
        Ok(())
    }
}

fn ensure_clinician(user: &User, action: &str) -> Result<(), AppointmentError> {
    if user.role == Role::Patient {
        return Err(AppointmentError::Forbidden(format!(
            "Only doctors and staff can {} appointments",
            action
        )));
    }
    Ok(())
}

impl AppointmentService {
    pub async fn confirm(&self, user: &User, id: Uuid) -> Result<Appointment, AppointmentError> {
        ensure_clinician(user, "confirm")?;
        self.transition(user, id, AppointmentStatus::Confirmed).await
    }

    pub async fn start(&self, user: &User, id: Uuid) -> Result<Appointment, AppointmentError> {
        ensure_clinician(user, "start")?;
        self.transition(user, id, AppointmentStatus::InProgress).await
    }

    async fn transition(&self, user: &User, id: Uuid, to: AppointmentStatus) -> Result<Appointment, AppointmentError> {
        self.get_for(user, id).await?;
        let lifecycle = self.lifecycle;
        let appointment = self
            .appointments
            .modify(id, |a: &mut Appointment| {
                lifecycle.validate_status_transition(a.status, to)?;
                a.status = to;
                a.updated_at = Utc::now();
                Ok::<(), AppointmentError>(())
            })
            .await?;

        info!("Appointment {} is now {}", id, to);
        Ok(appointment)
    }

    pub async fn cancel(
        &self,
        user: &User,
        id: Uuid,
        request: CancelAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        self.get_for(user, id).await?;

        let reason = request.cancellation_reason.trim().to_string();
        if reason.is_empty() {
            return Err(AppointmentError::invalid("cancellation_reason", "Cancellation reason is required."));
        }

        let lifecycle = self.lifecycle;
        let appointment = self
            .appointments
            .modify(id, |a: &mut Appointment| {
                lifecycle.check_cancel(a.status)?;
                a.status = AppointmentStatus::Cancelled;
                a.cancelled_by = Some(user.id);
                a.cancellation_reason = reason;
                a.updated_at = Utc::now();
                Ok::<(), AppointmentError>(())
            })
            .await?;

        self.release_slot(appointment.time_slot_id).await;
        info!("Appointment {} cancelled by {}", id, user.id);

        self.producer
            .dispatch(CANCELLATION_TASK, &AppointmentNotice { appointment_id: id })
            .await;
        Ok(appointment)
    }

    /// Only non-empty values overwrite what is already recorded.
    pub async fn complete(
        &self,
        user: &User,
        id: Uuid,
        request: CompleteAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        ensure_clinician(user, "complete")?;
        self.get_for(user, id).await?;

        let lifecycle = self.lifecycle;
        let appointment = self
            .appointments
            .modify(id, |a: &mut Appointment| {
                lifecycle.check_complete(a.status)?;
                a.status = AppointmentStatus::Completed;
                if let Some(notes) = request.notes.filter(|n| !n.trim().is_empty()) {
                    a.notes = notes;
                }
                if let Some(prescription) = request.prescription.filter(|p| !p.trim().is_empty()) {
                    a.prescription = prescription;
                }
                if let Some(date) = request.follow_up_date {
                    a.follow_up_date = Some(date);
                }
                a.updated_at = Utc::now();
                Ok::<(), AppointmentError>(())
            })
            .await?;

        info!("Appointment {} completed", id);
        Ok(appointment)
    }

    /// Every check runs before either slot flag moves.
    pub async fn reschedule(
        &self,
        user: &User,
        id: Uuid,
        request: RescheduleAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.get_for(user, id).await?;
        self.lifecycle.check_reschedule(current.status)?;

        let new_date = request
            .new_date
            .ok_or_else(|| AppointmentError::invalid("new_date", "new_date is required."))?;
        let new_slot_id = request
            .new_time_slot
            .ok_or_else(|| AppointmentError::invalid("new_time_slot", "new_time_slot is required."))?;

        let doctor = self.doctors.get(current.doctor_id).await?;
        let slot = self.doctors.get_slot(new_slot_id).await.map_err(|_| {
            AppointmentError::invalid("new_time_slot", format!("Time slot {} does not exist", new_slot_id))
        })?;

        let today = Utc::now().date_naive();
        self.check_booking(&doctor, &slot, new_date, today, Some(&current), RESCHEDULE_FIELDS)
            .await?;

        let lifecycle = self.lifecycle;
        let appointment = self
            .appointments
            .modify(id, |a: &mut Appointment| {
                lifecycle.check_reschedule(a.status)?;
                a.appointment_date = new_date;
                a.time_slot_id = slot.id;
                a.updated_at = Utc::now();
                Ok::<(), AppointmentError>(())
            })
            .await?;

        if current.time_slot_id != slot.id {
            self.release_slot(current.time_slot_id).await;
            self.doctors.set_slot_availability(slot.id, false).await?;
        }

        info!(
            "Appointment {} moved from {} to {} (slot {})",
            id, current.appointment_date, new_date, slot.id
        );
        Ok(appointment)
    }

    /// Used by the no-show sweep. The slot flag stays as it is.
    pub async fn mark_no_show(&self, id: Uuid) -> Result<Appointment, AppointmentError> {
        let lifecycle = self.lifecycle;
        let appointment = self
            .appointments
            .modify(id, |a: &mut Appointment| {
                lifecycle.validate_status_transition(a.status, AppointmentStatus::NoShow)?;
                a.status = AppointmentStatus::NoShow;
                a.updated_at = Utc::now();
                Ok::<(), AppointmentError>(())
            })
            .await?;

        info!("Appointment {} marked as no-show", id);
        Ok(appointment)
    }
}
