use thiserror::Error;
use uuid::Uuid;

use auth_cell::AccountError;
use doctor_cell::DoctorError;
use patient_cell::PatientError;
use shared_database::DbError;
use shared_models::error::AppError;

use crate::AppointmentStatus;

#[derive(Error, Debug)]
pub enum AppointmentError {
    #[error("Appointment {0} not found")]
    NotFound(Uuid),

    #[error("{message}")]
    Invalid { field: &'static str, message: String },

    #[error("{0}")]
    Forbidden(String),

    #[error("Cannot move appointment from {from} to {to}")]
    InvalidStatusTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("This time slot has already been booked.")]
    SlotTaken,

    #[error(transparent)]
    Doctor(#[from] DoctorError),

    #[error(transparent)]
    Patient(#[from] PatientError),

    #[error(transparent)]
    Account(#[from] AccountError),

    #[error(transparent)]
    Database(DbError),
}

impl AppointmentError {
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        AppointmentError::Invalid {
            field,
            message: message.into(),
        }
    }

    /// Field-scoped error carrying a lifecycle message such as
    /// "Cannot cancel a completed appointment.".
    pub fn status(message: impl Into<String>) -> Self {
        Self::invalid("status", message)
    }
}

impl From<DbError> for AppointmentError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { id, .. } => AppointmentError::NotFound(id),
            e if e.is_unique_violation("appointments_slot") => AppointmentError::SlotTaken,
            e => AppointmentError::Database(e),
        }
    }
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::NotFound(_) => AppError::NotFound(err.to_string()),
            AppointmentError::Invalid { field, message } => AppError::field(field, message),
            AppointmentError::Forbidden(message) => AppError::Forbidden(message),
            AppointmentError::InvalidStatusTransition { .. } => AppError::field("status", err.to_string()),
            AppointmentError::SlotTaken => AppError::conflict_on("time_slot", err.to_string()),
            AppointmentError::Doctor(e) => e.into(),
            AppointmentError::Patient(e) => e.into(),
            AppointmentError::Account(e) => e.into(),
            AppointmentError::Database(e) => AppError::Database(e.to_string()),
        }
    }
}
