use thiserror::Error;
use uuid::Uuid;

use auth_cell::AccountError;
use shared_database::DbError;
use shared_models::error::AppError;

#[derive(Error, Debug)]
pub enum DoctorError {
    #[error("{0} {1} not found")]
    NotFound(&'static str, Uuid),

    #[error("{message}")]
    Invalid { field: &'static str, message: String },

    #[error("{0}")]
    Forbidden(String),

    #[error("Time slot {0} is held by an active appointment")]
    SlotInUse(Uuid),

    #[error("Doctor {0} still has appointments")]
    HasAppointments(Uuid),

    #[error(transparent)]
    Account(#[from] AccountError),

    #[error(transparent)]
    Database(DbError),
}

impl DoctorError {
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        DoctorError::Invalid {
            field,
            message: message.into(),
        }
    }
}

impl From<DbError> for DoctorError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { id, .. } => DoctorError::NotFound("Record", id),
            e if e.is_unique_violation("doctors_user") => {
                DoctorError::invalid("user_id", "This user already has a doctor profile")
            }
            e if e.is_unique_violation("doctors_license") => {
                DoctorError::invalid("license_number", "A doctor with this license number already exists")
            }
            e if e.is_unique_violation("specializations_name") => {
                DoctorError::invalid("name", "A specialization with this name already exists")
            }
            e if e.is_unique_violation("time_slots_window") => {
                DoctorError::invalid("start_time", "The doctor already has a slot for this window")
            }
            e => DoctorError::Database(e),
        }
    }
}

impl From<DoctorError> for AppError {
    fn from(err: DoctorError) -> Self {
        match err {
            DoctorError::NotFound(..) => AppError::NotFound(err.to_string()),
            DoctorError::Invalid { field, message } => AppError::field(field, message),
            DoctorError::Forbidden(message) => AppError::Forbidden(message),
            DoctorError::SlotInUse(_) | DoctorError::HasAppointments(_) => AppError::Conflict(err.to_string()),
            DoctorError::Account(e) => e.into(),
            DoctorError::Database(e) => AppError::Database(e.to_string()),
        }
    }
}
