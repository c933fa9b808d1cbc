use thiserror::Error;
use uuid::Uuid;

use auth_cell::AccountError;
use shared_database::DbError;
use shared_models::error::AppError;

#[derive(Error, Debug)]
pub enum PatientError {
    #[error("Patient {0} not found")]
    NotFound(Uuid),

    #[error("{message}")]
    Invalid { field: &'static str, message: String },

    #[error("{0}")]
    Forbidden(String),

    #[error("Patient {0} still has appointments")]
    HasAppointments(Uuid),

    #[error(transparent)]
    Account(#[from] AccountError),

    #[error(transparent)]
    Database(DbError),
}

impl PatientError {
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        PatientError::Invalid {
            field,
            message: message.into(),
        }
    }
}

impl From<DbError> for PatientError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { id, .. } => PatientError::NotFound(id),
            e if e.is_unique_violation("patients_user") => {
                PatientError::invalid("user_id", "This user already has a patient profile")
            }
            e => PatientError::Database(e),
        }
    }
}

impl From<PatientError> for AppError {
    fn from(err: PatientError) -> Self {
        match err {
            PatientError::NotFound(_) => AppError::NotFound(err.to_string()),
            PatientError::Invalid { field, message } => AppError::field(field, message),
            PatientError::Forbidden(message) => AppError::Forbidden(message),
            PatientError::HasAppointments(_) => AppError::Conflict(err.to_string()),
            PatientError::Account(e) => e.into(),
            PatientError::Database(e) => AppError::Database(e.to_string()),
        }
    }
}
