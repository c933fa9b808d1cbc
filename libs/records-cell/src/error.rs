use thiserror::Error;
use uuid::Uuid;

use shared_database::DbError;
use shared_models::error::AppError;

#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Medical record {0} not found")]
    NotFound(Uuid),

    #[error("{message}")]
    Invalid { field: &'static str, message: String },

    #[error("{0}")]
    Forbidden(String),

    #[error(transparent)]
    Database(DbError),
}

impl RecordError {
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        RecordError::Invalid {
            field,
            message: message.into(),
        }
    }
}

impl From<DbError> for RecordError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { id, .. } => RecordError::NotFound(id),
            e => RecordError::Database(e),
        }
    }
}

impl From<RecordError> for AppError {
    fn from(err: RecordError) -> Self {
        match err {
            RecordError::NotFound(_) => AppError::NotFound(err.to_string()),
            RecordError::Invalid { field, message } => AppError::field(field, message),
            RecordError::Forbidden(message) => AppError::Forbidden(message),
            RecordError::Database(e) => AppError::Database(e.to_string()),
        }
    }
}
