use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("{table} row {id} not found")]
    NotFound { table: String, id: Uuid },

    #[error("{table} row {id} already exists")]
    DuplicateId { table: String, id: Uuid },

    #[error("unique constraint {constraint} violated on {table}")]
    UniqueViolation { table: String, constraint: &'static str },

    #[error("snapshot error on {table}: {message}")]
    Persistence { table: String, message: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DbError {
    pub fn is_unique_violation(&self, constraint: &str) -> bool {
        matches!(self, DbError::UniqueViolation { constraint: c, .. } if *c == constraint)
    }
}
