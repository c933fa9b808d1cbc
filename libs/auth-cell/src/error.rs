use thiserror::Error;
use uuid::Uuid;

use shared_database::DbError;
use shared_models::error::AppError;

#[derive(Error, Debug)]
pub enum AccountError {
    #[error("An account with this email already exists")]
    EmailTaken,

    #[error("Enter a valid email address")]
    InvalidEmail,

    #[error("Password must be at least {0} characters")]
    WeakPassword(usize),

    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Account is inactive")]
    Inactive,

    #[error("Account {0} not found")]
    NotFound(Uuid),

    #[error("Password hashing failed: {0}")]
    Hash(String),

    #[error("Token error: {0}")]
    Token(String),

    #[error(transparent)]
    Database(DbError),
}

impl From<DbError> for AccountError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { id, .. } => AccountError::NotFound(id),
            err if err.is_unique_violation("accounts_email") => AccountError::EmailTaken,
            err => AccountError::Database(err),
        }
    }
}

impl From<AccountError> for AppError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::EmailTaken => AppError::field("email", err.to_string()),
            AccountError::InvalidEmail => AppError::field("email", err.to_string()),
            AccountError::WeakPassword(_) => AppError::field("password", err.to_string()),
            AccountError::MissingField(field) => AppError::field(field, err.to_string()),
            AccountError::InvalidCredentials | AccountError::Inactive => AppError::Auth(err.to_string()),
            AccountError::NotFound(_) => AppError::NotFound(err.to_string()),
            AccountError::Hash(_) | AccountError::Token(_) => AppError::Internal(err.to_string()),
            AccountError::Database(e) => AppError::Database(e.to_string()),
        }
    }
}
