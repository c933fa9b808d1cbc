use thiserror::Error;

use shared_models::error::AppError;

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Mail delivery failed: {0}")]
    MailError(String),

    #[error("Template error: {0}")]
    TemplateError(#[from] tera::Error),

    #[error("Redis connection error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("Redis pool error: {0}")]
    PoolError(String),

    #[error("Mail API request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl From<NotificationError> for AppError {
    fn from(err: NotificationError) -> Self {
        match err {
            NotificationError::MailError(_) | NotificationError::HttpError(_) => {
                AppError::ExternalService(err.to_string())
            }
            _ => AppError::Internal(err.to_string()),
        }
    }
}
