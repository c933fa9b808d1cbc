use thiserror::Error;
use uuid::Uuid;

use shared_database::DbError;
use shared_models::error::AppError;

pub const SIBLING_SLUG_CONSTRAINT: &str = "pages_sibling_slug";
pub const SITE_ROOT_CONSTRAINT: &str = "pages_site_root";

#[derive(Error, Debug)]
pub enum ContentError {
    #[error("Page {0} not found")]
    NotFound(Uuid),

    #[error("No page is published at {0}")]
    PageNotFound(String),

    #[error("{message}")]
    Invalid { field: &'static str, message: String },

    #[error("A sibling page already uses this slug")]
    SlugTaken,

    #[error("{0}")]
    Forbidden(String),

    #[error("Template error: {0}")]
    Render(#[from] tera::Error),

    #[error(transparent)]
    Doctor(#[from] doctor_cell::DoctorError),

    #[error(transparent)]
    Database(DbError),
}

impl ContentError {
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        ContentError::Invalid {
            field,
            message: message.into(),
        }
    }
}

impl From<DbError> for ContentError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { id, .. } => ContentError::NotFound(id),
            e if e.is_unique_violation(SIBLING_SLUG_CONSTRAINT) => ContentError::SlugTaken,
            e if e.is_unique_violation(SITE_ROOT_CONSTRAINT) => {
                ContentError::invalid("parent_id", "The site already has a root page")
            }
            e => ContentError::Database(e),
        }
    }
}

impl From<ContentError> for AppError {
    fn from(err: ContentError) -> Self {
        match err {
            ContentError::NotFound(_) | ContentError::PageNotFound(_) => AppError::NotFound(err.to_string()),
            ContentError::Invalid { field, message } => AppError::field(field, message),
            ContentError::SlugTaken => AppError::conflict_on("slug", err.to_string()),
            ContentError::Forbidden(message) => AppError::Forbidden(message),
            ContentError::Render(e) => AppError::Internal(e.to_string()),
            ContentError::Doctor(e) => e.into(),
            ContentError::Database(e) => AppError::Database(e.to_string()),
        }
    }
}
