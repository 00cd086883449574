use crate::shared::error::AppError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Document not found: {collection}/{id}")]
    DocumentNotFound { collection: String, id: String },

    #[error("Cursor document not found: {0}")]
    CursorNotFound(String),

    #[error("Document already exists: {collection}/{id}")]
    DuplicateId { collection: String, id: String },

    #[error("Malformed document {id}: {reason}")]
    Malformed { id: String, reason: String },

    #[error("Unsupported filter value for field {0}")]
    UnsupportedFilter(String),

    #[error("Invalid timestamp for document {0}")]
    InvalidTimestamp(String),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DocumentNotFound { .. } | StoreError::CursorNotFound(_) => {
                AppError::NotFound(err.to_string())
            }
            StoreError::DuplicateId { .. } | StoreError::UnsupportedFilter(_) => {
                AppError::InvalidInput(err.to_string())
            }
            StoreError::Malformed { .. } | StoreError::InvalidTimestamp(_) => {
                AppError::DeserializationError(err.to_string())
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
