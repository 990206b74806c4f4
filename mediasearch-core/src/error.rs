use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum MediaSearchError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Hash error: {0}")]
    Hash(String),

    #[error("Comparison error: {0}")]
    Comparison(String),

    #[error("Fetch error: {0}")]
    Fetch(String),
}

impl MediaSearchError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }
}

impl From<StoreError> for MediaSearchError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateKey(key) => Self::Conflict(format!("ref already exists: {key}")),
            other => Self::Storage(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, MediaSearchError>;
