//! Error types for the contact-card library

use thiserror::Error;

/// Result type for contact-card operations
pub type Result<T> = std::result::Result<T, CardError>;

#[derive(Error, Debug)]
pub enum CardError {
    /// No contact record with this id
    #[error("Contact record not found: {0}")]
    NotFound(String),

    /// Content store failure (wraps rusqlite::Error)
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// CSV import failure
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CardError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, CardError::NotFound(_))
    }
}
