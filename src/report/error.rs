//! Report error taxonomy

use thiserror::Error;

use crate::db::DbError;

/// Everything that can stop a report from being produced
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("{field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Render failed: {0}")]
    Render(String),

    #[error("Could not store report: {0}")]
    Storage(#[from] std::io::Error),

    #[error(transparent)]
    Database(#[from] DbError),
}

impl ReportError {
    pub fn missing(field: &'static str) -> Self {
        ReportError::Validation {
            field,
            message: format!("{} is required", field),
        }
    }

    pub fn render(err: impl std::fmt::Display) -> Self {
        ReportError::Render(err.to_string())
    }
}

pub type ReportResult<T> = Result<T, ReportError>;
