use heshbon_core::{MonthKeyError, ValidationError};
use heshbon_import::NormalizeError;
use thiserror::Error;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// The error surface every service call funnels into. Validation and
/// not-found map to user mistakes; the rest are the system's fault.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{message}")]
    Validation {
        message: String,
        details: Vec<String>,
    },
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation { message: message.into(), details: Vec::new() }
    }
}

impl From<ValidationError> for ServiceError {
    fn from(err: ValidationError) -> Self {
        ServiceError::Validation { message: err.message, details: err.details }
    }
}

impl From<MonthKeyError> for ServiceError {
    fn from(err: MonthKeyError) -> Self {
        ServiceError::validation(err.to_string())
    }
}
