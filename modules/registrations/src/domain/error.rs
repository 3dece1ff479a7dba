use thiserror::Error;

use crate::contract::error::RegistrationsError;

/// Domain-specific errors using thiserror
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("{operation} requires a signed-in user")]
    Unauthenticated { operation: &'static str },

    #[error("Validation failed: {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Registration not found: {id}")]
    RegistrationNotFound { id: String },

    #[error("Fetch failed: {message}")]
    Fetch { message: String },

    #[error("Write failed: {message}")]
    Write { message: String },
}

impl DomainError {
    pub fn unauthenticated(operation: &'static str) -> Self {
        Self::Unauthenticated { operation }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn registration_not_found(id: impl Into<String>) -> Self {
        Self::RegistrationNotFound { id: id.into() }
    }

    pub fn fetch(message: impl Into<String>) -> Self {
        Self::Fetch {
            message: message.into(),
        }
    }

    pub fn write(message: impl Into<String>) -> Self {
        Self::Write {
            message: message.into(),
        }
    }
}

impl From<DomainError> for RegistrationsError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::Unauthenticated { operation } => {
                RegistrationsError::unauthenticated(operation)
            }
            DomainError::Validation { field, message } => {
                RegistrationsError::validation(format!("{field}: {message}"))
            }
            DomainError::RegistrationNotFound { id } => RegistrationsError::not_found(id),
            DomainError::Fetch { message } => RegistrationsError::fetch_failure(message),
            DomainError::Write { message } => RegistrationsError::write_failure(message),
        }
    }
}
