use thiserror::Error;

/// Errors that are safe to expose to other modules
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationsError {
    #[error("{operation} requires a signed-in user")]
    Unauthenticated { operation: &'static str },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Registration not found: {registration_id}")]
    NotFound { registration_id: String },

    #[error("Failed to fetch registrations: {message}")]
    FetchFailure { message: String },

    #[error("Failed to write registration: {message}")]
    WriteFailure { message: String },

    #[error("Registration store is not available: {message}")]
    InitializationFault { message: String },
}

impl RegistrationsError {
    pub fn unauthenticated(operation: &'static str) -> Self {
        Self::Unauthenticated { operation }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(registration_id: impl Into<String>) -> Self {
        Self::NotFound {
            registration_id: registration_id.into(),
        }
    }

    pub fn fetch_failure(message: impl Into<String>) -> Self {
        Self::FetchFailure {
            message: message.into(),
        }
    }

    pub fn write_failure(message: impl Into<String>) -> Self {
        Self::WriteFailure {
            message: message.into(),
        }
    }

    pub fn initialization_fault(message: impl Into<String>) -> Self {
        Self::InitializationFault {
            message: message.into(),
        }
    }
}
