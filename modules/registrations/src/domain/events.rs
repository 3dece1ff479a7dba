use chrono::{DateTime, Utc};

/// Transport-agnostic domain event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationEvent {
    Registered {
        registration_id: String,
        user_id: String,
        event_id: String,
        at: DateTime<Utc>,
    },
    CheckedIn {
        registration_id: String,
        by: String,
        at: DateTime<Utc>,
    },
}
