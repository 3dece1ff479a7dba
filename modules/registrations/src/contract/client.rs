use std::sync::Arc;

use async_trait::async_trait;
use modkit::ClientHub;
use tokio::sync::watch;

use crate::contract::error::RegistrationsError;
use crate::contract::model::{
    AttendanceOutcome, AttendanceSummary, RefreshOutcome, RegisterOutcome, Registration,
    RegistrationsSnapshot,
};

/// Public API trait for the registrations module that other modules can use
#[async_trait]
pub trait RegistrationsApi: Send + Sync {
    /// Refetch the working set for the current identity.
    async fn refresh(&self) -> Result<RefreshOutcome, RegistrationsError>;

    /// Register the current user for `event_id`.
    async fn register_for_event(&self, event_id: &str)
        -> Result<RegisterOutcome, RegistrationsError>;

    /// Check in the registration `registration_id`.
    async fn mark_attendance(
        &self,
        registration_id: &str,
    ) -> Result<AttendanceOutcome, RegistrationsError>;

    /// Whether the current user holds a registration for `event_id`. Never touches the database.
    fn is_user_registered(&self, event_id: &str) -> bool;

    /// Records owned by the current user.
    fn user_registrations(&self) -> Vec<Registration>;

    /// Full working set for organizers, empty otherwise.
    fn all_registrations(&self) -> Vec<Registration>;

    fn loading(&self) -> bool;

    /// Organizer view of one event's registrations.
    fn registrations_for_event(&self, event_id: &str) -> Vec<Registration>;

    fn attendance_summary(&self, event_id: &str) -> AttendanceSummary;

    /// Current state, viewed by the current identity.
    fn snapshot(&self) -> RegistrationsSnapshot;

    /// Change feed; a new value is published after every state change.
    fn subscribe(&self) -> watch::Receiver<RegistrationsSnapshot>;
}

/// Fetch the registrations API from the hub.
///
/// Asking before the module has been initialised is a wiring bug and is
/// reported as [`RegistrationsError::InitializationFault`].
pub fn client(hub: &ClientHub) -> Result<Arc<dyn RegistrationsApi>, RegistrationsError> {
    hub.get::<dyn RegistrationsApi>()
        .map_err(|e| RegistrationsError::initialization_fault(e.to_string()))
}
