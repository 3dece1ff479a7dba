use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;

use crate::contract::{
    client::RegistrationsApi,
    error::RegistrationsError,
    model::{
        AttendanceOutcome, AttendanceSummary, RefreshOutcome, RegisterOutcome, Registration,
        RegistrationsSnapshot,
    },
};
use crate::domain::service::Service;

/// Local implementation of the RegistrationsApi trait that delegates to the domain service
pub struct RegistrationsLocalClient {
    service: Arc<Service>,
}

impl RegistrationsLocalClient {
    pub fn new(service: Arc<Service>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl RegistrationsApi for RegistrationsLocalClient {
    async fn refresh(&self) -> Result<RefreshOutcome, RegistrationsError> {
        self.service.refresh().await.map_err(Into::into)
    }

    async fn register_for_event(
        &self,
        event_id: &str,
    ) -> Result<RegisterOutcome, RegistrationsError> {
        self.service
            .register_for_event(event_id)
            .await
            .map_err(Into::into)
    }

    async fn mark_attendance(
        &self,
        registration_id: &str,
    ) -> Result<AttendanceOutcome, RegistrationsError> {
        self.service
            .mark_attendance(registration_id)
            .await
            .map_err(Into::into)
    }

    fn is_user_registered(&self, event_id: &str) -> bool {
        self.service.is_user_registered(event_id)
    }

    fn user_registrations(&self) -> Vec<Registration> {
        self.service.snapshot().user_registrations()
    }

    fn all_registrations(&self) -> Vec<Registration> {
        self.service.snapshot().all_registrations()
    }

    fn loading(&self) -> bool {
        self.service.snapshot().loading()
    }

    fn registrations_for_event(&self, event_id: &str) -> Vec<Registration> {
        self.service.snapshot().registrations_for_event(event_id)
    }

    fn attendance_summary(&self, event_id: &str) -> AttendanceSummary {
        self.service.snapshot().attendance_summary(event_id)
    }

    fn snapshot(&self) -> RegistrationsSnapshot {
        self.service.snapshot()
    }

    fn subscribe(&self) -> watch::Receiver<RegistrationsSnapshot> {
        self.service.subscribe()
    }
}
