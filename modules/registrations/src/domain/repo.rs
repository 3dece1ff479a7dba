use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::contract::model::Registration;

/// Port for the domain layer: persistence operations the store needs.
/// Object-safe and async-friendly via `async_trait`.
#[async_trait]
pub trait RegistrationsRepository: Send + Sync {
    /// Every registration, ascending by id.
    async fn list_all(&self) -> anyhow::Result<Vec<Registration>>;
    /// Registrations owned by `user_id`, ascending by id.
    async fn list_by_user(&self, user_id: &str) -> anyhow::Result<Vec<Registration>>;
    /// Upsert under `r.id`; an existing record is overwritten.
    async fn put(&self, r: &Registration) -> anyhow::Result<()>;
    /// Set the checked-in fields. Returns false if no record has that id.
    async fn mark_checked_in(&self, id: &str, at: DateTime<Utc>) -> anyhow::Result<bool>;
}
