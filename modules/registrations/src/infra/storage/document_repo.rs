//! Document-store-backed repository implementation for the domain port.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use modkit_docstore::{Document, DocumentStore};
use serde_json::Value;
use tracing::warn;

use crate::contract::model::Registration;
use crate::domain::repo::RegistrationsRepository;
use crate::infra::storage::mapper::{
    checked_in_fields, document_to_registration, registration_to_body, USER_ID_FIELD,
};

/// Registrations stored as documents keyed by registration id.
pub struct DocumentRegistrationsRepository {
    store: Arc<dyn DocumentStore>,
    collection: String,
}

impl DocumentRegistrationsRepository {
    pub fn new(store: Arc<dyn DocumentStore>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
        }
    }

    /// Malformed documents never reach the working set.
    fn decode_all(&self, docs: Vec<Document>) -> Vec<Registration> {
        docs.into_iter()
            .filter_map(|doc| match document_to_registration(doc) {
                Ok(r) => Some(r),
                Err(e) => {
                    warn!(collection = %self.collection, error = %format!("{e:#}"), "Skipping malformed registration");
                    None
                }
            })
            .collect()
    }
}

#[async_trait]
impl RegistrationsRepository for DocumentRegistrationsRepository {
    async fn list_all(&self) -> anyhow::Result<Vec<Registration>> {
        let docs = self
            .store
            .get_all(&self.collection)
            .await
            .context("list_all failed")?;
        Ok(self.decode_all(docs))
    }

    async fn list_by_user(&self, user_id: &str) -> anyhow::Result<Vec<Registration>> {
        let docs = self
            .store
            .get_where(
                &self.collection,
                USER_ID_FIELD,
                &Value::String(user_id.to_string()),
            )
            .await
            .context("list_by_user failed")?;
        Ok(self.decode_all(docs))
    }

    async fn put(&self, r: &Registration) -> anyhow::Result<()> {
        let body = registration_to_body(r)?;
        self.store
            .put(&self.collection, &r.id, body)
            .await
            .context("put failed")?;
        Ok(())
    }

    async fn mark_checked_in(&self, id: &str, at: DateTime<Utc>) -> anyhow::Result<bool> {
        match self
            .store
            .patch(&self.collection, id, checked_in_fields(at))
            .await
        {
            Ok(()) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e).context("mark_checked_in failed"),
        }
    }
}
