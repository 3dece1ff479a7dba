#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use modkit_docstore::{DocStoreError, Document, DocumentStore, MemoryDocumentStore};
use serde_json::{Map, Value};

use registrations::contract::model::Principal;
use registrations::domain::events::RegistrationEvent;
use registrations::domain::service::{Service, ServiceConfig};
use registrations::infra::events::BroadcastEventPublisher;
use registrations::infra::storage::DocumentRegistrationsRepository;
use registrations::SessionIdentityProvider;

pub const COLLECTION: &str = "registrations";

/// Memory store that counts calls and can be told to fail or stall.
#[derive(Default)]
pub struct ProbeStore {
    inner: MemoryDocumentStore,
    pub reads: AtomicUsize,
    pub writes: AtomicUsize,
    pub fail_reads: AtomicBool,
    pub fail_writes: AtomicBool,
    /// Reads sleep this long (milliseconds) before answering.
    pub read_delay_ms: AtomicUsize,
}

impl ProbeStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn set_fail_reads(&self, on: bool) {
        self.fail_reads.store(on, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, on: bool) {
        self.fail_writes.store(on, Ordering::SeqCst);
    }

    pub fn set_read_delay(&self, d: Duration) {
        self.read_delay_ms
            .store(d.as_millis() as usize, Ordering::SeqCst);
    }

    async fn before_read(&self) -> Result<(), DocStoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let delay = self.read_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay as u64)).await;
        }
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(DocStoreError::Io(std::io::Error::other("simulated read failure")));
        }
        Ok(())
    }

    fn before_write(&self) -> Result<(), DocStoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DocStoreError::Io(std::io::Error::other("simulated write failure")));
        }
        Ok(())
    }

    /// Write straight to the underlying store, bypassing counters.
    pub async fn seed(&self, key: &str, body: Value) {
        self.inner.put(COLLECTION, key, body).await.unwrap();
    }

    pub async fn raw_all(&self) -> Vec<Document> {
        self.inner.get_all(COLLECTION).await.unwrap()
    }
}

#[async_trait]
impl DocumentStore for ProbeStore {
    async fn get_all(&self, collection: &str) -> modkit_docstore::Result<Vec<Document>> {
        self.before_read().await?;
        self.inner.get_all(collection).await
    }

    async fn get_where(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> modkit_docstore::Result<Vec<Document>> {
        self.before_read().await?;
        self.inner.get_where(collection, field, value).await
    }

    async fn put(&self, collection: &str, key: &str, body: Value) -> modkit_docstore::Result<()> {
        self.before_write()?;
        self.inner.put(collection, key, body).await
    }

    async fn patch(
        &self,
        collection: &str,
        key: &str,
        fields: Map<String, Value>,
    ) -> modkit_docstore::Result<()> {
        self.before_write()?;
        self.inner.patch(collection, key, fields).await
    }
}

pub struct Harness {
    pub store: Arc<ProbeStore>,
    pub identity: Arc<SessionIdentityProvider>,
    pub events: Arc<BroadcastEventPublisher<RegistrationEvent>>,
    pub service: Arc<Service>,
}

pub fn harness_with(identity: SessionIdentityProvider, config: ServiceConfig) -> Harness {
    harness_on(ProbeStore::new(), identity, config)
}

pub fn harness_on(
    store: Arc<ProbeStore>,
    identity: SessionIdentityProvider,
    config: ServiceConfig,
) -> Harness {
    let identity = Arc::new(identity);
    let events = Arc::new(BroadcastEventPublisher::new(32));
    let repo = DocumentRegistrationsRepository::new(store.clone(), COLLECTION);
    let service = Arc::new(Service::new(
        Arc::new(repo),
        identity.clone(),
        events.clone(),
        config,
    ));
    Harness {
        store,
        identity,
        events,
        service,
    }
}

pub fn student(id: &str) -> SessionIdentityProvider {
    SessionIdentityProvider::signed_in(Principal::student(id))
}

pub fn organizer(id: &str) -> SessionIdentityProvider {
    SessionIdentityProvider::signed_in(Principal::organizer(id))
}

pub fn registration_doc(user: &str, event: &str) -> Value {
    serde_json::json!({
        "id": format!("{user}-{event}"),
        "userId": user,
        "eventId": event,
        "registrationDate": "2025-03-01T10:00:00Z",
        "checkedIn": false
    })
}
