//! ModKit document store.
//!
//! A small document-database contract (collections of JSON objects addressed by
//! key) with two engines:
//! - `memory://`: process-local [`MemoryDocumentStore`]
//! - `sqlite://path` or `sqlite::memory:`: [`SeaDocumentStore`], SeaORM over SQLite
//!
//! No transactions, listeners or pagination are exposed; reads are point-in-time
//! snapshots returned in ascending key order.
//!
//! # Example
//! ```rust,no_run
//! # async fn demo() -> modkit_docstore::Result<()> {
//! use modkit_docstore::{connect, ConnectOpts};
//!
//! let store = connect("memory://", ConnectOpts::default()).await?;
//! store.put("registrations", "u1-e1", serde_json::json!({"userId": "u1"})).await?;
//! let docs = store.get_all("registrations").await?;
//! assert_eq!(docs.len(), 1);
//! # Ok(()) }
//! ```

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub mod dsn;
pub mod memory;
pub mod sea;

pub use dsn::{detect_backend, Backend};
pub use memory::MemoryDocumentStore;
pub use sea::SeaDocumentStore;

/// Library-local result type.
pub type Result<T> = std::result::Result<T, DocStoreError>;

/// Typed error for document store engines.
#[derive(Debug, Error)]
pub enum DocStoreError {
    #[error("document not found: {collection}/{key}")]
    NotFound { collection: String, key: String },

    #[error("invalid document: {0}")]
    InvalidDocument(String),

    #[error("unsupported DSN: {0}")]
    UnsupportedDsn(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Backend(#[from] sea_orm::DbErr),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DocStoreError {
    pub fn not_found(collection: &str, key: &str) -> Self {
        Self::NotFound {
            collection: collection.to_string(),
            key: key.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// A stored document: its key within the collection and its JSON object body.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub key: String,
    pub body: Value,
}

/// Document database contract.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Every document of the collection.
    async fn get_all(&self, collection: &str) -> Result<Vec<Document>>;

    /// Documents whose top-level `field` equals `value`.
    async fn get_where(&self, collection: &str, field: &str, value: &Value)
        -> Result<Vec<Document>>;

    /// Full upsert: the stored body is replaced by `body`.
    async fn put(&self, collection: &str, key: &str, body: Value) -> Result<()>;

    /// Merge the named top-level fields into an existing document.
    /// Fails with [`DocStoreError::NotFound`] if the key does not exist.
    async fn patch(&self, collection: &str, key: &str, fields: Map<String, Value>) -> Result<()>;
}

/// Connection options shared by the engines; each applies the subset it supports.
#[derive(Clone, Debug)]
pub struct ConnectOpts {
    /// Maximum number of pooled connections (file databases only).
    pub max_conns: Option<u32>,
    /// SQLite busy timeout.
    pub busy_timeout: Option<Duration>,
    /// Timeout to acquire a pooled connection.
    pub acquire_timeout: Option<Duration>,
    /// Base directory for relative sqlite paths; the working directory if `None`.
    pub base_dir: Option<PathBuf>,
    /// For SQLite file DSNs, create parent directories if missing.
    pub create_sqlite_dirs: bool,
}

impl Default for ConnectOpts {
    fn default() -> Self {
        Self {
            max_conns: Some(10),
            busy_timeout: Some(Duration::from_millis(5000)),
            acquire_timeout: Some(Duration::from_secs(30)),
            base_dir: None,
            create_sqlite_dirs: true,
        }
    }
}

/// Open a document store for `dsn`, running migrations where the engine needs them.
pub async fn connect(dsn: &str, opts: ConnectOpts) -> Result<Arc<dyn DocumentStore>> {
    match detect_backend(dsn)? {
        Backend::Memory => {
            tracing::info!("Using in-memory document store");
            Ok(Arc::new(MemoryDocumentStore::new()))
        }
        Backend::Sqlite => {
            let store = SeaDocumentStore::connect(dsn, &opts).await?;
            Ok(Arc::new(store))
        }
    }
}

// ---- helpers shared by the engines ----

pub(crate) fn into_object(body: Value) -> Result<Map<String, Value>> {
    match body {
        Value::Object(map) => Ok(map),
        other => Err(DocStoreError::InvalidDocument(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

pub(crate) fn field_equals(body: &Map<String, Value>, field: &str, value: &Value) -> bool {
    body.get(field) == Some(value)
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn into_object_rejects_non_objects() {
        assert!(into_object(json!({"a": 1})).is_ok());
        let err = into_object(json!([1, 2])).unwrap_err();
        assert!(matches!(err, DocStoreError::InvalidDocument(ref m) if m.contains("array")));
    }

    #[test]
    fn field_equality_is_exact() {
        let body = into_object(json!({"userId": "u1", "n": 1})).unwrap();
        assert!(field_equals(&body, "userId", &json!("u1")));
        assert!(!field_equals(&body, "userId", &json!("u2")));
        assert!(!field_equals(&body, "n", &json!("1")));
        assert!(!field_equals(&body, "missing", &Value::Null));
    }

    #[tokio::test]
    async fn connect_rejects_unknown_scheme() {
        let err = connect("postgres://localhost/app", ConnectOpts::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, DocStoreError::UnsupportedDsn(_)));
    }
}
