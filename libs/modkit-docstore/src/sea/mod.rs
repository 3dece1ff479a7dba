//! SeaORM-backed document store over SQLite.
//!
//! Documents live in a single `documents` table keyed by `(collection, key)`;
//! bodies are stored as JSON text. Equality filters are applied after loading
//! the collection, so `get_where` costs a collection scan.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    SqlxSqliteConnector, TransactionTrait,
};
use sea_orm_migration::MigratorTrait;
use serde_json::{Map, Value};
use sqlx::sqlite::SqlitePoolOptions;

use crate::dsn::{absolutize_sqlite_dsn, is_sqlite_memory};
use crate::{
    field_equals, into_object, ConnectOpts, DocStoreError, Document, DocumentStore, Result,
};

pub mod entity;
pub mod migrations;

use entity::{ActiveModel as DocumentAM, Column, Entity as DocumentEntity, Model as DocumentRow};

/// SeaORM document store. Holds a cheap-to-clone connection handle.
#[derive(Clone)]
pub struct SeaDocumentStore {
    conn: DatabaseConnection,
}

impl SeaDocumentStore {
    /// Wrap an existing connection. Call [`SeaDocumentStore::migrate`] before use.
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Open a SQLite pool for `dsn` and run migrations.
    pub async fn connect(dsn: &str, opts: &ConnectOpts) -> Result<Self> {
        let base_dir = match &opts.base_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir()?,
        };
        let dsn = absolutize_sqlite_dsn(dsn, &base_dir, opts.create_sqlite_dirs)?;
        let memory = is_sqlite_memory(&dsn);

        let mut o = SqlitePoolOptions::new();
        if memory {
            // each connection would get its own private in-memory database
            o = o
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        } else if let Some(n) = opts.max_conns {
            o = o.max_connections(n);
        }
        if let Some(t) = opts.acquire_timeout {
            o = o.acquire_timeout(t);
        }

        let busy_ms = opts.busy_timeout.map(|d| d.as_millis() as u64);
        o = o.after_connect(move |conn, _meta| {
            Box::pin(async move {
                if !memory {
                    sqlx::query("PRAGMA journal_mode = WAL")
                        .execute(&mut *conn)
                        .await?;
                    if let Some(ms) = busy_ms {
                        let stmt = format!("PRAGMA busy_timeout = {ms}");
                        sqlx::query(&stmt).execute(&mut *conn).await?;
                    }
                }
                Ok(())
            })
        });

        tracing::info!(dsn = %dsn, "Connecting document store");
        let pool = o.connect(&dsn).await?;
        let store = Self::new(SqlxSqliteConnector::from_sqlx_sqlite_pool(pool));
        store.migrate().await?;
        Ok(store)
    }

    /// Create or upgrade the `documents` table.
    pub async fn migrate(&self) -> Result<()> {
        migrations::Migrator::up(&self.conn, None).await?;
        tracing::debug!("Document store migrations applied");
        Ok(())
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }

    async fn load_collection(&self, collection: &str) -> Result<Vec<Document>> {
        let rows = DocumentEntity::find()
            .filter(Column::Collection.eq(collection))
            .order_by_asc(Column::Key)
            .all(&self.conn)
            .await?;
        rows.into_iter().map(row_to_document).collect()
    }
}

fn row_to_document(row: DocumentRow) -> Result<Document> {
    let body: Value = serde_json::from_str(&row.body)?;
    Ok(Document { key: row.key, body })
}

#[async_trait]
impl DocumentStore for SeaDocumentStore {
    async fn get_all(&self, collection: &str) -> Result<Vec<Document>> {
        self.load_collection(collection).await
    }

    async fn get_where(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>> {
        let docs = self.load_collection(collection).await?;
        Ok(docs
            .into_iter()
            .filter(|d| {
                d.body
                    .as_object()
                    .is_some_and(|body| field_equals(body, field, value))
            })
            .collect())
    }

    async fn put(&self, collection: &str, key: &str, body: Value) -> Result<()> {
        let body = into_object(body)?;
        let am = DocumentAM {
            collection: Set(collection.to_string()),
            key: Set(key.to_string()),
            body: Set(serde_json::to_string(&body)?),
            updated_at: Set(Utc::now()),
        };
        DocumentEntity::insert(am)
            .on_conflict(
                OnConflict::columns([Column::Collection, Column::Key])
                    .update_columns([Column::Body, Column::UpdatedAt])
                    .to_owned(),
            )
            .exec_without_returning(&self.conn)
            .await?;
        Ok(())
    }

    async fn patch(&self, collection: &str, key: &str, fields: Map<String, Value>) -> Result<()> {
        let txn = self.conn.begin().await?;

        let row = DocumentEntity::find_by_id((collection.to_string(), key.to_string()))
            .one(&txn)
            .await?
            .ok_or_else(|| DocStoreError::not_found(collection, key))?;

        let mut body = into_object(serde_json::from_str(&row.body)?)?;
        body.extend(fields);

        let mut am: DocumentAM = row.into();
        am.body = Set(serde_json::to_string(&body)?);
        am.updated_at = Set(Utc::now());
        am.update(&txn).await?;

        txn.commit().await?;
        Ok(())
    }
}
