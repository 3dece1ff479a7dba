use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

use crate::{field_equals, into_object, DocStoreError, Document, DocumentStore, Result};

type Collection = BTreeMap<String, Map<String, Value>>;

/// Process-local document store. Contents are lost when the value is dropped.
#[derive(Default)]
pub struct MemoryDocumentStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in `collection`.
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map_or(0, BTreeMap::len)
    }

    fn select<F>(&self, collection: &str, keep: F) -> Vec<Document>
    where
        F: Fn(&Map<String, Value>) -> bool,
    {
        let guard = self.collections.read();
        let Some(docs) = guard.get(collection) else {
            return Vec::new();
        };
        docs.iter()
            .filter(|(_, body)| keep(body))
            .map(|(key, body)| Document {
                key: key.clone(),
                body: Value::Object(body.clone()),
            })
            .collect()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get_all(&self, collection: &str) -> Result<Vec<Document>> {
        Ok(self.select(collection, |_| true))
    }

    async fn get_where(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>> {
        Ok(self.select(collection, |body| field_equals(body, field, value)))
    }

    async fn put(&self, collection: &str, key: &str, body: Value) -> Result<()> {
        let body = into_object(body)?;
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .insert(key.to_string(), body);
        Ok(())
    }

    async fn patch(&self, collection: &str, key: &str, fields: Map<String, Value>) -> Result<()> {
        let mut guard = self.collections.write();
        let doc = guard
            .get_mut(collection)
            .and_then(|c| c.get_mut(key))
            .ok_or_else(|| DocStoreError::not_found(collection, key))?;
        doc.extend(fields);
        Ok(())
    }
}
