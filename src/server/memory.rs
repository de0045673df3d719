//! In-memory document store.
//!
//! Stands in for MongoDB in tests and local runs. Documents are kept as JSON
//! objects per collection; identifiers are generated as ObjectIds and stored
//! in `_id` as hex strings, which is also how the MongoDB backend renders them.

use std::collections::HashMap;
use std::sync::Arc;

use bson::oid::ObjectId;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::server::database::{Collection, Document, ID_FIELD};

/// Process-local collections guarded by an async lock.
///
/// Cloning is cheap and every clone sees the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    collections: Arc<RwLock<HashMap<Collection, Vec<Document>>>>,
}

fn has_id(doc: &Document, id: &ObjectId) -> bool {
    matches!(doc.get(ID_FIELD), Some(Value::String(stored)) if *stored == id.to_hex())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add documents to a collection, assigning an `_id` to any that lack one.
    pub async fn seed(&self, collection: Collection, docs: Vec<Document>) {
        let mut collections = self.collections.write().await;
        let stored = collections.entry(collection).or_default();
        for mut doc in docs {
            if !doc.contains_key(ID_FIELD) {
                doc.insert(ID_FIELD.to_string(), Value::String(ObjectId::new().to_hex()));
            }
            stored.push(doc);
        }
    }

    pub async fn find_all(&self, collection: Collection) -> Vec<Document> {
        let collections = self.collections.read().await;
        collections.get(&collection).cloned().unwrap_or_default()
    }

    /// Documents whose `field` equals the given string.
    pub async fn find_by_field(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
    ) -> Vec<Document> {
        let collections = self.collections.read().await;
        collections
            .get(&collection)
            .map(|docs| {
                docs.iter()
                    .filter(|doc| matches!(doc.get(field), Some(Value::String(v)) if v == value))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub async fn find_by_id(&self, collection: Collection, id: &ObjectId) -> Option<Document> {
        let collections = self.collections.read().await;
        collections
            .get(&collection)
            .and_then(|docs| docs.iter().find(|doc| has_id(doc, id)).cloned())
    }

    /// Store a document under a fresh identifier and return that identifier.
    pub async fn insert(&self, collection: Collection, mut doc: Document) -> ObjectId {
        let id = ObjectId::new();
        doc.insert(ID_FIELD.to_string(), Value::String(id.to_hex()));

        let mut collections = self.collections.write().await;
        collections.entry(collection).or_default().push(doc);
        id
    }

    /// Overwrite the given top-level fields of one document.
    ///
    /// Returns `(matched, modified)`; `modified` is 0 when every new value
    /// equals the stored one.
    pub async fn update_by_id(
        &self,
        collection: Collection,
        id: &ObjectId,
        changes: Document,
    ) -> (u64, u64) {
        let mut collections = self.collections.write().await;
        let Some(doc) = collections
            .get_mut(&collection)
            .and_then(|docs| docs.iter_mut().find(|doc| has_id(doc, id)))
        else {
            return (0, 0);
        };

        let mut modified = false;
        for (key, value) in changes {
            if doc.get(&key) != Some(&value) {
                doc.insert(key, value);
                modified = true;
            }
        }

        (1, u64::from(modified))
    }

    /// Remove at most one document; returns how many were removed.
    pub async fn delete_by_id(&self, collection: Collection, id: &ObjectId) -> u64 {
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(&collection) else {
            return 0;
        };

        match docs.iter().position(|doc| has_id(doc, id)) {
            Some(index) => {
                docs.remove(index);
                1
            }
            None => 0,
        }
    }
}
