use std::sync::Arc;

use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[cfg(feature = "mongodb")]
use tracing::{error, info};
#[cfg(feature = "mongodb")]
use bson::{doc, Bson, Document as BsonDocument};
#[cfg(feature = "mongodb")]
use futures_util::TryStreamExt;
#[cfg(feature = "mongodb")]
use mongodb::options::{ClientOptions, Credential, ServerApi, ServerApiVersion};

use crate::config::DatabaseConfig;
use crate::errors::{ShopError, ShopResult};
use crate::server::memory::MemoryStore;

/// A schema-less record as exchanged with clients.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Identifier field, assigned by the database on insert.
pub const ID_FIELD: &str = "_id";
/// Product field used to list a brand's catalog.
pub const BRAND_FIELD: &str = "brandName";
/// Cart item field naming the owner.
pub const EMAIL_FIELD: &str = "email";

/// The three collections of the shop. None references another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Companies,
    Cart,
    Products,
}

impl Collection {
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Companies => "companies",
            Collection::Cart => "cart",
            Collection::Products => "products",
        }
    }
}

/// Result of inserting one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertOutcome {
    pub acknowledged: bool,
    pub inserted_id: String,
}

/// Result of a partial update of one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOutcome {
    pub acknowledged: bool,
    pub matched_count: u64,
    pub modified_count: u64,
    pub upserted_id: Option<String>,
    pub upserted_count: u64,
}

impl UpdateOutcome {
    fn counts(matched_count: u64, modified_count: u64) -> Self {
        Self {
            acknowledged: true,
            matched_count,
            modified_count,
            upserted_id: None,
            upserted_count: 0,
        }
    }
}

/// Result of deleting by identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOutcome {
    pub acknowledged: bool,
    pub deleted_count: u64,
}

/// Document store shared by all handlers.
///
/// Available variants depend on enabled features:
/// - `mongodb` feature enables `Database::MongoDb`
/// - `Database::Memory` is always available
#[derive(Debug, Clone)]
pub enum Database {
    #[cfg(feature = "mongodb")]
    MongoDb(mongodb::Database),
    Memory(MemoryStore),
}

/// Client-supplied identifiers are never stored; the database assigns them.
fn without_id(mut doc: Document) -> Document {
    if doc.remove(ID_FIELD).is_some() {
        warn!("Ignoring client-supplied {ID_FIELD} field");
    }
    doc
}

#[cfg(feature = "mongodb")]
fn mongo_error(operation: &str, collection: Collection, e: mongodb::error::Error) -> ShopError {
    error!(
        "MongoDB {operation} on '{}' failed: {e}",
        collection.name()
    );
    ShopError::DatabaseError(format!("{operation} failed: {e}"))
}

/// Equality filter on a single field.
#[cfg(feature = "mongodb")]
fn eq_filter(field: &str, value: impl Into<Bson>) -> BsonDocument {
    let mut filter = BsonDocument::new();
    filter.insert(field, value);
    filter
}

#[cfg(feature = "mongodb")]
fn to_bson_document(doc: &Document) -> ShopResult<BsonDocument> {
    bson::to_document(doc).map_err(|e| ShopError::InvalidDocument(e.to_string()))
}

/// Render a stored document as JSON, with an ObjectId `_id` as plain hex.
#[cfg(feature = "mongodb")]
fn to_json_document(mut doc: BsonDocument) -> ShopResult<Document> {
    let hex_id = match doc.get(ID_FIELD) {
        Some(Bson::ObjectId(oid)) => Some(oid.to_hex()),
        _ => None,
    };
    if let Some(hex_id) = hex_id {
        doc.insert(ID_FIELD, hex_id);
    }

    match Bson::Document(doc).into_relaxed_extjson() {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(ShopError::InvalidDocument(format!(
            "expected a document, got {other}"
        ))),
    }
}

#[cfg(feature = "mongodb")]
fn inserted_id_string(id: Bson) -> String {
    match id {
        Bson::ObjectId(oid) => oid.to_hex(),
        Bson::String(s) => s,
        other => other.into_relaxed_extjson().to_string(),
    }
}

#[cfg(feature = "mongodb")]
async fn connect_mongodb(config: &DatabaseConfig) -> ShopResult<mongodb::Database> {
    let mut options = if config.uri.is_empty() {
        let mut options = ClientOptions::parse(format!(
            "mongodb+srv://{}/?retryWrites=true&w=majority",
            config.host
        ))
        .await?;
        options.credential = Some(
            Credential::builder()
                .username(config.username.clone())
                .password(config.password.clone())
                .build(),
        );
        options
    } else {
        ClientOptions::parse(&config.uri).await?
    };

    options.server_api = Some(
        ServerApi::builder()
            .version(ServerApiVersion::V1)
            .strict(true)
            .deprecation_errors(true)
            .build(),
    );

    let client = mongodb::Client::with_options(options)?;
    Ok(client.database(&config.name))
}

impl Database {
    /// Create the database handle described by `config`.
    ///
    /// The MongoDB driver connects lazily, so an unreachable cluster does not
    /// fail here; it fails the individual requests that need it.
    pub async fn connect(config: &DatabaseConfig) -> ShopResult<Arc<Self>> {
        match config.backend.as_str() {
            #[cfg(feature = "mongodb")]
            "mongodb" => {
                let db = connect_mongodb(config).await.map_err(|e| {
                    error!("Failed to configure MongoDB client: {e}");
                    e
                })?;
                info!("Using MongoDB database '{}'", config.name);
                Ok(Arc::new(Database::MongoDb(db)))
            }
            #[cfg(not(feature = "mongodb"))]
            "mongodb" => Err(ShopError::ConfigError(
                "MongoDB support not compiled in. Enable the 'mongodb' feature.".to_string(),
            )),
            "memory" => {
                warn!("Using the in-memory store; data is lost on restart");
                Ok(Arc::new(Database::in_memory()))
            }
            other => Err(ShopError::ConfigError(format!(
                "unsupported database backend: {other}"
            ))),
        }
    }

    /// An empty in-memory database.
    pub fn in_memory() -> Self {
        Database::Memory(MemoryStore::new())
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            #[cfg(feature = "mongodb")]
            Database::MongoDb(_) => "mongodb",
            Database::Memory(_) => "memory",
        }
    }

    /// Round-trip to the server to confirm it is reachable.
    pub async fn ping(&self) -> ShopResult<()> {
        match self {
            #[cfg(feature = "mongodb")]
            Database::MongoDb(db) => {
                db.run_command(doc! { "ping": 1 }).await?;
                Ok(())
            }
            Database::Memory(_) => Ok(()),
        }
    }

    // ---------------------------------------------------------------------
    // Shop operations
    // ---------------------------------------------------------------------

    pub async fn list_companies(&self) -> ShopResult<Vec<Document>> {
        self.find_all(Collection::Companies).await
    }

    pub async fn find_products_by_brand(&self, brand: &str) -> ShopResult<Vec<Document>> {
        self.find_by_field(Collection::Products, BRAND_FIELD, brand)
            .await
    }

    /// Fetch a product by its identifier.
    ///
    /// Returns:
    /// - `Ok(Some(doc))` if found
    /// - `Ok(None)` if not found
    /// - `Err(ShopError::DatabaseError)` on DB failure
    pub async fn find_product(&self, id: &ObjectId) -> ShopResult<Option<Document>> {
        self.find_by_id(Collection::Products, id).await
    }

    pub async fn insert_product(&self, product: Document) -> ShopResult<InsertOutcome> {
        self.insert(Collection::Products, product).await
    }

    /// Replace only the supplied top-level fields of a product.
    pub async fn update_product(
        &self,
        id: &ObjectId,
        changes: Document,
    ) -> ShopResult<UpdateOutcome> {
        self.update_by_id(Collection::Products, id, changes).await
    }

    pub async fn insert_cart_item(&self, item: Document) -> ShopResult<InsertOutcome> {
        self.insert(Collection::Cart, item).await
    }

    pub async fn find_cart_items_by_email(&self, email: &str) -> ShopResult<Vec<Document>> {
        self.find_by_field(Collection::Cart, EMAIL_FIELD, email)
            .await
    }

    /// Delete one cart item. A missing id reports zero deletions.
    pub async fn delete_cart_item(&self, id: &ObjectId) -> ShopResult<DeleteOutcome> {
        self.delete_by_id(Collection::Cart, id).await
    }

    // ---------------------------------------------------------------------
    // Backend dispatch
    // ---------------------------------------------------------------------

    async fn find_all(&self, collection: Collection) -> ShopResult<Vec<Document>> {
        match self {
            #[cfg(feature = "mongodb")]
            Database::MongoDb(db) => {
                let docs: Vec<BsonDocument> = db
                    .collection::<BsonDocument>(collection.name())
                    .find(doc! {})
                    .await
                    .map_err(|e| mongo_error("find", collection, e))?
                    .try_collect()
                    .await
                    .map_err(|e| mongo_error("find", collection, e))?;

                docs.into_iter().map(to_json_document).collect()
            }
            Database::Memory(store) => Ok(store.find_all(collection).await),
        }
    }

    async fn find_by_field(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
    ) -> ShopResult<Vec<Document>> {
        match self {
            #[cfg(feature = "mongodb")]
            Database::MongoDb(db) => {
                let docs: Vec<BsonDocument> = db
                    .collection::<BsonDocument>(collection.name())
                    .find(eq_filter(field, value))
                    .await
                    .map_err(|e| mongo_error("find", collection, e))?
                    .try_collect()
                    .await
                    .map_err(|e| mongo_error("find", collection, e))?;

                docs.into_iter().map(to_json_document).collect()
            }
            Database::Memory(store) => Ok(store.find_by_field(collection, field, value).await),
        }
    }

    async fn find_by_id(
        &self,
        collection: Collection,
        id: &ObjectId,
    ) -> ShopResult<Option<Document>> {
        match self {
            #[cfg(feature = "mongodb")]
            Database::MongoDb(db) => db
                .collection::<BsonDocument>(collection.name())
                .find_one(eq_filter(ID_FIELD, *id))
                .await
                .map_err(|e| mongo_error("find_one", collection, e))?
                .map(to_json_document)
                .transpose(),
            Database::Memory(store) => Ok(store.find_by_id(collection, id).await),
        }
    }

    async fn insert(&self, collection: Collection, doc: Document) -> ShopResult<InsertOutcome> {
        let doc = without_id(doc);

        let inserted_id = match self {
            #[cfg(feature = "mongodb")]
            Database::MongoDb(db) => {
                let result = db
                    .collection::<BsonDocument>(collection.name())
                    .insert_one(to_bson_document(&doc)?)
                    .await
                    .map_err(|e| mongo_error("insert_one", collection, e))?;
                inserted_id_string(result.inserted_id)
            }
            Database::Memory(store) => store.insert(collection, doc).await.to_hex(),
        };

        Ok(InsertOutcome {
            acknowledged: true,
            inserted_id,
        })
    }

    async fn update_by_id(
        &self,
        collection: Collection,
        id: &ObjectId,
        changes: Document,
    ) -> ShopResult<UpdateOutcome> {
        let changes = without_id(changes);

        match self {
            #[cfg(feature = "mongodb")]
            Database::MongoDb(db) => {
                let coll = db.collection::<BsonDocument>(collection.name());
                let filter = eq_filter(ID_FIELD, *id);

                // `$set` with no fields is rejected by the server.
                if changes.is_empty() {
                    let matched = coll
                        .count_documents(filter)
                        .await
                        .map_err(|e| mongo_error("count_documents", collection, e))?;
                    return Ok(UpdateOutcome::counts(matched, 0));
                }

                let result = coll
                    .update_one(filter, doc! { "$set": to_bson_document(&changes)? })
                    .await
                    .map_err(|e| mongo_error("update_one", collection, e))?;

                let upserted_count = u64::from(result.upserted_id.is_some());
                Ok(UpdateOutcome {
                    acknowledged: true,
                    matched_count: result.matched_count,
                    modified_count: result.modified_count,
                    upserted_id: result.upserted_id.map(inserted_id_string),
                    upserted_count,
                })
            }
            Database::Memory(store) => {
                let (matched, modified) = store.update_by_id(collection, id, changes).await;
                Ok(UpdateOutcome::counts(matched, modified))
            }
        }
    }

    async fn delete_by_id(&self, collection: Collection, id: &ObjectId) -> ShopResult<DeleteOutcome> {
        let deleted_count = match self {
            #[cfg(feature = "mongodb")]
            Database::MongoDb(db) => {
                db.collection::<BsonDocument>(collection.name())
                    .delete_one(eq_filter(ID_FIELD, *id))
                    .await
                    .map_err(|e| mongo_error("delete_one", collection, e))?
                    .deleted_count
            }
            Database::Memory(store) => store.delete_by_id(collection, id).await,
        };

        Ok(DeleteOutcome {
            acknowledged: true,
            deleted_count,
        })
    }
}
