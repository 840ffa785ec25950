//! Document-store collaborator.
//!
//! Documents are flat JSON objects addressed by `collection/id`. Writes may
//! carry [`server_timestamp`] sentinels, which the store replaces with its own
//! clock when the write is applied.

mod sqlite;

use std::{fmt, str::FromStr};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

pub use sqlite::SqliteStore;

pub type Fields = Map<String, Value>;

const SERVER_TIMESTAMP_KEY: &str = "$serverTimestamp";

/// Placeholder for "the store's current time", resolved on write.
pub fn server_timestamp() -> Value {
    let mut sentinel = Map::new();
    sentinel.insert(SERVER_TIMESTAMP_KEY.to_owned(), Value::Bool(true));
    Value::Object(sentinel)
}

pub(crate) fn is_server_timestamp(value: &Value) -> bool {
    matches!(value, Value::Object(map) if map.len() == 1 && map.get(SERVER_TIMESTAMP_KEY) == Some(&Value::Bool(true)))
}

/// Turns a `json!({...})` literal into a field map.
pub fn fields(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        _ => Fields::new(),
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Clock error: {0}")]
    Clock(#[from] time::error::Format),

    #[error("Document not found: {0}")]
    NotFound(DocRef),

    #[error("Malformed document reference: {0:?}")]
    BadRef(String),

    #[error("Malformed document {doc}: {reason}")]
    Malformed { doc: DocRef, reason: String },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Address of a document. Serialized as `"collection/id"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocRef {
    pub collection: String,
    pub id: String,
}

impl DocRef {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// A fresh reference with a time-ordered id.
    pub fn generate(collection: impl Into<String>) -> Self {
        Self::new(collection, Uuid::now_v7().to_string())
    }
}

impl fmt::Display for DocRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

impl FromStr for DocRef {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((collection, id)) if !collection.is_empty() && !id.is_empty() && !id.contains('/') => {
                Ok(DocRef::new(collection, id))
            }
            _ => Err(StoreError::BadRef(s.to_owned())),
        }
    }
}

impl TryFrom<String> for DocRef {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DocRef> for String {
    fn from(value: DocRef) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub reference: DocRef,
    pub fields: Fields,
}

impl Document {
    /// Deserializes the fields into `T`, naming the document on failure.
    pub fn decode<T: serde::de::DeserializeOwned>(self) -> StoreResult<T> {
        serde_json::from_value(Value::Object(self.fields)).map_err(|e| StoreError::Malformed {
            doc: self.reference,
            reason: e.to_string(),
        })
    }
}

/// One write of an atomic batch.
#[derive(Debug, Clone)]
pub enum Write {
    /// Create or overwrite the whole document.
    Set { doc: DocRef, fields: Fields },
    /// Merge top-level fields into an existing document.
    Update { doc: DocRef, fields: Fields },
    /// Remove the document; absent documents are not an error.
    Delete { doc: DocRef },
    /// Append each of `values` missing from the array `field` of an existing
    /// document, reading the array inside the batch.
    ArrayUnion { doc: DocRef, field: String, values: Vec<Value> },
    /// Drop every element equal to one of `values` from the array `field`.
    ArrayRemove { doc: DocRef, field: String, values: Vec<Value> },
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn fetch_all(&self, collection: &str) -> StoreResult<Vec<Document>>;

    /// Documents of `collection` whose top-level string field `field` equals `equals`.
    async fn fetch_where(&self, collection: &str, field: &str, equals: &str) -> StoreResult<Vec<Document>>;

    async fn fetch_one(&self, doc: &DocRef) -> StoreResult<Option<Document>>;

    /// Applies every write or none of them.
    async fn commit(&self, writes: Vec<Write>) -> StoreResult<()>;

    async fn create(&self, collection: &str, fields: Fields) -> StoreResult<DocRef> {
        let doc = DocRef::generate(collection);
        self.commit(vec![Write::Set { doc: doc.clone(), fields }]).await?;
        Ok(doc)
    }

    async fn update(&self, doc: &DocRef, fields: Fields) -> StoreResult<()> {
        self.commit(vec![Write::Update { doc: doc.clone(), fields }]).await
    }

    async fn delete(&self, doc: &DocRef) -> StoreResult<()> {
        self.commit(vec![Write::Delete { doc: doc.clone() }]).await
    }
}
