use std::str::FromStr;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{
    SqliteConnection, SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing::debug;

use super::{DocRef, Document, DocumentStore, Fields, StoreError, StoreResult, Write, is_server_timestamp};

const SCHEMA: &str = r#"CREATE TABLE IF NOT EXISTS documents (
    collection TEXT NOT NULL,
    id TEXT NOT NULL,
    fields TEXT NOT NULL,
    PRIMARY KEY (collection, id)
)"#;

/// JSON documents in a single SQLite table, one row per document.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(url: &str, max_connections: u32) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

        // every connection to :memory: is its own database
        let pool_options = if url.contains(":memory:") || url.contains("mode=memory") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections)
        };
        let pool = pool_options.connect_with(options).await?;

        Self::from_pool(pool).await
    }

    pub async fn in_memory() -> StoreResult<Self> {
        Self::connect("sqlite::memory:", 1).await
    }

    pub async fn from_pool(pool: SqlitePool) -> StoreResult<Self> {
        sqlx::query(SCHEMA).execute(&pool).await?;
        Ok(Self { pool })
    }
}

fn decode_row(collection: &str, id: String, fields: &str) -> StoreResult<Document> {
    let reference = DocRef::new(collection, id);
    match serde_json::from_str::<Fields>(fields) {
        Ok(fields) => Ok(Document { reference, fields }),
        Err(e) => Err(StoreError::Malformed {
            doc: reference,
            reason: e.to_string(),
        }),
    }
}

fn resolve_timestamps(fields: &mut Fields, now: &str) {
    for value in fields.values_mut() {
        if is_server_timestamp(value) {
            *value = serde_json::Value::String(now.to_owned());
        }
    }
}

async fn read_for_write(conn: &mut SqliteConnection, doc: &DocRef) -> StoreResult<Fields> {
    let row: Option<(String,)> = sqlx::query_as("SELECT fields FROM documents WHERE collection = ? AND id = ?")
        .bind(&doc.collection)
        .bind(&doc.id)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some((fields,)) => Ok(decode_row(&doc.collection, doc.id.clone(), &fields)?.fields),
        None => Err(StoreError::NotFound(doc.clone())),
    }
}

async fn write_fields(conn: &mut SqliteConnection, doc: &DocRef, fields: &Fields) -> StoreResult<()> {
    sqlx::query("UPDATE documents SET fields = ? WHERE collection = ? AND id = ?")
        .bind(serde_json::to_string(fields)?)
        .bind(&doc.collection)
        .bind(&doc.id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// A missing field counts as an empty array.
fn take_array(doc: &DocRef, fields: &mut Fields, field: &str) -> StoreResult<Vec<Value>> {
    match fields.remove(field) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(array)) => Ok(array),
        Some(_) => Err(StoreError::Malformed {
            doc: doc.clone(),
            reason: format!("{field} is not an array"),
        }),
    }
}

async fn apply(conn: &mut SqliteConnection, write: Write, now: &str) -> StoreResult<()> {
    match write {
        Write::Set { doc, mut fields } => {
            resolve_timestamps(&mut fields, now);
            sqlx::query(
                "INSERT INTO documents (collection, id, fields) VALUES (?, ?, ?)
                 ON CONFLICT (collection, id) DO UPDATE SET fields = excluded.fields",
            )
            .bind(&doc.collection)
            .bind(&doc.id)
            .bind(serde_json::to_string(&fields)?)
            .execute(&mut *conn)
            .await?;
        }
        Write::Update { doc, fields } => {
            let mut merged = read_for_write(conn, &doc).await?;
            merged.extend(fields);
            resolve_timestamps(&mut merged, now);
            write_fields(conn, &doc, &merged).await?;
        }
        Write::ArrayUnion { doc, field, values } => {
            let mut current = read_for_write(conn, &doc).await?;
            let mut array = take_array(&doc, &mut current, &field)?;
            for value in values {
                if !array.contains(&value) {
                    array.push(value);
                }
            }
            current.insert(field, Value::Array(array));
            write_fields(conn, &doc, &current).await?;
        }
        Write::ArrayRemove { doc, field, values } => {
            let mut current = read_for_write(conn, &doc).await?;
            let mut array = take_array(&doc, &mut current, &field)?;
            array.retain(|value| !values.contains(value));
            current.insert(field, Value::Array(array));
            write_fields(conn, &doc, &current).await?;
        }
        Write::Delete { doc } => {
            sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
                .bind(&doc.collection)
                .bind(&doc.id)
                .execute(&mut *conn)
                .await?;
        }
    }
    Ok(())
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn fetch_all(&self, collection: &str) -> StoreResult<Vec<Document>> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT id, fields FROM documents WHERE collection = ? ORDER BY rowid")
                .bind(collection)
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter()
            .map(|(id, fields)| decode_row(collection, id, &fields))
            .collect()
    }

    async fn fetch_where(&self, collection: &str, field: &str, equals: &str) -> StoreResult<Vec<Document>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT id, fields FROM documents
             WHERE collection = ? AND json_extract(fields, ?) = ?
             ORDER BY rowid",
        )
        .bind(collection)
        .bind(format!("$.{field}"))
        .bind(equals)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(id, fields)| decode_row(collection, id, &fields))
            .collect()
    }

    async fn fetch_one(&self, doc: &DocRef) -> StoreResult<Option<Document>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT fields FROM documents WHERE collection = ? AND id = ?")
                .bind(&doc.collection)
                .bind(&doc.id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(|(fields,)| decode_row(&doc.collection, doc.id.clone(), &fields))
            .transpose()
    }

    async fn commit(&self, writes: Vec<Write>) -> StoreResult<()> {
        if writes.is_empty() {
            return Ok(());
        }

        let now = OffsetDateTime::now_utc().format(&Rfc3339)?;
        let count = writes.len();

        let mut tx = self.pool.begin().await?;
        for write in writes {
            apply(&mut tx, write, &now).await?;
        }
        tx.commit().await?;

        debug!(writes = count, "committed batch");
        Ok(())
    }
}
