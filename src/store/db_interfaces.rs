use crate::error::PortalError;
use crate::store::memory::MemoryDb;
use async_trait::async_trait;
use dyn_clone::{clone_trait_object, DynClone};
use serde_json::Value;
use sqlx::{
    migrate,
    postgres::PgPoolOptions,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    FromRow, Pool, Postgres, Sqlite,
};
use std::str::FromStr;

/// A shallow field merge against one document, applied as part of a batch.
#[derive(Clone, Debug)]
pub struct DocumentUpdate {
    pub collection: String,
    pub id: String,
    pub fields: Value,
}

// PortalDb is the document store shared by every handler. Documents are
// JSON objects addressed by (collection, id). As with the SQLite and
// Postgres implementations below, backends only need single-document
// reads and writes plus a transactional batch of updates; there are no
// queries beyond listing a collection.
#[async_trait]
pub trait PortalDb: DynClone + Send + Sync {
    async fn get_document(&self, collection: &str, id: &str)
        -> Result<Option<Value>, PortalError>;
    async fn set_document(&self, collection: &str, id: &str, data: &Value)
        -> Result<(), PortalError>;
    /// Merges the top-level keys of `fields` into an existing document.
    /// Last write wins; fails with `NotFound` if the document is missing.
    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        fields: &Value,
    ) -> Result<(), PortalError>;
    async fn batch_update(&self, updates: &[DocumentUpdate]) -> Result<(), PortalError>;
    /// Pushes `value` onto the array at top-level `field`, starting the
    /// array when absent. Concurrent appends to one document are all kept.
    async fn append_to_array(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        value: &Value,
    ) -> Result<(), PortalError>;
    async fn list_documents(&self, collection: &str) -> Result<Vec<(String, Value)>, PortalError>;
}

clone_trait_object!(PortalDb);

pub fn merge_fields(document: &mut Value, fields: &Value) -> Result<(), PortalError> {
    match (document, fields) {
        (Value::Object(existing), Value::Object(fields)) => {
            for (key, value) in fields {
                existing.insert(key.clone(), value.clone());
            }
            Ok(())
        }
        _ => Err(PortalError::invalid_argument(
            "Document updates must be JSON objects",
        )),
    }
}

pub fn push_to_array(document: &mut Value, field: &str, value: &Value) -> Result<(), PortalError> {
    let Value::Object(existing) = document else {
        return Err(PortalError::invalid_argument("Documents must be JSON objects"));
    };
    let slot = existing.entry(field.to_string()).or_insert(Value::Null);
    if slot.is_null() {
        *slot = Value::Array(vec![]);
    }
    match slot {
        Value::Array(items) => {
            items.push(value.clone());
            Ok(())
        }
        _ => Err(PortalError::invalid_argument(format!(
            "Field {field} is not an array"
        ))),
    }
}

fn not_found(collection: &str, id: &str) -> PortalError {
    PortalError::not_found(format!("Document {collection}/{id} does not exist"))
}

#[derive(Debug, FromRow)]
struct DocumentRow {
    id: String,
    data: String,
}

#[macro_export]
macro_rules! implement_portal_db {
    ($db_type: ident) => {
        #[async_trait]
        impl PortalDb for $db_type {
            async fn get_document(
                &self,
                collection: &str,
                id: &str,
            ) -> Result<Option<Value>, PortalError> {
                let row: Option<DocumentRow> = sqlx::query_as(
                    r#"
SELECT id, data
FROM document
WHERE collection = $1 AND id = $2
        "#,
                )
                .bind(collection)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

                match row {
                    Some(row) => Ok(Some(serde_json::from_str(&row.data)?)),
                    None => Ok(None),
                }
            }

            async fn set_document(
                &self,
                collection: &str,
                id: &str,
                data: &Value,
            ) -> Result<(), PortalError> {
                sqlx::query(
                    r#"
INSERT INTO document ( collection, id, data, updated_at )
VALUES ( $1, $2, $3, $4 )
ON CONFLICT (collection, id) DO UPDATE
SET data = excluded.data, updated_at = excluded.updated_at
        "#,
                )
                .bind(collection)
                .bind(id)
                .bind(serde_json::to_string(data)?)
                .bind(chrono::Utc::now().to_rfc3339())
                .execute(&self.pool)
                .await?;

                Ok(())
            }

            async fn update_document(
                &self,
                collection: &str,
                id: &str,
                fields: &Value,
            ) -> Result<(), PortalError> {
                self.batch_update(&[DocumentUpdate {
                    collection: collection.to_string(),
                    id: id.to_string(),
                    fields: fields.clone(),
                }])
                .await
            }

            async fn batch_update(&self, updates: &[DocumentUpdate]) -> Result<(), PortalError> {
                let mut tx = self.pool.begin().await?;
                let now = chrono::Utc::now().to_rfc3339();
                for update in updates {
                    let row: Option<DocumentRow> = sqlx::query_as(
                        r#"
SELECT id, data
FROM document
WHERE collection = $1 AND id = $2
        "#,
                    )
                    .bind(&update.collection)
                    .bind(&update.id)
                    .fetch_optional(&mut tx)
                    .await?;

                    let Some(row) = row else {
                        return Err(not_found(&update.collection, &update.id));
                    };
                    let mut document: Value = serde_json::from_str(&row.data)?;
                    merge_fields(&mut document, &update.fields)?;

                    sqlx::query(
                        r#"
UPDATE document
SET data = $1, updated_at = $2
WHERE collection = $3 AND id = $4
        "#,
                    )
                    .bind(serde_json::to_string(&document)?)
                    .bind(&now)
                    .bind(&update.collection)
                    .bind(&update.id)
                    .execute(&mut tx)
                    .await?;
                }
                tx.commit().await?;

                Ok(())
            }

            async fn append_to_array(
                &self,
                collection: &str,
                id: &str,
                field: &str,
                value: &Value,
            ) -> Result<(), PortalError> {
                let mut tx = self.pool.begin().await?;
                let now = chrono::Utc::now().to_rfc3339();
                // Writing first takes the row lock before the read, so a
                // second appender waits instead of reading a stale array.
                let locked = sqlx::query(
                    r#"
UPDATE document
SET updated_at = $1
WHERE collection = $2 AND id = $3
        "#,
                )
                .bind(&now)
                .bind(collection)
                .bind(id)
                .execute(&mut tx)
                .await?;
                if locked.rows_affected() == 0 {
                    return Err(not_found(collection, id));
                }

                let row: DocumentRow = sqlx::query_as(
                    r#"
SELECT id, data
FROM document
WHERE collection = $1 AND id = $2
        "#,
                )
                .bind(collection)
                .bind(id)
                .fetch_one(&mut tx)
                .await?;
                let mut document: Value = serde_json::from_str(&row.data)?;
                push_to_array(&mut document, field, value)?;

                sqlx::query(
                    r#"
UPDATE document
SET data = $1
WHERE collection = $2 AND id = $3
        "#,
                )
                .bind(serde_json::to_string(&document)?)
                .bind(collection)
                .bind(id)
                .execute(&mut tx)
                .await?;
                tx.commit().await?;

                Ok(())
            }

            async fn list_documents(
                &self,
                collection: &str,
            ) -> Result<Vec<(String, Value)>, PortalError> {
                let rows: Vec<DocumentRow> = sqlx::query_as(
                    r#"
SELECT id, data
FROM document
WHERE collection = $1
ORDER BY id
        "#,
                )
                .bind(collection)
                .fetch_all(&self.pool)
                .await?;

                rows.into_iter()
                    .map(|row| Ok((row.id, serde_json::from_str(&row.data)?)))
                    .collect()
            }
        }
    };
}

#[derive(Clone)]
struct SqlitePortalDb {
    pub pool: Pool<Sqlite>,
}

impl SqlitePortalDb {
    pub async fn connect(url: &str) -> Result<SqlitePortalDb, PortalError> {
        let connection_options = SqliteConnectOptions::from_str(url)
            .map_err(|err| PortalError::ConfigurationError {
                message: format!("Unable to interpret SQLite connection uri: {err}"),
            })?
            .create_if_missing(true);
        // Every connection to `:memory:` opens a separate database.
        let pool_options = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new()
        };
        let pool = pool_options.connect_with(connection_options).await?;
        migrate!("./migrations/sqlite").run(&pool).await?;
        Ok(Self { pool })
    }
}

implement_portal_db!(SqlitePortalDb);

#[derive(Clone)]
struct PostgresPortalDb {
    pub pool: Pool<Postgres>,
}

impl PostgresPortalDb {
    pub async fn connect(url: &str) -> Result<PostgresPortalDb, PortalError> {
        let pool = PgPoolOptions::new().max_connections(20).connect(url).await?;
        migrate!("./migrations/postgres").run(&pool).await?;
        Ok(Self { pool })
    }
}

implement_portal_db!(PostgresPortalDb);

pub async fn connect_to_portal_db(url: &str) -> Result<Box<dyn PortalDb>, PortalError> {
    if url.starts_with("sqlite") {
        Ok(Box::new(SqlitePortalDb::connect(url).await?))
    } else if url.starts_with("postgres") {
        Ok(Box::new(PostgresPortalDb::connect(url).await?))
    } else if url.starts_with("memory") {
        Ok(Box::new(MemoryDb::new()))
    } else {
        Err(PortalError::ConfigurationError {
            message: format!(
                "Database type for {url} is not supported (currently SQLite, PostgreSQL, and memory://)"
            ),
        })
    }
}
