pub mod db_interfaces;
pub mod memory;
pub mod models;

use crate::error::PortalError;
use crate::store::db_interfaces::PortalDb;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub async fn get_record<T: DeserializeOwned>(
    db: &dyn PortalDb,
    collection: &str,
    id: &str,
) -> Result<Option<T>, PortalError> {
    match db.get_document(collection, id).await? {
        Some(document) => Ok(Some(serde_json::from_value(document)?)),
        None => Ok(None),
    }
}

pub async fn require_record<T: DeserializeOwned>(
    db: &dyn PortalDb,
    collection: &str,
    id: &str,
) -> Result<T, PortalError> {
    get_record(db, collection, id)
        .await?
        .ok_or_else(|| PortalError::not_found(format!("No {collection} record with id {id}")))
}

pub async fn put_record<T: Serialize>(
    db: &dyn PortalDb,
    collection: &str,
    id: &str,
    record: &T,
) -> Result<(), PortalError> {
    db.set_document(collection, id, &serde_json::to_value(record)?)
        .await
}

pub async fn list_records<T: DeserializeOwned>(
    db: &dyn PortalDb,
    collection: &str,
) -> Result<Vec<(String, T)>, PortalError> {
    db.list_documents(collection)
        .await?
        .into_iter()
        .map(|(id, document)| Ok((id, serde_json::from_value(document)?)))
        .collect()
}
