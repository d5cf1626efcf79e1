use crate::error::PortalError;
use crate::store::db_interfaces::{merge_fields, push_to_array, DocumentUpdate, PortalDb};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

type Documents = BTreeMap<(String, String), Value>;

/// Process-local document store, selected with `database_url = "memory://"`.
#[derive(Clone, Default)]
pub struct MemoryDb {
    documents: Arc<Mutex<Documents>>,
}

impl MemoryDb {
    pub fn new() -> MemoryDb {
        MemoryDb::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Documents>, PortalError> {
        self.documents.lock().map_err(|err| PortalError::StoreError {
            message: format!("Memory store poisoned: {err}"),
        })
    }
}

#[async_trait]
impl PortalDb for MemoryDb {
    async fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Value>, PortalError> {
        Ok(self
            .lock()?
            .get(&(collection.to_string(), id.to_string()))
            .cloned())
    }

    async fn set_document(
        &self,
        collection: &str,
        id: &str,
        data: &Value,
    ) -> Result<(), PortalError> {
        self.lock()?
            .insert((collection.to_string(), id.to_string()), data.clone());
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
        let mut documents = self.lock()?;
        let mut staged: Vec<((String, String), Value)> = Vec::with_capacity(updates.len());
        for update in updates {
            let key = (update.collection.clone(), update.id.clone());
            let existing = staged
                .iter()
                .rev()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.clone())
                .or_else(|| documents.get(&key).cloned());
            let Some(mut document) = existing else {
                return Err(PortalError::not_found(format!(
                    "Document {}/{} does not exist",
                    update.collection, update.id
                )));
            };
            merge_fields(&mut document, &update.fields)?;
            staged.push((key, document));
        }
        for (key, document) in staged {
            documents.insert(key, document);
        }
        Ok(())
    }

    async fn append_to_array(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        value: &Value,
    ) -> Result<(), PortalError> {
        let mut documents = self.lock()?;
        match documents.get_mut(&(collection.to_string(), id.to_string())) {
            Some(document) => push_to_array(document, field, value),
            None => Err(PortalError::not_found(format!(
                "Document {collection}/{id} does not exist"
            ))),
        }
    }

    async fn list_documents(&self, collection: &str) -> Result<Vec<(String, Value)>, PortalError> {
        Ok(self
            .lock()?
            .iter()
            .filter(|((c, _), _)| c == collection)
            .map(|((_, id), doc)| (id.clone(), doc.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn update_of_missing_document_fails() {
        let db = MemoryDb::new();
        let result = db.update_document("locations", "x", &json!({"a": 1})).await;
        assert!(matches!(result, Err(PortalError::NotFound { .. })));
    }

    #[tokio::test]
    async fn lists_only_the_requested_collection() {
        let db = MemoryDb::new();
        db.set_document("parents", "p1", &json!({})).await.unwrap();
        db.set_document("parents", "p2", &json!({})).await.unwrap();
        db.set_document("locations", "l1", &json!({})).await.unwrap();

        let parents = db.list_documents("parents").await.unwrap();
        let ids: Vec<&str> = parents.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p2"]);
    }

    #[tokio::test]
    async fn clones_share_documents() {
        let db = MemoryDb::new();
        let other = db.clone();
        db.set_document("sales", "s1", &json!({"status": "pending"}))
            .await
            .unwrap();
        assert!(other.get_document("sales", "s1").await.unwrap().is_some());
    }
}
