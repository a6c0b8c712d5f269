use crate::{
    error::RegistrarResult,
    store::{Collection, DocumentBackend, Filter},
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Keeps every collection in insertion order behind one lock. Used for tests and
/// `REGISTRAR_STORE=memory` development runs.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    collections: RwLock<HashMap<Collection, Vec<(Uuid, Value)>>>,
}

#[async_trait]
impl DocumentBackend for MemoryBackend {
    async fn find(&self, collection: Collection, filter: &Filter) -> RegistrarResult<Vec<Value>> {
        let collections = self.collections.read().await;
        let mut found: Vec<Value> = collections
            .get(&collection)
            .into_iter()
            .flatten()
            .filter(|(_, document)| filter.matches(document))
            .map(|(_, document)| document.clone())
            .collect();

        //stable, so ties keep insertion order like `ORDER BY ..., seq`
        found.sort_by(|a, b| filter.compare(a, b));
        Ok(found)
    }

    async fn find_by_id(&self, collection: Collection, id: Uuid) -> RegistrarResult<Option<Value>> {
        Ok(self
            .collections
            .read()
            .await
            .get(&collection)
            .and_then(|documents| documents.iter().find(|(found, _)| *found == id))
            .map(|(_, document)| document.clone()))
    }

    async fn count(&self, collection: Collection, filter: &Filter) -> RegistrarResult<u64> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection)
            .into_iter()
            .flatten()
            .filter(|(_, document)| filter.matches(document))
            .count() as u64)
    }

    async fn insert(&self, collection: Collection, id: Uuid, document: Value) -> RegistrarResult<()> {
        self.collections
            .write()
            .await
            .entry(collection)
            .or_default()
            .push((id, document));
        Ok(())
    }

    async fn replace(
        &self,
        collection: Collection,
        id: Uuid,
        document: Value,
    ) -> RegistrarResult<bool> {
        let mut collections = self.collections.write().await;
        let Some(slot) = collections
            .get_mut(&collection)
            .and_then(|documents| documents.iter_mut().find(|(found, _)| *found == id))
        else {
            return Ok(false);
        };

        slot.1 = document;
        Ok(true)
    }

    async fn remove(&self, collection: Collection, id: Uuid) -> RegistrarResult<bool> {
        let mut collections = self.collections.write().await;
        let Some(documents) = collections.get_mut(&collection) else {
            return Ok(false);
        };

        let before = documents.len();
        documents.retain(|(found, _)| *found != id);
        Ok(documents.len() != before)
    }
}
