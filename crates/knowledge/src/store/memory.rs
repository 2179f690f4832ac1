//! In-memory vector store.

use super::{batch_dimension, check_query_dimension, rank, Filter, VectorStore};
use crate::types::{QueryResult, SearchResult, VectorItem};
use async_trait::async_trait;
use docindex_core::AppResult;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Collection {
    dimension: usize,
    items: Vec<VectorItem>,
    positions: HashMap<String, usize>,
}

impl Collection {
    fn upsert(&mut self, item: VectorItem) {
        match self.positions.get(&item.id) {
            Some(&position) => self.items[position] = item,
            None => {
                self.positions.insert(item.id.clone(), self.items.len());
                self.items.push(item);
            }
        }
    }

    fn reindex(&mut self) {
        self.positions = self
            .items
            .iter()
            .enumerate()
            .map(|(position, item)| (item.id.clone(), position))
            .collect();
    }
}

/// Process-local store with brute-force cosine search.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of items in a collection (0 when missing).
    pub async fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map(|c| c.items.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    fn backend_name(&self) -> &str {
        "memory"
    }

    async fn has_collection(&self, collection: &str) -> AppResult<bool> {
        Ok(self.collections.read().await.contains_key(collection))
    }

    async fn insert(&self, collection: &str, items: &[VectorItem]) -> AppResult<()> {
        if items.is_empty() {
            return Ok(());
        }

        let mut collections = self.collections.write().await;
        let expected = collections.get(collection).map(|c| c.dimension);
        let dimension = batch_dimension(items, expected)?;

        let entry = collections
            .entry(collection.to_string())
            .or_insert_with(|| Collection {
                dimension,
                ..Default::default()
            });
        for item in items {
            entry.upsert(item.clone());
        }

        tracing::debug!("Inserted {} items into memory collection '{}'", items.len(), collection);
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        filter: &Filter,
        limit: Option<usize>,
    ) -> AppResult<QueryResult> {
        let collections = self.collections.read().await;
        let Some(entry) = collections.get(collection) else {
            return Ok(QueryResult::empty());
        };

        let mut ids = Vec::new();
        let mut documents = Vec::new();
        let mut metadatas = Vec::new();
        for item in entry
            .items
            .iter()
            .filter(|item| filter.matches(&item.metadata))
            .take(limit.unwrap_or(usize::MAX))
        {
            ids.push(item.id.clone());
            documents.push(item.text.clone());
            metadatas.push(item.metadata.clone());
        }

        Ok(QueryResult {
            ids: vec![ids],
            documents: vec![documents],
            metadatas: vec![metadatas],
        })
    }

    async fn search(
        &self,
        collection: &str,
        vectors: &[Vec<f32>],
        limit: usize,
        filter: Option<&Filter>,
    ) -> AppResult<SearchResult> {
        let collections = self.collections.read().await;
        let mut result = SearchResult::default();

        for vector in vectors {
            let hits = match collections.get(collection) {
                Some(entry) => {
                    check_query_dimension(collection, vector, entry.dimension)?;
                    rank(
                        vector,
                        entry
                        .items
                        .iter()
                        .filter(|item| filter.map_or(true, |f| f.matches(&item.metadata))),
                        limit,
                    )
                }
                None => Vec::new(),
            };
            result.push_group(hits);
        }

        Ok(result)
    }

    async fn delete(&self, collection: &str, filter: &Filter) -> AppResult<usize> {
        let mut collections = self.collections.write().await;
        let Some(entry) = collections.get_mut(collection) else {
            return Ok(0);
        };

        let before = entry.items.len();
        entry.items.retain(|item| !filter.matches(&item.metadata));
        entry.reindex();
        Ok(before - entry.items.len())
    }

    async fn delete_collection(&self, collection: &str) -> AppResult<()> {
        self.collections.write().await.remove(collection);
        Ok(())
    }

    async fn reset(&self) -> AppResult<()> {
        self.collections.write().await.clear();
        tracing::info!("Reset in-memory vector store");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::Metadata;

    fn item(id: &str, vector: Vec<f32>, file_id: &str) -> VectorItem {
        let mut metadata = Metadata::new();
        metadata.insert("file_id".to_string(), file_id.into());
        VectorItem {
            id: id.to_string(),
            text: format!("text {}", id),
            vector,
            metadata,
        }
    }

    #[tokio::test]
    async fn test_implicit_create_and_upsert() {
        let store = InMemoryStore::new();
        assert!(!store.has_collection("c").await.unwrap());

        store.insert("c", &[item("a", vec![1.0, 0.0], "f1")]).await.unwrap();
        store.insert("c", &[item("a", vec![0.0, 1.0], "f2")]).await.unwrap();

        assert!(store.has_collection("c").await.unwrap());
        assert_eq!(store.count("c").await, 1);
        let result = store.query("c", &Filter::eq("file_id", "f2"), None).await.unwrap();
        assert_eq!(result.first_ids(), ["a".to_string()]);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejects_whole_batch() {
        let store = InMemoryStore::new();
        store.insert("c", &[item("a", vec![1.0, 0.0], "f")]).await.unwrap();

        let result = store
            .insert("c", &[item("b", vec![1.0, 0.0], "f"), item("c", vec![1.0], "f")])
            .await;
        assert!(result.is_err());
        assert_eq!(store.count("c").await, 1);
    }

    #[tokio::test]
    async fn test_missing_collection_is_empty_not_error() {
        let store = InMemoryStore::new();
        let result = store.query("nope", &Filter::All, None).await.unwrap();
        assert!(!result.has_matches());
        assert_eq!(result.ids.len(), 1);

        let search = store.search("nope", &[vec![1.0]], 3, None).await.unwrap();
        assert_eq!(search.ids, vec![Vec::<String>::new()]);

        assert_eq!(store.delete("nope", &Filter::All).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_search_with_prefilter() {
        let store = InMemoryStore::new();
        store
            .insert(
                "c",
                &[
                    item("near", vec![1.0, 0.0], "f1"),
                    item("far", vec![0.0, 1.0], "f2"),
                ],
            )
            .await
            .unwrap();

        let all = store.search("c", &[vec![1.0, 0.0]], 2, None).await.unwrap();
        assert_eq!(all.ids[0], vec!["near".to_string(), "far".to_string()]);

        let filtered = store
            .search("c", &[vec![1.0, 0.0]], 2, Some(&Filter::eq("file_id", "f2")))
            .await
            .unwrap();
        assert_eq!(filtered.ids[0], vec!["far".to_string()]);
    }

    #[tokio::test]
    async fn test_search_rejects_wrong_dimension() {
        let store = InMemoryStore::new();
        store.insert("c", &[item("a", vec![1.0, 0.0], "f")]).await.unwrap();

        let result = store.search("c", &[vec![1.0, 0.0, 0.0]], 1, None).await;
        assert!(matches!(result, Err(docindex_core::AppError::VectorStore(_))));
    }

    #[tokio::test]
    async fn test_delete_and_reset() {
        let store = InMemoryStore::new();
        store
            .insert(
                "c",
                &[item("a", vec![1.0], "f1"), item("b", vec![1.0], "f2")],
            )
            .await
            .unwrap();

        assert_eq!(store.delete("c", &Filter::eq("file_id", "f1")).await.unwrap(), 1);
        assert_eq!(store.count("c").await, 1);

        store.reset().await.unwrap();
        assert!(!store.has_collection("c").await.unwrap());
    }
}
