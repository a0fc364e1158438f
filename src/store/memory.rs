//! In-memory vector store using cosine distance.

use super::{cosine_distance, Durability, SearchHit, VectorStore};
use crate::error::{Error, Result};
use crate::types::VectorStoreEntry;
use async_trait::async_trait;
use tokio::sync::RwLock;

/// Entries kept in insertion order behind a `tokio::sync::RwLock`
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<Vec<VectorStoreEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn add(&self, entries: Vec<VectorStoreEntry>) -> Result<()> {
        let mut store = self.entries.write().await;

        let expected = store.first().or(entries.first()).map(|e| e.vector.len());
        if let Some(dim) = expected {
            if let Some(bad) = entries.iter().find(|e| e.vector.len() != dim) {
                return Err(Error::store(
                    self.name(),
                    format!("vector has {} dimensions, store holds {}", bad.vector.len(), dim),
                ));
            }
        }

        store.extend(entries);
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        let store = self.entries.read().await;

        let mut scored: Vec<(usize, f32)> = store
            .iter()
            .enumerate()
            .map(|(i, entry)| (i, cosine_distance(&entry.vector, vector)))
            .collect();

        // Stable sort keeps insertion order among equal distances
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, distance)| SearchHit {
                chunk: store[i].chunk.clone(),
                distance,
            })
            .collect())
    }

    async fn persist(&self) -> Result<Durability> {
        // Nothing to write
        Ok(Durability::Volatile)
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.entries.read().await.len())
    }

    async fn clear(&self) -> Result<()> {
        self.entries.write().await.clear();
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Chunk, Metadata};

    fn entry(text: &str, vector: Vec<f32>) -> VectorStoreEntry {
        VectorStoreEntry {
            chunk: Chunk {
                text: text.to_string(),
                metadata: Metadata::new(),
                start: 0,
            },
            vector,
        }
    }

    fn texts(hits: &[SearchHit]) -> Vec<&str> {
        hits.iter().map(|h| h.chunk.text.as_str()).collect()
    }

    #[tokio::test]
    async fn test_empty_store_query_is_empty() {
        let store = MemoryStore::new();
        assert!(store.query(&[1.0, 0.0], 2).await.unwrap().is_empty());
        assert!(store.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_nearest_first_and_bounded_by_k() {
        let store = MemoryStore::new();
        store
            .add(vec![
                entry("far", vec![0.0, 1.0]),
                entry("near", vec![1.0, 0.0]),
                entry("mid", vec![1.0, 1.0]),
            ])
            .await
            .unwrap();

        let hits = store.query(&[1.0, 0.0], 2).await.unwrap();
        assert_eq!(texts(&hits), vec!["near", "mid"]);
        assert!(hits[0].distance <= hits[1].distance);

        let all = store.query(&[1.0, 0.0], 10).await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_ties_keep_insertion_order() {
        let store = MemoryStore::new();
        store
            .add(vec![
                entry("first", vec![1.0, 0.0]),
                entry("second", vec![2.0, 0.0]),
                entry("third", vec![3.0, 0.0]),
            ])
            .await
            .unwrap();
        let hits = store.query(&[1.0, 0.0], 2).await.unwrap();
        assert_eq!(texts(&hits), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_duplicates_kept() {
        let store = MemoryStore::new();
        store.add(vec![entry("same", vec![1.0, 0.0])]).await.unwrap();
        store.add(vec![entry("same", vec![1.0, 0.0])]).await.unwrap();
        assert_eq!(store.len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejected() {
        let store = MemoryStore::new();
        store.add(vec![entry("a", vec![1.0, 0.0])]).await.unwrap();
        let err = store.add(vec![entry("b", vec![1.0, 0.0, 0.0])]).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::VectorStore);
    }

    #[tokio::test]
    async fn test_persist_is_volatile_and_clear_empties() {
        let store = MemoryStore::new();
        store.add(vec![entry("a", vec![1.0])]).await.unwrap();
        assert_eq!(store.persist().await.unwrap(), Durability::Volatile);
        store.clear().await.unwrap();
        assert_eq!(store.len().await.unwrap(), 0);
    }
}
