//! Vector stores
//!
//! A [`VectorStore`] holds [`VectorStoreEntry`] values and answers k-nearest
//! queries by cosine distance. Backends:
//! - [`MemoryStore`] lives for the process only
//! - [`LanceStore`] keeps a LanceDB table on disk that a later process can reopen

mod lance;
mod memory;

pub use lance::LanceStore;
pub use memory::MemoryStore;

use crate::config::{StoreBackend, StoreConfig};
use crate::error::Result;
use crate::types::{Chunk, VectorStoreEntry};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A stored chunk returned by a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub chunk: Chunk,
    /// Cosine distance to the query, `1 - similarity`
    pub distance: f32,
}

/// Outcome of [`VectorStore::persist`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Durability {
    /// Nothing is written; contents end with the process
    Volatile,
    /// Contents are on disk at `path`
    Durable { path: PathBuf },
}

impl Durability {
    pub fn is_durable(&self) -> bool {
        matches!(self, Self::Durable { .. })
    }
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Append entries in order. Duplicates are kept.
    async fn add(&self, entries: Vec<VectorStoreEntry>) -> Result<()>;

    /// The `k` entries nearest to `vector`, nearest first.
    ///
    /// Returns every entry when the store holds fewer than `k`, and an empty
    /// list when it is empty. Equal distances keep insertion order.
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<SearchHit>>;

    /// Make the current contents durable where the backend supports it
    async fn persist(&self) -> Result<Durability>;

    async fn len(&self) -> Result<usize>;

    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Remove every entry
    async fn clear(&self) -> Result<()>;

    /// Backend name, for logs and errors
    fn name(&self) -> &'static str;
}

/// Open the store selected by `config`
pub async fn open_store(config: &StoreConfig, dimensions: usize) -> Result<Box<dyn VectorStore>> {
    match config.backend {
        StoreBackend::Memory => Ok(Box::new(MemoryStore::new())),
        StoreBackend::Lance => {
            let dir = config.resolved_dir()?;
            Ok(Box::new(LanceStore::open(&dir, dimensions).await?))
        }
    }
}

/// Cosine distance; 1.0 when either vector has zero magnitude
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_distance() {
        assert!(cosine_distance(&[1.0, 0.0], &[2.0, 0.0]).abs() < 1e-6);
        assert!((cosine_distance(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-6);
        assert!((cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]) - 2.0).abs() < 1e-6);
        assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]), 1.0);
    }

    #[test]
    fn test_durability_serializes_tagged() {
        let json = serde_json::to_value(Durability::Volatile).unwrap();
        assert_eq!(json["kind"], "volatile");
        assert!(!Durability::Volatile.is_durable());
    }
}
