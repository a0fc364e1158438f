//! Text embeddings
//!
//! [`Embed`] turns text into fixed-size vectors. Two backends:
//! - [`Embedder`] runs a BERT-family sentence model locally with candle
//! - [`RemoteEmbedder`] calls the Hugging Face Inference API
//!
//! Both return L2-normalised vectors, so cosine distance is meaningful.
//! Failures surface as [`Error::EmbeddingModel`] and are never retried.

mod local;
mod remote;

pub use local::Embedder;
pub use remote::RemoteEmbedder;

use crate::config::{Backend, Config};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Maps text to embedding vectors.
///
/// Deterministic for the same model and text. Every vector has
/// [`dimension`](Embed::dimension) components.
#[async_trait]
pub trait Embed: Send + Sync {
    /// Embed many texts, preserving order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::embedding(self.name(), "backend returned no vector"))
    }

    /// Embedding dimension
    fn dimension(&self) -> usize;

    /// Model identifier, for logs and errors
    fn name(&self) -> &str;
}

/// Build the embedder selected by `config.embedder.backend`
pub fn load_embedder(config: &Config, token: Option<&str>, show_progress: bool) -> Result<Arc<dyn Embed>> {
    match config.embedder.backend {
        Backend::Local => Ok(Arc::new(Embedder::new_with_model(
            &config.embedder.model,
            &config.embedder.device,
            config.embedder.batch_size,
            token,
            show_progress,
        )?)),
        Backend::Remote => Ok(Arc::new(RemoteEmbedder::new(
            &config.embedder.model,
            &config.hub,
            config.embedder.batch_size,
            token,
        )?)),
    }
}

/// Scale a vector to unit length; zero vectors are left as is
pub fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed;

    #[async_trait]
    impl Embed for Fixed {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }

        fn dimension(&self) -> usize {
            2
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    #[tokio::test]
    async fn test_embed_defaults_to_batch_of_one() {
        let v = Fixed.embed("abc").await.unwrap();
        assert_eq!(v, vec![3.0, 1.0]);
    }

    #[test]
    fn test_normalize() {
        let mut v = vec![3.0, 4.0];
        normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);

        let mut zero = vec![0.0, 0.0];
        normalize(&mut zero);
        assert_eq!(zero, vec![0.0, 0.0]);
    }
}
