//! Hosted embeddings via the Hugging Face Inference API

use super::{normalize, Embed};
use crate::config::{EmbeddingModelConfig, HubConfig};
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

pub struct RemoteEmbedder {
    client: reqwest::Client,
    url: String,
    model_id: String,
    token: Option<String>,
    dimensions: usize,
    batch_size: usize,
}

impl RemoteEmbedder {
    pub fn new(
        model: &EmbeddingModelConfig,
        hub: &HubConfig,
        batch_size: usize,
        token: Option<&str>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(hub.timeout_secs))
            .build()
            .map_err(|e| Error::embedding(&model.repo_id, e))?;

        Ok(Self {
            client,
            url: format!(
                "{}/pipeline/feature-extraction/{}",
                hub.inference_endpoint.trim_end_matches('/'),
                model.repo_id
            ),
            model_id: model.repo_id.clone(),
            token: token.map(str::to_string),
            dimensions: model.dimensions,
            batch_size: batch_size.max(1),
        })
    }

    /// One request body per `batch_size` inputs, in order
    fn request_bodies(&self, texts: &[String]) -> Vec<Value> {
        texts
            .chunks(self.batch_size)
            .map(|batch| {
                json!({
                    "inputs": batch,
                    "options": { "wait_for_model": true }
                })
            })
            .collect()
    }

    async fn post_batch(&self, body: &Value, expected: usize) -> Result<Vec<Vec<f32>>> {
        let mut request = self.client.post(&self.url).json(body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::embedding(&self.model_id, e))?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::embedding(&self.model_id, format!("HTTP {}: {}", status, detail)));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::embedding(&self.model_id, e))?;
        self.parse_response(body, expected)
    }

    /// Turn the endpoint's JSON into one normalised vector per input.
    ///
    /// Sentence models answer `[[f32; dim]; n]`; token-level models answer
    /// `[[[f32; dim]; tokens]; n]`, which is mean-pooled here.
    fn parse_response(&self, body: Value, expected: usize) -> Result<Vec<Vec<f32>>> {
        let rows = body
            .as_array()
            .ok_or_else(|| Error::embedding(&self.model_id, "response is not an array"))?;
        if rows.len() != expected {
            return Err(Error::embedding(
                &self.model_id,
                format!("expected {} vectors, got {}", expected, rows.len()),
            ));
        }

        rows.iter()
            .map(|row| {
                let mut vector = self.parse_row(row)?;
                if vector.len() != self.dimensions {
                    return Err(Error::embedding(
                        &self.model_id,
                        format!("endpoint returned {} dimensions, configured for {}", vector.len(), self.dimensions),
                    ));
                }
                normalize(&mut vector);
                Ok(vector)
            })
            .collect()
    }

    fn parse_row(&self, row: &Value) -> Result<Vec<f32>> {
        let malformed = || Error::embedding(&self.model_id, "malformed embedding in response");
        let items = row.as_array().ok_or_else(malformed)?;

        match items.first() {
            Some(Value::Array(_)) => {
                let tokens: Vec<Vec<f32>> = items
                    .iter()
                    .map(|t| floats(t).ok_or_else(malformed))
                    .collect::<Result<_>>()?;
                let width = tokens.first().map(Vec::len).unwrap_or(0);
                let mut mean = vec![0.0f32; width];
                for token in &tokens {
                    for (m, x) in mean.iter_mut().zip(token) {
                        *m += x;
                    }
                }
                let n = tokens.len().max(1) as f32;
                mean.iter_mut().for_each(|m| *m /= n);
                Ok(mean)
            }
            _ => floats(row).ok_or_else(malformed),
        }
    }
}

fn floats(value: &Value) -> Option<Vec<f32>> {
    value
        .as_array()?
        .iter()
        .map(|x| x.as_f64().map(|f| f as f32))
        .collect()
}

#[async_trait]
impl Embed for RemoteEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let bodies = self.request_bodies(texts);
        debug!(model = %self.model_id, texts = texts.len(), requests = bodies.len(), "remote embedding request");

        let mut out = Vec::with_capacity(texts.len());
        for (body, batch) in bodies.iter().zip(texts.chunks(self.batch_size)) {
            out.extend(self.post_batch(body, batch.len()).await?);
        }
        Ok(out)
    }

    fn dimension(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        &self.model_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embedder(dimensions: usize) -> RemoteEmbedder {
        let model = EmbeddingModelConfig::custom("org/model", dimensions);
        RemoteEmbedder::new(&model, &HubConfig::default(), 2, None).unwrap()
    }

    #[test]
    fn test_inputs_split_by_batch_size() {
        let e = embedder(2);
        let texts: Vec<String> = ["a", "b", "c", "d", "e"].iter().map(|t| t.to_string()).collect();
        let bodies = e.request_bodies(&texts);
        assert_eq!(bodies.len(), 3);
        assert_eq!(bodies[0]["inputs"], json!(["a", "b"]));
        assert_eq!(bodies[2]["inputs"], json!(["e"]));
        assert!(e.request_bodies(&[]).is_empty());
    }

    #[test]
    fn test_url_targets_feature_extraction() {
        let e = embedder(2);
        assert_eq!(
            e.url,
            "https://api-inference.huggingface.co/pipeline/feature-extraction/org/model"
        );
    }

    #[test]
    fn test_parse_sentence_vectors() {
        let e = embedder(2);
        let vectors = e.parse_response(json!([[3.0, 4.0], [0.0, 2.0]]), 2).unwrap();
        assert!((vectors[0][0] - 0.6).abs() < 1e-6);
        assert_eq!(vectors[1], vec![0.0, 1.0]);
    }

    #[test]
    fn test_parse_token_vectors_mean_pooled() {
        let e = embedder(2);
        let vectors = e.parse_response(json!([[[2.0, 0.0], [0.0, 2.0]]]), 1).unwrap();
        let expected = 1.0 / 2f32.sqrt();
        assert!((vectors[0][0] - expected).abs() < 1e-6);
        assert!((vectors[0][1] - expected).abs() < 1e-6);
    }

    #[test]
    fn test_dimension_mismatch_is_embedding_error() {
        let e = embedder(3);
        let err = e.parse_response(json!([[1.0, 2.0]]), 1).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::EmbeddingModel);
    }

    #[test]
    fn test_count_mismatch_rejected() {
        let e = embedder(2);
        assert!(e.parse_response(json!([[1.0, 2.0]]), 2).is_err());
        assert!(e.parse_response(json!({"error": "loading"}), 1).is_err());
    }
}
