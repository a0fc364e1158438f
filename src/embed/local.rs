//! Local embeddings using Candle (pure Rust)
//!
//! No ONNX runtime. Weights are fetched from the Hugging Face Hub on first
//! use and cached by hf-hub.

use super::Embed;
use crate::config::{DevicePreference, EmbeddingModelConfig};
use crate::device::{device_name, resolve_device};
use crate::error::{Error, Result};
use async_trait::async_trait;
use candle_core::{Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig, DTYPE};
use hf_hub::{api::sync::ApiBuilder, Repo, RepoType};
use tokenizers::Tokenizer;
use tracing::info;

/// BERT models have max 512 position embeddings
const MAX_SEQ_LEN: usize = 512;

pub struct Embedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    model_id: String,
    dimensions: usize,
    batch_size: usize,
}

impl Embedder {
    /// Create a new embedder with a specific model and device preference
    pub fn new_with_model(
        embedding_model: &EmbeddingModelConfig,
        device_pref: &DevicePreference,
        batch_size: usize,
        token: Option<&str>,
        show_progress: bool,
    ) -> Result<Self> {
        let model_id = embedding_model.repo_id.clone();
        let err = |e: &dyn std::fmt::Display| Error::embedding(&model_id, e);

        let device = resolve_device(device_pref)?;
        info!(
            model = %embedding_model.name,
            size_mb = embedding_model.size_mb,
            device = device_name(&device),
            "loading embedding model"
        );

        // Download model files from HuggingFace
        let api = ApiBuilder::new()
            .with_progress(show_progress)
            .with_token(token.map(str::to_string))
            .build()
            .map_err(|e| err(&e))?;
        let repo = api.repo(Repo::new(model_id.clone(), RepoType::Model));

        let config_path = repo.get("config.json").map_err(|e| err(&format!("config.json: {}", e)))?;
        let tokenizer_path = repo
            .get("tokenizer.json")
            .map_err(|e| err(&format!("tokenizer.json: {}", e)))?;
        let weights_path = repo
            .get("model.safetensors")
            .map_err(|e| err(&format!("model.safetensors: {}", e)))?;

        let config_str = std::fs::read_to_string(&config_path)?;
        let bert_config: BertConfig = serde_json::from_str(&config_str).map_err(|e| err(&e))?;

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| err(&format!("failed to load tokenizer: {}", e)))?;

        // SAFETY: the mmaped file is owned by the hf-hub cache and not modified while loaded
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], DTYPE, &device).map_err(|e| err(&e))?
        };
        let model = BertModel::load(vb, &bert_config).map_err(|e| err(&e))?;

        Ok(Self {
            model,
            tokenizer,
            device,
            model_id,
            dimensions: embedding_model.dimensions,
            batch_size: batch_size.max(1),
        })
    }

    /// Get the name of the device being used
    pub fn device_name(&self) -> &'static str {
        device_name(&self.device)
    }

    fn forward_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let err = |e: &dyn std::fmt::Display| Error::embedding(&self.model_id, e);

        let tokens = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| err(&format!("tokenization failed: {}", e)))?;

        let max_len = tokens
            .iter()
            .map(|t| t.get_ids().len().min(MAX_SEQ_LEN))
            .max()
            .unwrap_or(0);

        let mut input_ids_vec = Vec::with_capacity(texts.len() * max_len);
        let mut attention_mask_vec = Vec::with_capacity(texts.len() * max_len);

        for encoding in &tokens {
            let mut ids: Vec<u32> = encoding.get_ids().iter().take(MAX_SEQ_LEN).copied().collect();
            let mut mask: Vec<u32> = encoding
                .get_attention_mask()
                .iter()
                .take(MAX_SEQ_LEN)
                .copied()
                .collect();
            ids.resize(max_len, 0);
            mask.resize(max_len, 0);
            input_ids_vec.extend(ids);
            attention_mask_vec.extend(mask);
        }

        let shape = (texts.len(), max_len);
        let input_ids = Tensor::from_vec(input_ids_vec, shape, &self.device).map_err(|e| err(&e))?;
        let attention_mask = Tensor::from_vec(attention_mask_vec, shape, &self.device).map_err(|e| err(&e))?;
        let token_type_ids = input_ids.zeros_like().map_err(|e| err(&e))?;

        let pooled = self
            .pool(&input_ids, &token_type_ids, &attention_mask)
            .map_err(|e| err(&e))?;

        let vectors: Vec<Vec<f32>> = pooled.to_vec2().map_err(|e| err(&e))?;
        if let Some(v) = vectors.first() {
            if v.len() != self.dimensions {
                return Err(err(&format!(
                    "model produced {} dimensions, configured for {}",
                    v.len(),
                    self.dimensions
                )));
            }
        }
        Ok(vectors)
    }

    /// Mean pooling over the sequence, then L2 normalisation
    fn pool(
        &self,
        input_ids: &Tensor,
        token_type_ids: &Tensor,
        attention_mask: &Tensor,
    ) -> candle_core::Result<Tensor> {
        let embeddings = self.model.forward(input_ids, token_type_ids, Some(attention_mask))?;

        let attention_mask_f = attention_mask.to_dtype(DTYPE)?;
        let mask_expanded = attention_mask_f.unsqueeze(2)?.broadcast_as(embeddings.shape())?;

        let sum_embeddings = (embeddings * mask_expanded)?.sum(1)?;
        let sum_mask = attention_mask_f.sum(1)?.unsqueeze(1)?;
        // recip + mul instead of broadcast_div (more stable on Metal GPU)
        let mean_embeddings = sum_embeddings.broadcast_mul(&sum_mask.recip()?)?;

        let norms = mean_embeddings.sqr()?.sum(1)?.sqrt()?.unsqueeze(1)?;
        mean_embeddings.broadcast_mul(&norms.recip()?)
    }
}

#[async_trait]
impl Embed for Embedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            out.extend(self.forward_batch(batch)?);
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
