//! Answer generation
//!
//! [`Generate`] turns a finished prompt into text. Two backends:
//! - [`LocalGenerator`] runs a quantized GGUF Llama with candle
//! - [`RemoteGenerator`] calls the Hugging Face Inference API
//!
//! Any failure, including a rejected credential, is an
//! [`Error::GenerationModel`](crate::Error::GenerationModel).

mod local;
mod remote;

pub use local::LocalGenerator;
pub use remote::RemoteGenerator;

use crate::config::{Backend, Config, GenerationConfig};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Sampling settings for one generation call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// 0.0 selects greedy decoding
    pub temperature: f64,
    pub max_new_tokens: usize,
    pub top_p: Option<f64>,
    /// 1.0 disables the penalty
    pub repeat_penalty: f32,
    pub repeat_last_n: usize,
    pub seed: u64,
}

impl GenerationParams {
    pub fn is_greedy(&self) -> bool {
        self.temperature <= 0.0
    }
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self::from(&GenerationConfig::default())
    }
}

impl From<&GenerationConfig> for GenerationParams {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_new_tokens: config.max_new_tokens,
            top_p: config.top_p,
            repeat_penalty: config.repeat_penalty,
            repeat_last_n: config.repeat_last_n,
            seed: config.seed,
        }
    }
}

#[async_trait]
pub trait Generate: Send + Sync {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String>;

    /// Model identifier, for logs and errors
    fn name(&self) -> &str;
}

/// Build the generator selected by `config.generation.backend`
pub fn load_generator(config: &Config, token: Option<&str>, show_progress: bool) -> Result<Arc<dyn Generate>> {
    match config.generation.backend {
        Backend::Local => Ok(Arc::new(LocalGenerator::new_with_model(
            &config.generation.model,
            &config.generation.device,
            token,
            show_progress,
        )?)),
        Backend::Remote => Ok(Arc::new(RemoteGenerator::new(
            &config.generation.model,
            &config.hub,
            token,
        )?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params_are_greedy() {
        let params = GenerationParams::default();
        assert!(params.is_greedy());
        assert_eq!(params.max_new_tokens, 256);
    }

    #[test]
    fn test_params_follow_config() {
        let config = GenerationConfig {
            temperature: 0.7,
            top_p: Some(0.9),
            ..GenerationConfig::default()
        };
        let params = GenerationParams::from(&config);
        assert!(!params.is_greedy());
        assert_eq!(params.top_p, Some(0.9));
    }
}
