//! Local generation with a quantized Llama (GGUF) on candle
//!
//! Weights and tokenizer come from the Hugging Face Hub and are cached by
//! hf-hub. The model keeps a KV cache, so calls are serialised behind a mutex;
//! every call starts again at position 0, which resets that cache.

use super::{Generate, GenerationParams};
use crate::config::{DevicePreference, GenerationModelConfig};
use crate::device::{device_name, resolve_device};
use crate::error::{Error, Result};
use async_trait::async_trait;
use candle_core::quantized::gguf_file;
use candle_core::{Device, Tensor};
use candle_transformers::generation::LogitsProcessor;
use candle_transformers::models::quantized_llama::ModelWeights;
use hf_hub::{api::sync::ApiBuilder, Repo, RepoType};
use std::sync::Mutex;
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

const EOS_TOKEN: &str = "</s>";

pub struct LocalGenerator {
    model: Mutex<ModelWeights>,
    tokenizer: Tokenizer,
    device: Device,
    eos_token_id: u32,
    context_length: usize,
    name: String,
}

impl LocalGenerator {
    pub fn new_with_model(
        model_config: &GenerationModelConfig,
        device_pref: &DevicePreference,
        token: Option<&str>,
        show_progress: bool,
    ) -> Result<Self> {
        let name = format!("{}/{}", model_config.gguf_repo, model_config.gguf_file);
        let err = |e: &dyn std::fmt::Display| Error::generation(&name, e);

        let device = resolve_device(device_pref)?;
        info!(
            model = %model_config.name,
            size_mb = model_config.size_mb,
            device = device_name(&device),
            "loading generation model"
        );

        let api = ApiBuilder::new()
            .with_progress(show_progress)
            .with_token(token.map(str::to_string))
            .build()
            .map_err(|e| err(&e))?;

        let weights_path = api
            .repo(Repo::new(model_config.gguf_repo.clone(), RepoType::Model))
            .get(&model_config.gguf_file)
            .map_err(|e| err(&format!("{}: {}", model_config.gguf_file, e)))?;
        let tokenizer_path = api
            .repo(Repo::new(model_config.tokenizer_repo.clone(), RepoType::Model))
            .get("tokenizer.json")
            .map_err(|e| err(&format!("tokenizer.json: {}", e)))?;

        let mut file = std::fs::File::open(&weights_path)?;
        let content = gguf_file::Content::read(&mut file).map_err(|e| err(&e.with_path(&weights_path)))?;
        let model = ModelWeights::from_gguf(content, &mut file, &device).map_err(|e| err(&e))?;

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| err(&format!("failed to load tokenizer: {}", e)))?;
        let eos_token_id = tokenizer
            .token_to_id(EOS_TOKEN)
            .ok_or_else(|| err(&format!("tokenizer has no {} token", EOS_TOKEN)))?;

        Ok(Self {
            model: Mutex::new(model),
            tokenizer,
            device,
            eos_token_id,
            context_length: model_config.context_length,
            name,
        })
    }

    /// Get the name of the device being used
    pub fn device_name(&self) -> &'static str {
        device_name(&self.device)
    }

    /// Keep the most recent tokens so prompt plus answer fit the context
    fn fit_prompt(&self, mut tokens: Vec<u32>, max_new_tokens: usize) -> Vec<u32> {
        let budget = self.context_length.saturating_sub(max_new_tokens).max(1);
        if tokens.len() > budget {
            warn!(
                prompt_tokens = tokens.len(),
                budget,
                "prompt exceeds the context window, dropping the oldest tokens"
            );
            tokens.drain(..tokens.len() - budget);
        }
        tokens
    }

    fn sample_loop(
        &self,
        model: &mut ModelWeights,
        prompt: &[u32],
        params: &GenerationParams,
    ) -> candle_core::Result<Vec<u32>> {
        let temperature = if params.is_greedy() { None } else { Some(params.temperature) };
        let mut processor = LogitsProcessor::new(params.seed, temperature, params.top_p);

        let mut context: Vec<u32> = prompt.to_vec();
        let mut generated = Vec::new();

        let input = Tensor::new(prompt, &self.device)?.unsqueeze(0)?;
        let logits = model.forward(&input, 0)?.squeeze(0)?;
        let mut next = processor.sample(&self.penalize(logits, &context, params)?)?;

        while generated.len() < params.max_new_tokens {
            if next == self.eos_token_id {
                break;
            }
            generated.push(next);
            context.push(next);
            if generated.len() == params.max_new_tokens {
                break;
            }

            let pos = prompt.len() + generated.len() - 1;
            let input = Tensor::new(&[next], &self.device)?.unsqueeze(0)?;
            let logits = model.forward(&input, pos)?.squeeze(0)?;
            next = processor.sample(&self.penalize(logits, &context, params)?)?;
        }

        Ok(generated)
    }

    fn penalize(&self, logits: Tensor, context: &[u32], params: &GenerationParams) -> candle_core::Result<Tensor> {
        if params.repeat_penalty == 1.0 {
            return Ok(logits);
        }
        let start_at = context.len().saturating_sub(params.repeat_last_n);
        candle_transformers::utils::apply_repeat_penalty(&logits, params.repeat_penalty, &context[start_at..])
    }
}

#[async_trait]
impl Generate for LocalGenerator {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let err = |e: &dyn std::fmt::Display| Error::generation(&self.name, e);

        let encoding = self
            .tokenizer
            .encode(prompt, true)
            .map_err(|e| err(&format!("tokenization failed: {}", e)))?;
        let tokens = self.fit_prompt(encoding.get_ids().to_vec(), params.max_new_tokens);

        let generated = {
            let mut model = self.model.lock().map_err(|_| err(&"model lock poisoned"))?;
            self.sample_loop(&mut model, &tokens, params).map_err(|e| err(&e))?
        };
        debug!(prompt_tokens = tokens.len(), new_tokens = generated.len(), "generation finished");

        let text = self
            .tokenizer
            .decode(&generated, true)
            .map_err(|e| err(&format!("detokenization failed: {}", e)))?;
        Ok(text.trim().to_string())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
