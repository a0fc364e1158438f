//! Configuration management for finchat
//!
//! One TOML file (`~/.finchat/config.toml`) with a section per component.
//! Every section has documented defaults, so a missing file or a partial
//! file is always usable. `validate()` enforces the allowed ranges.

use crate::error::{Error, Result};
use crate::prompt::PromptFormat;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Device preference for compute
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DevicePreference {
    /// Automatically detect best available device (GPU if available, else CPU)
    #[default]
    Auto,
    /// Force CPU usage
    Cpu,
    /// Force Metal GPU (macOS Apple Silicon)
    Metal,
    /// Force CUDA GPU (NVIDIA)
    Cuda,
}

impl DevicePreference {
    /// Display name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Cpu => "cpu",
            Self::Metal => "metal",
            Self::Cuda => "cuda",
        }
    }
}

/// Where a model runs
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// In-process with candle, weights from the Hugging Face Hub
    #[default]
    Local,
    /// Hugging Face Inference API
    Remote,
}

impl Backend {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Embedding Model Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Embedding model configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingModelConfig {
    /// Unique identifier (used in config file)
    pub id: String,
    /// Display name
    pub name: String,
    /// HuggingFace repository ID
    pub repo_id: String,
    /// Embedding dimensions
    pub dimensions: usize,
    /// Approximate model size in MB
    #[serde(default)]
    pub size_mb: u32,
    /// Whether this is a curated (built-in) model
    #[serde(default)]
    pub curated: bool,
}

impl EmbeddingModelConfig {
    /// Create a custom model config
    pub fn custom(repo_id: &str, dimensions: usize) -> Self {
        let name = repo_id.split('/').last().unwrap_or(repo_id).to_string();
        Self {
            id: format!("custom:{}", repo_id),
            name,
            repo_id: repo_id.to_string(),
            dimensions,
            size_mb: 0,
            curated: false,
        }
    }

    pub fn all_minilm_l6_v2() -> Self {
        Self {
            id: "all-MiniLM-L6-v2".to_string(),
            name: "all-MiniLM-L6-v2".to_string(),
            repo_id: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            dimensions: 384,
            size_mb: 86,
            curated: true,
        }
    }

    pub fn bge_small_en_v15() -> Self {
        Self {
            id: "bge-small-en-v1.5".to_string(),
            name: "bge-small-en-v1.5".to_string(),
            repo_id: "BAAI/bge-small-en-v1.5".to_string(),
            dimensions: 384,
            size_mb: 134,
            curated: true,
        }
    }

    pub fn bge_large_en_v15() -> Self {
        Self {
            id: "bge-large-en-v1.5".to_string(),
            name: "bge-large-en-v1.5".to_string(),
            repo_id: "BAAI/bge-large-en-v1.5".to_string(),
            dimensions: 1024,
            size_mb: 1340,
            curated: true,
        }
    }

    /// Get all curated embedding models
    pub fn curated_models() -> Vec<Self> {
        vec![
            Self::all_minilm_l6_v2(),
            Self::bge_small_en_v15(),
            Self::bge_large_en_v15(),
        ]
    }

    /// Find a curated model by ID
    pub fn find_curated(id: &str) -> Option<Self> {
        Self::curated_models().into_iter().find(|m| m.id == id)
    }
}

impl Default for EmbeddingModelConfig {
    fn default() -> Self {
        Self::bge_small_en_v15()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Generation Model Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Generation model configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationModelConfig {
    pub id: String,
    pub name: String,
    /// Repository holding the GGUF weights (local backend)
    pub gguf_repo: String,
    /// GGUF file inside `gguf_repo`
    pub gguf_file: String,
    /// Repository holding `tokenizer.json` (local backend)
    pub tokenizer_repo: String,
    /// Model served by the Inference API (remote backend)
    pub remote_model: String,
    /// Context window in tokens
    pub context_length: usize,
    #[serde(default)]
    pub size_mb: u32,
    #[serde(default)]
    pub curated: bool,
}

impl GenerationModelConfig {
    pub fn llama2_7b_chat_q5() -> Self {
        Self {
            id: "llama-2-7b-chat-q5_k_s".to_string(),
            name: "Llama-2-7B-Chat Q5_K_S".to_string(),
            gguf_repo: "TheBloke/Llama-2-7B-Chat-GGUF".to_string(),
            gguf_file: "llama-2-7b-chat.Q5_K_S.gguf".to_string(),
            tokenizer_repo: "hf-internal-testing/llama-tokenizer".to_string(),
            remote_model: "meta-llama/Llama-2-7b-chat-hf".to_string(),
            context_length: 4096,
            size_mb: 4650,
            curated: true,
        }
    }

    pub fn llama2_7b_chat_q4() -> Self {
        Self {
            id: "llama-2-7b-chat-q4_k_m".to_string(),
            name: "Llama-2-7B-Chat Q4_K_M".to_string(),
            gguf_file: "llama-2-7b-chat.Q4_K_M.gguf".to_string(),
            size_mb: 4080,
            ..Self::llama2_7b_chat_q5()
        }
    }

    pub fn mistral_7b_instruct_q4() -> Self {
        Self {
            id: "mistral-7b-instruct-v0.1-q4_k_s".to_string(),
            name: "Mistral-7B-Instruct-v0.1 Q4_K_S".to_string(),
            gguf_repo: "TheBloke/Mistral-7B-Instruct-v0.1-GGUF".to_string(),
            gguf_file: "mistral-7b-instruct-v0.1.Q4_K_S.gguf".to_string(),
            tokenizer_repo: "mistralai/Mistral-7B-Instruct-v0.1".to_string(),
            remote_model: "mistralai/Mistral-7B-Instruct-v0.1".to_string(),
            context_length: 4096,
            size_mb: 4140,
            curated: true,
        }
    }

    pub fn curated_models() -> Vec<Self> {
        vec![
            Self::llama2_7b_chat_q5(),
            Self::llama2_7b_chat_q4(),
            Self::mistral_7b_instruct_q4(),
        ]
    }

    pub fn find_curated(id: &str) -> Option<Self> {
        Self::curated_models().into_iter().find(|m| m.id == id)
    }
}

impl Default for GenerationModelConfig {
    fn default() -> Self {
        Self::llama2_7b_chat_q5()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Component sections
// ─────────────────────────────────────────────────────────────────────────────

/// Embedder settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbedderConfig {
    pub backend: Backend,
    pub device: DevicePreference,
    /// Texts per forward pass (1..=512)
    pub batch_size: usize,
    pub model: EmbeddingModelConfig,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Local,
            model: EmbeddingModelConfig::default(),
            device: DevicePreference::default(),
            batch_size: 32,
        }
    }
}

/// Chunker settings; sizes are in characters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChunkerConfig {
    pub chunk_size: usize,
    /// Must be strictly smaller than `chunk_size`
    pub chunk_overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 300,
            chunk_overlap: 30,
        }
    }
}

/// Retrieval and conversation settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Chunks retrieved per question (>= 1)
    pub top_k: usize,
    /// Most recent turns included in the prompt (0 disables history)
    pub history_window: usize,
    /// Rewrite follow-up questions into standalone ones before retrieval
    pub condense_question: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 2,
            history_window: 3,
            condense_question: false,
        }
    }
}

/// Generation settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerationConfig {
    pub backend: Backend,
    pub device: DevicePreference,
    pub prompt_format: PromptFormat,
    /// 0.0 means greedy decoding (0.0..=2.0)
    pub temperature: f64,
    /// 1..=4096
    pub max_new_tokens: usize,
    /// Nucleus sampling cutoff in (0, 1]
    pub top_p: Option<f64>,
    /// 1.0 disables the penalty
    pub repeat_penalty: f32,
    /// Tokens looked back by the repeat penalty
    pub repeat_last_n: usize,
    pub seed: u64,
    pub model: GenerationModelConfig,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Local,
            model: GenerationModelConfig::default(),
            device: DevicePreference::default(),
            prompt_format: PromptFormat::default(),
            temperature: 0.0,
            max_new_tokens: 256,
            top_p: None,
            repeat_penalty: 1.1,
            repeat_last_n: 64,
            seed: 299_792_458,
        }
    }
}

/// Vector store backend
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-lifetime only; `persist()` is a no-op
    Memory,
    /// LanceDB directory, reloadable by a later process
    #[default]
    Lance,
}

/// Vector store settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Defaults to `~/.finchat/db`
    pub persist_dir: Option<PathBuf>,
}

impl StoreConfig {
    pub fn memory() -> Self {
        Self {
            backend: StoreBackend::Memory,
            persist_dir: None,
        }
    }

    /// Directory used by the LanceDB backend
    pub fn resolved_dir(&self) -> Result<PathBuf> {
        match &self.persist_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(finchat_dir()?.join("db")),
        }
    }
}

/// Input limits
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LimitsConfig {
    /// Largest accepted PDF in bytes
    pub max_upload_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

/// Hugging Face endpoints
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HubConfig {
    pub endpoint: String,
    pub inference_endpoint: String,
    /// Request timeout for hosted calls
    pub timeout_secs: u64,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://huggingface.co".to_string(),
            inference_endpoint: "https://api-inference.huggingface.co".to_string(),
            timeout_secs: 120,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// finchat configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Version of config schema
    #[serde(default = "current_version")]
    pub version: u32,
    #[serde(default)]
    pub embedder: EmbedderConfig,
    #[serde(default)]
    pub chunker: ChunkerConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub hub: HubConfig,
}

fn current_version() -> u32 {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            embedder: EmbedderConfig::default(),
            chunker: ChunkerConfig::default(),
            retrieval: RetrievalConfig::default(),
            generation: GenerationConfig::default(),
            store: StoreConfig::default(),
            limits: LimitsConfig::default(),
            hub: HubConfig::default(),
            version: current_version(),
        }
    }
}

impl Config {
    /// Get the config file path (~/.finchat/config.toml)
    pub fn path() -> Result<PathBuf> {
        Ok(finchat_dir()?.join("config.toml"))
    }

    /// Check if config exists (i.e., not first run)
    pub fn exists() -> bool {
        Self::path().map(|p| p.exists()).unwrap_or(false)
    }

    /// Load config from disk, or return None if it doesn't exist
    pub fn load() -> Result<Option<Self>> {
        let path = Self::path()?;
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        let config = Self::from_toml(&content)?;
        Ok(Some(config))
    }

    /// Load config from disk, falling back to defaults on first run
    pub fn load_or_default() -> Result<Self> {
        Ok(Self::load()?.unwrap_or_default())
    }

    /// Parse and validate a TOML document
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| Error::Config(format!("failed to parse config file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to disk
    pub fn save(&self) -> Result<()> {
        let path = Self::path()?;

        // Ensure directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to serialize config: {}", e)))?;
        std::fs::write(&path, content)?;

        Ok(())
    }

    /// Check every section against its allowed range
    pub fn validate(&self) -> Result<()> {
        let c = &self.chunker;
        if c.chunk_size == 0 {
            return Err(Error::Config("chunker.chunk_size must be greater than zero".into()));
        }
        if c.chunk_overlap >= c.chunk_size {
            return Err(Error::Config(format!(
                "chunker.chunk_overlap ({}) must be less than chunker.chunk_size ({})",
                c.chunk_overlap, c.chunk_size
            )));
        }

        if self.retrieval.top_k == 0 {
            return Err(Error::Config("retrieval.top_k must be at least 1".into()));
        }

        if !(1..=512).contains(&self.embedder.batch_size) {
            return Err(Error::Config("embedder.batch_size must be within 1..=512".into()));
        }
        if self.embedder.model.dimensions == 0 {
            return Err(Error::Config("embedder.model.dimensions must be greater than zero".into()));
        }

        let g = &self.generation;
        if !(0.0..=2.0).contains(&g.temperature) {
            return Err(Error::Config(format!(
                "generation.temperature ({}) must be within 0.0..=2.0",
                g.temperature
            )));
        }
        if !(1..=4096).contains(&g.max_new_tokens) {
            return Err(Error::Config("generation.max_new_tokens must be within 1..=4096".into()));
        }
        if let Some(top_p) = g.top_p {
            if !(top_p > 0.0 && top_p <= 1.0) {
                return Err(Error::Config(format!("generation.top_p ({}) must be within (0, 1]", top_p)));
            }
        }
        if g.repeat_penalty <= 0.0 {
            return Err(Error::Config("generation.repeat_penalty must be positive".into()));
        }
        if g.max_new_tokens >= g.model.context_length {
            return Err(Error::Config(format!(
                "generation.max_new_tokens ({}) must be smaller than the model context ({})",
                g.max_new_tokens, g.model.context_length
            )));
        }

        if self.limits.max_upload_bytes == 0 {
            return Err(Error::Config("limits.max_upload_bytes must be greater than zero".into()));
        }

        Ok(())
    }
}

/// Get the base finchat directory path (~/.finchat)
pub fn finchat_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME")
        .map_err(|_| Error::Config("HOME environment variable not set".into()))?;
    Ok(PathBuf::from(home).join(".finchat"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.chunker.chunk_size, 300);
        assert_eq!(config.chunker.chunk_overlap, 30);
        assert_eq!(config.retrieval.top_k, 2);
        assert_eq!(config.generation.temperature, 0.0);
        assert_eq!(config.embedder.model.id, "bge-small-en-v1.5");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config = Config::from_toml("[retrieval]\ntop_k = 5\n").unwrap();
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.retrieval.history_window, 3);
        assert_eq!(config.chunker, ChunkerConfig::default());
    }

    #[test]
    fn test_overlap_must_be_smaller_than_size() {
        let err = Config::from_toml("[chunker]\nchunk_size = 100\nchunk_overlap = 100\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_temperature_range() {
        let mut config = Config::default();
        config.generation.temperature = 2.5;
        assert!(config.validate().is_err());
        config.generation.temperature = 0.7;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_top_p_range() {
        let mut config = Config::default();
        config.generation.top_p = Some(0.0);
        assert!(config.validate().is_err());
        config.generation.top_p = Some(1.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_top_k_rejected() {
        let mut config = Config::default();
        config.retrieval.top_k = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_curated_models() {
        assert_eq!(EmbeddingModelConfig::curated_models().len(), 3);
        assert_eq!(GenerationModelConfig::curated_models().len(), 3);
        let q4 = GenerationModelConfig::find_curated("llama-2-7b-chat-q4_k_m").unwrap();
        assert_eq!(q4.gguf_repo, "TheBloke/Llama-2-7B-Chat-GGUF");
        assert!(GenerationModelConfig::find_curated("nonexistent").is_none());
    }

    #[test]
    fn test_custom_model() {
        let model = EmbeddingModelConfig::custom("sentence-transformers/all-mpnet-base-v2", 768);
        assert_eq!(model.name, "all-mpnet-base-v2");
        assert_eq!(model.dimensions, 768);
        assert!(!model.curated);
    }

    #[test]
    fn test_config_serialization() {
        let mut config = Config::default();
        config.store = StoreConfig::memory();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed = Config::from_toml(&toml_str).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_store_dir_override() {
        let store = StoreConfig {
            backend: StoreBackend::Lance,
            persist_dir: Some(PathBuf::from("/tmp/finchat-db")),
        };
        assert_eq!(store.resolved_dir().unwrap(), PathBuf::from("/tmp/finchat-db"));
    }
}
