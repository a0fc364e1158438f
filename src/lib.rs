//! finchat - Chat with your PDFs
//!
//! Document question answering over local or hosted models:
//! - pdf_oxide: PDF text extraction
//! - candle: sentence embeddings and quantized Llama generation
//! - LanceDB: persistent vector index (or an in-memory store)
//!
//! [`RetrievalChain`] ties the pieces together for one conversation.

pub mod auth;
pub mod chain;
pub mod chunking;
pub mod config;
pub mod device;
pub mod embed;
pub mod error;
pub mod generation;
pub mod pdf;
pub mod prompt;
pub mod session;
pub mod store;
pub mod types;

pub use auth::{resolve_token, save_token, HubClient, HubIdentity};
pub use chain::{ChainConfig, RetrievalChain};
pub use chunking::RecursiveChunker;
pub use config::{
    Backend, ChunkerConfig, Config, DevicePreference, EmbedderConfig, EmbeddingModelConfig, GenerationConfig,
    GenerationModelConfig, HubConfig, LimitsConfig, RetrievalConfig, StoreBackend, StoreConfig,
};
pub use device::{device_name, gpu_support_info, resolve_device, GpuSupportInfo};
pub use embed::{load_embedder, Embed, Embedder, RemoteEmbedder};
pub use error::{Error, ErrorKind, Result};
pub use generation::{load_generator, Generate, GenerationParams, LocalGenerator, RemoteGenerator};
pub use pdf::{extract_text, extract_text_from_base64_pdf, extract_text_from_pdf};
pub use prompt::PromptFormat;
pub use session::{SessionState, SessionStatus};
pub use store::{open_store, Durability, LanceStore, MemoryStore, SearchHit, VectorStore};
pub use types::*;
