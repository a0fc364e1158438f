//! Error types for finchat
//!
//! Every failure carries a category ([`ErrorKind`]) so callers can tell a
//! malformed PDF from an unavailable model without parsing messages.

use serde::Serialize;
use thiserror::Error;

/// Errors produced by the document pipeline and the chat controller.
#[derive(Debug, Error)]
pub enum Error {
    /// The uploaded file could not be read as a PDF (or was rejected before parsing).
    #[error("Failed to parse document '{document}': {message}")]
    DocumentParse { document: String, message: String },

    /// The embedding backend is unavailable or misconfigured.
    #[error("Embedding model error ({model}): {message}")]
    EmbeddingModel { model: String, message: String },

    /// The generation backend is unavailable, out of memory, or refused the credential.
    #[error("Generation model error ({model}): {message}")]
    GenerationModel { model: String, message: String },

    /// A question was asked before any documents were indexed.
    #[error("No documents have been processed yet")]
    NotReady,

    /// The model hub rejected the credential.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The vector store backend failed.
    #[error("Vector store error ({backend}): {message}")]
    VectorStore { backend: String, message: String },

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input from the caller (empty question, etc).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Programmatic error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    DocumentParse,
    EmbeddingModel,
    GenerationModel,
    NotReady,
    Authentication,
    VectorStore,
    Config,
    InvalidInput,
    Io,
}

impl ErrorKind {
    /// Stable identifier used in API responses
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DocumentParse => "document_parse",
            Self::EmbeddingModel => "embedding_model",
            Self::GenerationModel => "generation_model",
            Self::NotReady => "not_ready",
            Self::Authentication => "authentication",
            Self::VectorStore => "vector_store",
            Self::Config => "config",
            Self::InvalidInput => "invalid_input",
            Self::Io => "io",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DocumentParse { .. } => ErrorKind::DocumentParse,
            Self::EmbeddingModel { .. } => ErrorKind::EmbeddingModel,
            Self::GenerationModel { .. } => ErrorKind::GenerationModel,
            Self::NotReady => ErrorKind::NotReady,
            Self::Authentication(_) => ErrorKind::Authentication,
            Self::VectorStore { .. } => ErrorKind::VectorStore,
            Self::Config(_) => ErrorKind::Config,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::Io(_) => ErrorKind::Io,
        }
    }

    /// Human-readable message, distinct per kind.
    ///
    /// The raw detail is available through `Display`; this is the line a
    /// user should see first.
    pub fn user_message(&self) -> &'static str {
        match self.kind() {
            ErrorKind::DocumentParse => "One of the uploaded files could not be read as a PDF.",
            ErrorKind::EmbeddingModel => "The embedding model is unavailable. Check the model name and your connection.",
            ErrorKind::GenerationModel => "The language model failed to produce an answer. Check the model, memory and your token.",
            ErrorKind::NotReady => "Please upload and process PDFs before asking questions.",
            ErrorKind::Authentication => "Failed to connect to Hugging Face: the token was rejected.",
            ErrorKind::VectorStore => "The document index could not be read or written.",
            ErrorKind::Config => "The configuration is invalid.",
            ErrorKind::InvalidInput => "The request was not understood.",
            ErrorKind::Io => "A file could not be read or written.",
        }
    }

    pub(crate) fn embedding(model: &str, message: impl std::fmt::Display) -> Self {
        Self::EmbeddingModel {
            model: model.to_string(),
            message: message.to_string(),
        }
    }

    pub(crate) fn generation(model: &str, message: impl std::fmt::Display) -> Self {
        Self::GenerationModel {
            model: model.to_string(),
            message: message.to_string(),
        }
    }

    pub(crate) fn parse(document: &str, message: impl std::fmt::Display) -> Self {
        Self::DocumentParse {
            document: document.to_string(),
            message: message.to_string(),
        }
    }

    pub(crate) fn store(backend: &str, message: impl std::fmt::Display) -> Self {
        Self::VectorStore {
            backend: backend.to_string(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
