use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Free-form document metadata (`source`, `chunk_index`, ...)
pub type Metadata = BTreeMap<String, String>;

/// Text extracted from one uploaded file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub text: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// A bounded slice of a document, the unit of retrieval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    #[serde(default)]
    pub metadata: Metadata,
    /// Char offset of `text` within the source document
    pub start: usize,
}

impl Chunk {
    /// Content hash, identifies retrieved chunks in logs
    pub fn content_hash(&self) -> String {
        format!("{:x}", md5::compute(self.text.as_bytes()))
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// A chunk plus its embedding, as held by a vector store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorStoreEntry {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// One completed question/answer exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub question: String,
    pub answer: String,
    pub asked_at: DateTime<Utc>,
}

impl ChatTurn {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
            asked_at: Utc::now(),
        }
    }
}

/// A PDF handed to the session, not yet processed
#[derive(Debug, Clone)]
pub struct Upload {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// Read a PDF from disk, named after its file name.
    ///
    /// The size is checked before the file is read.
    pub fn from_path(path: &std::path::Path, max_bytes: usize) -> crate::error::Result<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        crate::pdf::check_size(&name, std::fs::metadata(path)?.len(), max_bytes)?;
        Ok(Self::new(name, std::fs::read(path)?))
    }
}

/// Answer to a question with the chunks it was conditioned on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<Chunk>,
}

/// Result of a "process documents" action
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessReport {
    pub documents: usize,
    pub empty_documents: usize,
    pub chunks: usize,
    /// Whether the index survives a restart
    pub durable: bool,
}

// ============================================================================
// HTTP API types
// ============================================================================

/// A PDF sent over the API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadInput {
    pub name: String,
    /// Base64-encoded PDF bytes
    pub content: String,
}

impl UploadInput {
    /// Decode the base64 payload into an [`Upload`]
    pub fn decode(self) -> crate::error::Result<Upload> {
        use base64::Engine;

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(self.content.trim())
            .map_err(|e| crate::error::Error::parse(&self.name, format!("failed to decode base64: {}", e)))?;
        Ok(Upload::new(self.name, bytes))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadRequest {
    pub documents: Vec<UploadInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskResponse {
    pub question: String,
    pub answer: String,
    pub sources: Vec<Chunk>,
    pub history_len: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub token: String,
    /// Also write the token to the Hugging Face cache
    #[serde(default)]
    pub save: bool,
}
