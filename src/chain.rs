//! Conversational retrieval chain
//!
//! Owns one session: pending uploads, the vector index built from them and
//! the chat history. The flow is
//!
//! - `upload_documents` stages PDFs
//! - `process_documents` extracts, chunks and embeds them, then replaces the index
//! - `ask` retrieves the nearest chunks and has the model answer from them
//!
//! Questions are refused with [`Error::NotReady`] until an index exists.

use crate::chunking::RecursiveChunker;
use crate::config::{ChunkerConfig, Config, RetrievalConfig};
use crate::embed::{load_embedder, Embed};
use crate::error::{Error, Result};
use crate::generation::{load_generator, Generate, GenerationParams};
use crate::pdf::{check_size, extract_document};
use crate::prompt::{build_condense_prompt, build_qa_prompt, PromptFormat};
use crate::session::{SessionState, SessionStatus};
use crate::store::{open_store, VectorStore};
use crate::types::{Answer, ChatTurn, Chunk, Document, ProcessReport, Upload, VectorStoreEntry};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Settings the chain needs at runtime
#[derive(Debug, Clone, PartialEq)]
pub struct ChainConfig {
    pub chunker: ChunkerConfig,
    pub retrieval: RetrievalConfig,
    pub generation: GenerationParams,
    pub prompt_format: PromptFormat,
    pub max_upload_bytes: usize,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for ChainConfig {
    fn from(config: &Config) -> Self {
        Self {
            chunker: config.chunker.clone(),
            retrieval: config.retrieval.clone(),
            generation: GenerationParams::from(&config.generation),
            prompt_format: config.generation.prompt_format,
            max_upload_bytes: config.limits.max_upload_bytes,
        }
    }
}

pub struct RetrievalChain {
    embedder: Arc<dyn Embed>,
    generator: Arc<dyn Generate>,
    store: Box<dyn VectorStore>,
    chunker: RecursiveChunker,
    config: ChainConfig,
    state: SessionState,
}

impl RetrievalChain {
    pub fn new(
        embedder: Arc<dyn Embed>,
        generator: Arc<dyn Generate>,
        store: Box<dyn VectorStore>,
        config: ChainConfig,
    ) -> Result<Self> {
        if config.retrieval.top_k == 0 {
            return Err(Error::Config("retrieval.top_k must be at least 1".into()));
        }
        let chunker = RecursiveChunker::new(config.chunker.chunk_size, config.chunker.chunk_overlap)?;
        Ok(Self {
            embedder,
            generator,
            store,
            chunker,
            config,
            state: SessionState::new(),
        })
    }

    /// Load the configured backends and pick up an existing persistent index
    pub async fn load(config: &Config, token: Option<&str>, show_progress: bool) -> Result<Self> {
        config.validate()?;
        let embedder = load_embedder(config, token, show_progress)?;
        let generator = load_generator(config, token, show_progress)?;
        let store = open_store(&config.store, embedder.dimension()).await?;

        let mut chain = Self::new(embedder, generator, store, ChainConfig::from(config))?;
        chain.resume().await?;
        Ok(chain)
    }

    pub fn status(&self) -> SessionStatus {
        self.state.status()
    }

    pub fn is_ready(&self) -> bool {
        self.state.is_ready()
    }

    pub fn history(&self) -> &[ChatTurn] {
        self.state.history()
    }

    pub fn pending_uploads(&self) -> &[Upload] {
        self.state.uploads()
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn embedder_name(&self) -> &str {
        self.embedder.name()
    }

    pub fn generator_name(&self) -> &str {
        self.generator.name()
    }

    pub fn store_name(&self) -> &'static str {
        self.store.name()
    }

    /// Entries currently in the index
    pub async fn indexed_chunks(&self) -> Result<usize> {
        self.store.len().await
    }

    /// Stage PDFs for the next `process_documents`, replacing earlier ones.
    ///
    /// Nothing is staged when any file is over the size limit.
    pub fn upload_documents(&mut self, uploads: Vec<Upload>) -> Result<usize> {
        for upload in &uploads {
            check_size(&upload.name, upload.bytes.len() as u64, self.config.max_upload_bytes)?;
        }

        let count = uploads.len();
        self.state.set_uploads(uploads);
        debug!(count, "staged uploads");
        Ok(count)
    }

    /// Rebuild the index from the staged uploads.
    ///
    /// With nothing staged this is a no-op. On failure the index is cleared
    /// and the session is `Empty`; the history is kept either way.
    pub async fn process_documents(&mut self) -> Result<ProcessReport> {
        if self.state.uploads().is_empty() {
            info!("no documents uploaded, nothing to process");
            return Ok(ProcessReport::default());
        }

        match self.build_index().await {
            Ok(report) => Ok(report),
            Err(e) => {
                warn!(error = %e, "processing failed, index cleared");
                if let Err(clear_err) = self.store.clear().await {
                    warn!(error = %clear_err, "failed to clear index after error");
                }
                self.state.mark_empty();
                Err(e)
            }
        }
    }

    async fn build_index(&mut self) -> Result<ProcessReport> {
        let documents: Vec<Document> = self
            .state
            .uploads()
            .iter()
            .map(|u| extract_document(u, self.config.max_upload_bytes))
            .collect::<Result<_>>()?;
        let empty_documents = documents.iter().filter(|d| d.text.trim().is_empty()).count();
        if empty_documents > 0 {
            warn!(count = empty_documents, "some documents contain no extractable text");
        }

        let chunks = self.chunker.split_documents(&documents);
        if chunks.is_empty() {
            self.store.clear().await?;
            self.state.mark_empty();
            info!(documents = documents.len(), "documents produced no text to index");
            return Ok(ProcessReport {
                documents: documents.len(),
                empty_documents,
                chunks: 0,
                durable: false,
            });
        }

        // Embed everything before touching the store
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;
        if vectors.len() != chunks.len() {
            return Err(Error::embedding(
                self.embedder.name(),
                format!("expected {} vectors, got {}", chunks.len(), vectors.len()),
            ));
        }

        let entries: Vec<VectorStoreEntry> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| VectorStoreEntry { chunk, vector })
            .collect();
        let chunk_count = entries.len();

        self.store.clear().await?;
        self.store.add(entries).await?;
        let durability = self.store.persist().await?;
        self.state.mark_indexed();

        info!(
            documents = documents.len(),
            chunks = chunk_count,
            store = self.store.name(),
            durable = durability.is_durable(),
            "documents indexed"
        );

        Ok(ProcessReport {
            documents: documents.len(),
            empty_documents,
            chunks: chunk_count,
            durable: durability.is_durable(),
        })
    }

    /// Answer a question from the indexed documents.
    ///
    /// Only a successful answer is recorded in the history.
    pub async fn ask(&mut self, question: &str) -> Result<Answer> {
        if !self.state.is_ready() {
            return Err(Error::NotReady);
        }
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::InvalidInput("question is empty".into()));
        }

        let recent: Vec<ChatTurn> = self
            .state
            .recent_history(self.config.retrieval.history_window)
            .to_vec();
        let standalone = self.standalone_question(&recent, question).await?;

        let query_vector = self.embedder.embed(&standalone).await?;
        let hits = self.store.query(&query_vector, self.config.retrieval.top_k).await?;
        debug!(
            hits = hits.len(),
            nearest = hits.first().map(|h| h.distance),
            chunks = ?hits.iter().map(|h| h.chunk.content_hash()).collect::<Vec<_>>(),
            "retrieved context"
        );
        let sources: Vec<Chunk> = hits.into_iter().map(|h| h.chunk).collect();

        let prompt = build_qa_prompt(self.config.prompt_format, &sources, &recent, &standalone);
        let answer = self.generator.generate(&prompt, &self.config.generation).await?;

        self.state.push_turn(ChatTurn::new(question, answer.clone()));
        info!(history_len = self.state.history().len(), sources = sources.len(), "question answered");

        Ok(Answer { text: answer, sources })
    }

    /// Rewrite a follow-up into a standalone question when enabled
    async fn standalone_question(&self, recent: &[ChatTurn], question: &str) -> Result<String> {
        if !self.config.retrieval.condense_question || recent.is_empty() {
            return Ok(question.to_string());
        }

        let prompt = build_condense_prompt(self.config.prompt_format, recent, question);
        let rewritten = self.generator.generate(&prompt, &self.config.generation).await?;
        let rewritten = rewritten.trim();
        if rewritten.is_empty() {
            return Ok(question.to_string());
        }
        debug!(original = question, standalone = rewritten, "condensed question");
        Ok(rewritten.to_string())
    }

    /// Drop the index, the history and the staged uploads
    pub async fn reset(&mut self) -> Result<()> {
        self.store.clear().await?;
        self.state.reset();
        info!("session reset");
        Ok(())
    }

    /// Become `Indexed` when the store already holds entries from an earlier run
    pub async fn resume(&mut self) -> Result<SessionStatus> {
        let existing = self.store.len().await?;
        if existing > 0 {
            self.state.mark_indexed();
            info!(chunks = existing, store = self.store.name(), "resumed existing index");
        }
        Ok(self.state.status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::testing::minimal_pdf;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Bag-of-letters embedding, deterministic and cheap
    struct LetterEmbedder;

    #[async_trait]
    impl Embed for LetterEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let mut v = vec![0.0f32; 26];
                    for c in t.to_lowercase().chars().filter(|c| c.is_ascii_lowercase()) {
                        v[(c as u8 - b'a') as usize] += 1.0;
                    }
                    v
                })
                .collect())
        }

        fn dimension(&self) -> usize {
            26
        }

        fn name(&self) -> &str {
            "letters"
        }
    }

    #[derive(Default)]
    struct CountingGenerator {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Generate for CountingGenerator {
        async fn generate(&self, _prompt: &str, _params: &GenerationParams) -> Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("answer {}", n))
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    fn chain(generator: Arc<CountingGenerator>) -> RetrievalChain {
        RetrievalChain::new(
            Arc::new(LetterEmbedder),
            generator,
            Box::new(MemoryStore::new()),
            ChainConfig::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_zero_top_k_rejected() {
        let config = ChainConfig {
            retrieval: RetrievalConfig {
                top_k: 0,
                ..RetrievalConfig::default()
            },
            ..ChainConfig::default()
        };
        let result = RetrievalChain::new(
            Arc::new(LetterEmbedder),
            Arc::new(CountingGenerator::default()),
            Box::new(MemoryStore::new()),
            config,
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_ask_before_processing_is_not_ready() {
        let generator = Arc::new(CountingGenerator::default());
        let mut chain = chain(generator.clone());
        let err = chain.ask("anything?").await.unwrap_err();
        assert!(matches!(err, Error::NotReady));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
        assert!(chain.history().is_empty());
    }

    #[tokio::test]
    async fn test_process_without_uploads_is_noop() {
        let mut chain = chain(Arc::new(CountingGenerator::default()));
        let report = chain.process_documents().await.unwrap();
        assert_eq!(report, ProcessReport::default());
        assert_eq!(chain.status(), SessionStatus::Empty);
    }

    #[tokio::test]
    async fn test_oversized_upload_rejected() {
        let mut chain = RetrievalChain::new(
            Arc::new(LetterEmbedder),
            Arc::new(CountingGenerator::default()),
            Box::new(MemoryStore::new()),
            ChainConfig {
                max_upload_bytes: 4,
                ..ChainConfig::default()
            },
        )
        .unwrap();
        let err = chain
            .upload_documents(vec![Upload::new("big.pdf", vec![0; 5])])
            .unwrap_err();
        assert!(matches!(err, Error::DocumentParse { .. }));
        assert!(chain.pending_uploads().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_pdf_leaves_session_empty() {
        let mut chain = chain(Arc::new(CountingGenerator::default()));
        chain
            .upload_documents(vec![Upload::new("junk.pdf", b"not a pdf".to_vec())])
            .unwrap();
        let err = chain.process_documents().await.unwrap_err();
        assert!(matches!(err, Error::DocumentParse { .. }));
        assert_eq!(chain.status(), SessionStatus::Empty);
        assert_eq!(chain.indexed_chunks().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_ask_records_history_and_sources() {
        let generator = Arc::new(CountingGenerator::default());
        let mut chain = chain(generator.clone());
        chain
            .upload_documents(vec![Upload::new("q3.pdf", minimal_pdf(&["Revenue grew 10% in Q3."]))])
            .unwrap();
        let report = chain.process_documents().await.unwrap();
        assert_eq!(report.chunks, 1);
        assert!(!report.durable);
        assert!(chain.is_ready());

        let answer = chain.ask("How much did revenue grow in Q3?").await.unwrap();
        assert_eq!(answer.text, "answer 0");
        assert_eq!(answer.sources.len(), 1);
        assert!(answer.sources[0].text.contains("Revenue"));

        chain.ask("   ").await.unwrap_err();
        assert_eq!(chain.history().len(), 1);
    }

    #[tokio::test]
    async fn test_condense_calls_generator_twice_on_follow_up() {
        let generator = Arc::new(CountingGenerator::default());
        let mut chain = RetrievalChain::new(
            Arc::new(LetterEmbedder),
            generator.clone(),
            Box::new(MemoryStore::new()),
            ChainConfig {
                retrieval: RetrievalConfig {
                    condense_question: true,
                    ..RetrievalConfig::default()
                },
                ..ChainConfig::default()
            },
        )
        .unwrap();
        chain
            .upload_documents(vec![Upload::new("q3.pdf", minimal_pdf(&["Revenue grew 10% in Q3."]))])
            .unwrap();
        chain.process_documents().await.unwrap();

        chain.ask("What happened to revenue?").await.unwrap();
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
        chain.ask("And in Q4?").await.unwrap();
        assert_eq!(generator.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_reset_returns_to_empty() {
        let mut chain = chain(Arc::new(CountingGenerator::default()));
        chain
            .upload_documents(vec![Upload::new("q3.pdf", minimal_pdf(&["Revenue grew 10% in Q3."]))])
            .unwrap();
        chain.process_documents().await.unwrap();
        chain.ask("Revenue?").await.unwrap();

        chain.reset().await.unwrap();
        assert_eq!(chain.status(), SessionStatus::Empty);
        assert!(chain.history().is_empty());
        assert!(chain.pending_uploads().is_empty());
        assert_eq!(chain.indexed_chunks().await.unwrap(), 0);
        assert!(matches!(chain.ask("Revenue?").await.unwrap_err(), Error::NotReady));
    }
}
