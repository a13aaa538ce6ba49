use crate::core::{
    completion::{Completer, CompletionRequest, Message, DEFAULT_SYSTEM_PROMPT},
    document::{DocumentProcessor, ExtractedDocument},
    vector::{IndexStats, SearchResult, VectorIndex},
    Chunk, ParagraphWindow, Tokenizer,
};
use crate::{err, error::RagError, map_err};
use dto::{DeleteReport, IndexCorpusPayload, IndexReport, QueryPayload, QueryResponse};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};
use tokio::sync::RwLock;
use tracing::{debug, info};
use validify::{Validate, Validify};

/// File name of the vector artifact.
pub const INDEX_FILE: &str = "vectors.bin";

/// File name of the metadata artifact.
pub const METADATA_FILE: &str = "index_metadata.json";

/// Only the most recent history messages are sent to the completion provider.
pub const MAX_HISTORY_MESSAGES: usize = 20;

/// Locations of the persisted index artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPaths {
    pub index: PathBuf,
    pub metadata: PathBuf,
}

impl IndexPaths {
    /// Artifacts with their default names in `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            index: dir.join(INDEX_FILE),
            metadata: dir.join(METADATA_FILE),
        }
    }

    async fn any_exists(&self) -> Result<bool, RagError> {
        Ok(map_err!(tokio::fs::try_exists(&self.index).await)
            || map_err!(tokio::fs::try_exists(&self.metadata).await))
    }
}

/// High level operations of the retrieval pipeline.
///
/// The service owns the [VectorIndex] behind a single lock. Builds, loads and deletions
/// take it exclusively, searches and stats share it.
#[derive(Clone)]
pub struct RagService {
    index: Arc<RwLock<VectorIndex>>,
    completer: Arc<dyn Completer>,
    tokenizer: Arc<dyn Tokenizer + Send + Sync>,
    processor: DocumentProcessor,
    paths: IndexPaths,
}

impl RagService {
    pub fn new(
        index: VectorIndex,
        completer: Arc<dyn Completer>,
        tokenizer: Arc<dyn Tokenizer + Send + Sync>,
        paths: IndexPaths,
    ) -> Self {
        Self {
            index: Arc::new(RwLock::new(index)),
            completer,
            tokenizer,
            processor: DocumentProcessor,
            paths,
        }
    }

    pub fn paths(&self) -> &IndexPaths {
        &self.paths
    }

    /// Chunk, embed and index `documents`, then persist the index.
    /// Replaces any existing index.
    pub async fn index_corpus(&self, payload: IndexCorpusPayload) -> Result<IndexReport, RagError> {
        map_err!(payload.validate());

        let IndexCorpusPayload {
            documents,
            chunk_size,
            chunk_overlap,
        } = payload;

        if documents.is_empty() {
            return err!(InvalidInput, "no documents to index");
        }

        let start = Instant::now();

        let chunks = self.chunk(&documents, chunk_size, chunk_overlap)?;
        if chunks.is_empty() {
            return err!(InvalidInput, "documents do not contain any text");
        }

        info!(
            "Indexing {} document(s) as {} chunk(s)",
            documents.len(),
            chunks.len()
        );

        // The shared index is only replaced once the new one is persisted
        let mut fresh = self.index.read().await.empty_copy();
        let built = fresh.build(chunks).await?;

        let mut index = self.index.write().await;
        fresh.save(&self.paths.index, &self.paths.metadata).await?;
        *index = fresh;

        info!(
            "Indexed {} document(s), took {}ms",
            documents.len(),
            Instant::now().duration_since(start).as_millis()
        );

        Ok(IndexReport {
            total_chunks: built.total_chunks,
            total_vectors: built.total_vectors,
            dimension: built.dimension,
            model: built.model,
            documents_processed: documents.len(),
            documents_failed: 0,
        })
    }

    /// Extract every document in `dir` and index the ones that succeeded.
    pub async fn index_directory(
        &self,
        dir: impl AsRef<Path>,
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> Result<IndexReport, RagError> {
        let dir = dir.as_ref();
        let processed = self.processor.process_directory(dir).await?;

        if processed.documents.is_empty() {
            return err!(
                InvalidInput,
                "no valid documents in {} ({} failed)",
                dir.display(),
                processed.failed.len()
            );
        }

        let mut report = self
            .index_corpus(IndexCorpusPayload {
                documents: processed.documents,
                chunk_size,
                chunk_overlap,
            })
            .await?;

        report.documents_failed = processed.failed.len();

        Ok(report)
    }

    /// Chunk documents without indexing them.
    pub fn chunk(
        &self,
        documents: &[ExtractedDocument],
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> Result<Vec<Chunk>, RagError> {
        let window = map_err!(ParagraphWindow::new(chunk_size, chunk_overlap));
        let documents = documents
            .iter()
            .map(|d| (d.source.as_str(), d.text.as_str()));
        Ok(map_err!(window.chunk_documents(&*self.tokenizer, documents)))
    }

    /// Answer `payload.question` from the indexed documents.
    /// Loads the persisted index if none is in memory.
    pub async fn query(&self, mut payload: QueryPayload) -> Result<QueryResponse, RagError> {
        map_err!(payload.validify());

        if !self.ensure_loaded().await? {
            return err!(IndexNotBuilt, "no index available, index documents first");
        }

        let results = {
            let index = self.index.read().await;
            index.search(&payload.question, payload.top_k).await?
        };

        if results.is_empty() {
            return err!(NoResults, "nothing found for '{}'", payload.question);
        }

        let context = format_context(&results);
        let history = recent_history(&payload.history);

        let system_prompt = match payload.system_prompt.as_deref().map(str::trim) {
            Some(prompt) if !prompt.is_empty() => prompt,
            _ => DEFAULT_SYSTEM_PROMPT,
        };

        debug!(
            "Answering with {} result(s) and {} history message(s)",
            results.len(),
            history.len()
        );

        let completion = self
            .completer
            .complete(CompletionRequest {
                system_prompt,
                context: &context,
                history,
                question: &payload.question,
                temperature: payload.temperature,
                max_tokens: payload.max_tokens,
            })
            .await?;

        info!(
            "Answered query with '{}', used tokens {}-{} (prompt-total)",
            self.completer.model(),
            completion.usage.prompt_tokens,
            completion.usage.total_tokens
        );

        Ok(QueryResponse {
            answer: completion.answer,
            sources: results,
            usage: completion.usage,
            model: self.completer.model().to_string(),
        })
    }

    /// Stats of the current index, loading the persisted one if needed.
    pub async fn index_status(&self) -> Result<IndexStats, RagError> {
        self.ensure_loaded().await?;
        Ok(self.index.read().await.stats())
    }

    /// Drop the in-memory index and delete its artifacts.
    pub async fn delete_index(&self) -> Result<DeleteReport, RagError> {
        let mut index = self.index.write().await;
        index.clear();

        let mut deleted = vec![];

        for path in [&self.paths.index, &self.paths.metadata] {
            match tokio::fs::remove_file(path).await {
                Ok(()) => {
                    info!("Deleted {}", path.display());
                    deleted.push(path.clone());
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(RagError::new(file!(), line!(), column!(), e.into())),
            }
        }

        if deleted.is_empty() {
            return err!(
                DoesNotExist,
                "no index artifacts at {}",
                self.paths.index.display()
            );
        }

        Ok(DeleteReport { deleted })
    }

    /// Load the persisted index if there is none in memory.
    /// Returns `false` if there is nothing to load.
    async fn ensure_loaded(&self) -> Result<bool, RagError> {
        if self.index.read().await.is_indexed() {
            return Ok(true);
        }

        let mut index = self.index.write().await;

        // Could have been loaded while waiting for the lock
        if index.is_indexed() {
            return Ok(true);
        }

        if !self.paths.any_exists().await? {
            return Ok(false);
        }

        index.load(&self.paths.index, &self.paths.metadata).await?;

        Ok(true)
    }
}

/// Results in rank order, each prefixed with its source.
fn format_context(results: &[SearchResult]) -> String {
    results
        .iter()
        .map(|r| format!("[Document: {}]\n{}", r.source, r.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn recent_history(history: &[Message]) -> &[Message] {
    &history[history.len().saturating_sub(MAX_HISTORY_MESSAGES)..]
}

/// Retrieval pipeline DTOs.
pub mod dto {
    use crate::core::{
        completion::{Message, Usage},
        document::ExtractedDocument,
        vector::SearchResult,
    };
    use serde::{Deserialize, Serialize};
    use std::path::PathBuf;
    use validify::{schema_err, schema_validation, Validate, ValidationErrors, Validify};

    pub const DEFAULT_TOP_K: usize = 5;
    pub const DEFAULT_TEMPERATURE: f32 = 0.7;
    pub const DEFAULT_MAX_TOKENS: u32 = 500;

    #[derive(Debug, Clone, Validate)]
    #[validate(Self::validate_schema)]
    pub struct IndexCorpusPayload {
        pub documents: Vec<ExtractedDocument>,

        /// Maximum amount of tokens per chunk.
        #[validate(range(min = 1.))]
        pub chunk_size: usize,

        /// Tokens carried over between adjacent chunks.
        pub chunk_overlap: usize,
    }

    impl IndexCorpusPayload {
        #[schema_validation]
        fn validate_schema(&self) -> Result<(), ValidationErrors> {
            if self.chunk_overlap >= self.chunk_size {
                schema_err!(
                    "chunk_overlap>=chunk_size",
                    "chunk overlap must be less than chunk size"
                );
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct IndexReport {
        pub total_chunks: usize,
        pub total_vectors: usize,
        pub dimension: usize,
        pub model: String,
        pub documents_processed: usize,
        pub documents_failed: usize,
    }

    /// Params for answering a question.
    #[derive(Debug, Clone, Deserialize, Validify)]
    pub struct QueryPayload {
        #[modify(trim)]
        #[validate(length(min = 1, message = "Question cannot be empty."))]
        pub question: String,

        /// Amount of chunks to retrieve.
        #[validate(range(min = 1.))]
        pub top_k: usize,

        #[validate(range(min = 0., max = 2.))]
        pub temperature: f32,

        #[validate(range(min = 1.))]
        pub max_tokens: u32,

        /// Prior conversation, oldest first.
        pub history: Vec<Message>,

        /// Replaces the default system prompt if set and not blank.
        pub system_prompt: Option<String>,
    }

    impl QueryPayload {
        pub fn new(question: impl Into<String>) -> Self {
            Self {
                question: question.into(),
                top_k: DEFAULT_TOP_K,
                temperature: DEFAULT_TEMPERATURE,
                max_tokens: DEFAULT_MAX_TOKENS,
                history: vec![],
                system_prompt: None,
            }
        }
    }

    #[derive(Debug, Clone, Serialize)]
    pub struct QueryResponse {
        pub answer: String,

        /// The chunks the answer is grounded on, in rank order.
        pub sources: Vec<SearchResult>,

        pub usage: Usage,

        /// The model that generated the answer.
        pub model: String,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize)]
    pub struct DeleteReport {
        pub deleted: Vec<PathBuf>,
    }
}
