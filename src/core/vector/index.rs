use super::flat::FlatL2;
use crate::{
    core::{embedder::Embedder, Chunk},
    err,
    error::RagError,
    map_err,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::{collections::BTreeSet, path::Path, sync::Arc, time::Instant};
use tracing::{debug, info};

/// Amount of chunks sent to the embedder in a single request.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Chunk vectors and their chunks, searchable by exact L2 distance.
///
/// The index is bound to a single [Embedder]; both the chunks and the queries
/// are embedded with it. A build or load prepares the new state in full and only
/// then replaces the current one, so a failed operation leaves the index as it was.
pub struct VectorIndex {
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
    state: Option<IndexState>,
}

#[derive(Debug)]
struct IndexState {
    vectors: FlatL2,

    /// Parallel to `vectors`.
    chunks: Vec<Chunk>,

    model: String,

    created_at: DateTime<Utc>,
}

/// Result of [VectorIndex::build].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildResult {
    pub total_chunks: usize,
    pub total_vectors: usize,
    pub dimension: usize,
    pub model: String,
}

/// A chunk retrieved by [VectorIndex::search].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub text: String,
    pub source: String,
    pub chunk_id: usize,

    /// Squared L2 distance to the query, lower is more similar.
    pub score: f32,

    /// 1 based position in the result list.
    pub rank: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub indexed: bool,
    pub total_vectors: usize,
    pub dimension: usize,
    pub model: String,
    pub total_chunks: usize,

    /// Distinct chunk sources, sorted.
    pub sources: Vec<String>,
}

/// Contents of the metadata artifact.
#[derive(Debug, Serialize, Deserialize)]
struct IndexMetadata {
    chunks: Vec<Chunk>,
    metadata: Vec<ChunkMetadata>,
    dimension: usize,
    model: String,
    created_at: DateTime<Utc>,

    /// Hex encoded SHA-256 of the vector artifact.
    vectors_sha256: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChunkMetadata {
    chunk_id: usize,
    source: String,
    token_count: usize,
}

impl From<&Chunk> for ChunkMetadata {
    fn from(chunk: &Chunk) -> Self {
        Self {
            chunk_id: chunk.chunk_id,
            source: chunk.source.clone(),
            token_count: chunk.token_count,
        }
    }
}

impl VectorIndex {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            batch_size: DEFAULT_BATCH_SIZE,
            state: None,
        }
    }

    /// Set the amount of chunks embedded per request. Values below 1 are treated as 1.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// A new, empty index bound to the same embedder and batch size.
    pub fn empty_copy(&self) -> Self {
        Self {
            embedder: self.embedder.clone(),
            batch_size: self.batch_size,
            state: None,
        }
    }

    pub fn dimension(&self) -> usize {
        self.embedder.dimension()
    }

    pub fn is_indexed(&self) -> bool {
        self.state.is_some()
    }

    /// Drop the in-memory index. Persisted artifacts are not touched.
    pub fn clear(&mut self) {
        if self.state.take().is_some() {
            debug!("Cleared in-memory index");
        }
    }

    /// Embed `chunks` and replace the current index with them.
    pub async fn build(&mut self, chunks: Vec<Chunk>) -> Result<BuildResult, RagError> {
        if chunks.is_empty() {
            return err!(InvalidInput, "cannot build an index without chunks");
        }

        let start = Instant::now();
        let dimension = self.embedder.dimension();
        let model = self.embedder.model().to_string();
        let mut vectors = FlatL2::new(dimension)?;

        info!(
            "Embedding {} chunk(s) with '{model}' in batches of {}",
            chunks.len(),
            self.batch_size
        );

        for (i, batch) in chunks.chunks(self.batch_size).enumerate() {
            let content: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
            let embeddings = self.embedder.embed_batch(&content).await?;

            if embeddings.len() != batch.len() {
                return err!(
                    InvalidEmbeddings,
                    "batch {i}: sent {} chunk(s) to '{}', received {} vector(s)",
                    batch.len(),
                    self.embedder.id(),
                    embeddings.len()
                );
            }

            for embedding in embeddings.iter() {
                vectors.add(embedding)?;
            }

            debug!("Embedded batch {i} ({} chunk(s))", batch.len());
        }

        let result = BuildResult {
            total_chunks: chunks.len(),
            total_vectors: vectors.len(),
            dimension,
            model: model.clone(),
        };

        self.state = Some(IndexState {
            vectors,
            chunks,
            model,
            created_at: Utc::now(),
        });

        info!(
            "Built index with {} vector(s), took {}ms",
            result.total_vectors,
            Instant::now().duration_since(start).as_millis()
        );

        Ok(result)
    }

    /// Return up to `top_k` chunks closest to `query`, nearest first.
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>, RagError> {
        if top_k < 1 {
            return err!(InvalidInput, "top_k must be at least 1");
        }

        if query.trim().is_empty() {
            return err!(InvalidInput, "query cannot be empty");
        }

        let Some(state) = &self.state else {
            return err!(IndexNotBuilt, "build or load an index before searching");
        };

        if state.vectors.is_empty() {
            return Ok(vec![]);
        }

        let embedding = self.embedder.embed(query).await?;

        let results = state
            .vectors
            .search(&embedding, top_k)?
            .into_iter()
            .enumerate()
            .map(|(i, (position, score))| {
                let chunk = &state.chunks[position];
                SearchResult {
                    text: chunk.text.clone(),
                    source: chunk.source.clone(),
                    chunk_id: chunk.chunk_id,
                    score,
                    rank: i + 1,
                }
            })
            .collect::<Vec<_>>();

        debug!("Found {} result(s) for query", results.len());

        Ok(results)
    }

    /// Write the vector artifact to `index_path` and the metadata artifact to
    /// `metadata_path`, creating missing directories. Each file is replaced whole.
    pub async fn save(
        &self,
        index_path: impl AsRef<Path>,
        metadata_path: impl AsRef<Path>,
    ) -> Result<(), RagError> {
        let (index_path, metadata_path) = (index_path.as_ref(), metadata_path.as_ref());

        let Some(state) = &self.state else {
            return err!(IndexNotBuilt, "nothing to save");
        };

        let vectors = state.vectors.to_bytes();

        let metadata = IndexMetadata {
            metadata: state.chunks.iter().map(ChunkMetadata::from).collect(),
            chunks: state.chunks.clone(),
            dimension: state.vectors.dimension(),
            model: state.model.clone(),
            created_at: state.created_at,
            vectors_sha256: sha256(&vectors),
        };
        let metadata = map_err!(serde_json::to_vec_pretty(&metadata));

        write_replace(index_path, &vectors).await?;
        write_replace(metadata_path, &metadata).await?;

        info!(
            "Saved index to {} and {}",
            index_path.display(),
            metadata_path.display()
        );

        Ok(())
    }

    /// Replace the current index with the one stored in the artifacts.
    ///
    /// Fails if either artifact is missing, if they are inconsistent with each other,
    /// or if they were built with a different model or dimension than the embedder's.
    pub async fn load(
        &mut self,
        index_path: impl AsRef<Path>,
        metadata_path: impl AsRef<Path>,
    ) -> Result<(), RagError> {
        let (index_path, metadata_path) = (index_path.as_ref(), metadata_path.as_ref());

        let vectors = read_artifact(index_path).await?;
        let metadata = read_artifact(metadata_path).await?;

        let metadata: IndexMetadata = map_err!(serde_json::from_slice(&metadata));

        if sha256(&vectors) != metadata.vectors_sha256 {
            return err!(
                CorruptArtifact,
                "checksum of {} does not match {}",
                index_path.display(),
                metadata_path.display()
            );
        }

        let vectors = FlatL2::from_bytes(&vectors)?;

        if vectors.dimension() != metadata.dimension {
            return err!(
                CorruptArtifact,
                "vector dimension {} does not match recorded dimension {}",
                vectors.dimension(),
                metadata.dimension
            );
        }

        if vectors.len() != metadata.chunks.len() || metadata.metadata.len() != metadata.chunks.len()
        {
            return err!(
                CorruptArtifact,
                "{} vector(s), {} chunk(s) and {} metadata entries",
                vectors.len(),
                metadata.chunks.len(),
                metadata.metadata.len()
            );
        }

        let (model, dimension) = (self.embedder.model(), self.embedder.dimension());

        if metadata.model != model || metadata.dimension != dimension {
            return err!(
                ModelMismatch,
                "index built with '{}' ({}), active embedder is '{model}' ({dimension})",
                metadata.model,
                metadata.dimension
            );
        }

        info!(
            "Loaded index with {} vector(s) from {}",
            vectors.len(),
            index_path.display()
        );

        self.state = Some(IndexState {
            vectors,
            chunks: metadata.chunks,
            model: metadata.model,
            created_at: metadata.created_at,
        });

        Ok(())
    }

    pub fn stats(&self) -> IndexStats {
        let Some(state) = &self.state else {
            return IndexStats {
                indexed: false,
                total_vectors: 0,
                dimension: self.embedder.dimension(),
                model: self.embedder.model().to_string(),
                total_chunks: 0,
                sources: vec![],
            };
        };

        let sources: BTreeSet<&str> = state.chunks.iter().map(|c| c.source.as_str()).collect();

        IndexStats {
            indexed: true,
            total_vectors: state.vectors.len(),
            dimension: state.vectors.dimension(),
            model: state.model.clone(),
            total_chunks: state.chunks.len(),
            sources: sources.into_iter().map(String::from).collect(),
        }
    }
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("embedder", &self.embedder.id())
            .field("batch_size", &self.batch_size)
            .field("state", &self.state)
            .finish()
    }
}

pub fn sha256(input: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input);
    hex::encode(hasher.finalize())
}

async fn read_artifact(path: &Path) -> Result<Vec<u8>, RagError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            err!(DoesNotExist, "index artifact {}", path.display())
        }
        Err(e) => Err(RagError::new(file!(), line!(), column!(), e.into())),
    }
}

/// Write to a sibling temporary file and rename it over `path`.
async fn write_replace(path: &Path, contents: &[u8]) -> Result<(), RagError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        map_err!(tokio::fs::create_dir_all(parent).await);
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");

    map_err!(tokio::fs::write(&tmp, contents).await);
    map_err!(tokio::fs::rename(&tmp, path).await);

    debug!("Wrote {} bytes to {}", contents.len(), path.display());

    Ok(())
}
