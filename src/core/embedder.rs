use crate::{err, error::RagError};

/// Operations related to embeddings and their models.
///
/// An instance is bound to a single model, so every vector it
/// produces has the same [dimension][Embedder::dimension].
#[async_trait::async_trait]
pub trait Embedder: Send + Sync {
    fn id(&self) -> &'static str;

    /// The model identifier, stored alongside the index it builds.
    fn model(&self) -> &str;

    fn dimension(&self) -> usize;

    /// Get the vectors for the elements in `content`, in the same order.
    /// The content passed in can be a user's query, or a chunked document.
    async fn embed_batch(&self, content: &[&str]) -> Result<Vec<Vec<f32>>, RagError>;

    async fn embed(&self, content: &str) -> Result<Vec<f32>, RagError> {
        let embeddings = self.embed_batch(&[content]).await?;
        let amount = embeddings.len();
        match <[Vec<f32>; 1]>::try_from(embeddings) {
            Ok([embedding]) => Ok(embedding),
            Err(_) => err!(
                InvalidEmbeddings,
                "expected 1 vector from '{}', got {amount}",
                self.id()
            ),
        }
    }
}
