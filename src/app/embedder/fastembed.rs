use crate::{core::embedder::Embedder, error::RagError, map_err};

pub use ragkit_embedders::fastembed::local::{LocalFastEmbedder, DEFAULT_LOCAL_MODEL};

#[async_trait::async_trait]
impl Embedder for LocalFastEmbedder {
    fn id(&self) -> &'static str {
        "fembed"
    }

    fn model(&self) -> &str {
        LocalFastEmbedder::model(self)
    }

    fn dimension(&self) -> usize {
        LocalFastEmbedder::dimension(self)
    }

    async fn embed_batch(&self, content: &[&str]) -> Result<Vec<Vec<f32>>, RagError> {
        Ok(map_err!(LocalFastEmbedder::embed(self, content)))
    }
}
