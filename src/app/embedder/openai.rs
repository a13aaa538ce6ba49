use crate::{core::embedder::Embedder, err, error::RagError, map_err};

pub use ragkit_embedders::openai::{OpenAiEmbeddings, TEXT_EMBEDDING_3_SMALL};

/// [OpenAiEmbeddings] bound to one of its models.
#[derive(Debug)]
pub struct OpenAiEmbedder {
    client: OpenAiEmbeddings,
    model: String,
    dimension: usize,
}

impl OpenAiEmbedder {
    /// Errors if `model` is not an OpenAI embedding model.
    pub fn new(client: OpenAiEmbeddings, model: &str) -> Result<Self, RagError> {
        let Some(dimension) = client.dimension(model) else {
            let models = client
                .list_embedding_models()
                .into_iter()
                .map(|(name, _)| name)
                .collect::<Vec<_>>()
                .join(", ");
            return err!(
                InvalidEmbeddingModel,
                "'{model}' is not an OpenAI embedding model, expected one of {models}"
            );
        };

        Ok(Self {
            client,
            model: model.to_string(),
            dimension,
        })
    }
}

#[async_trait::async_trait]
impl Embedder for OpenAiEmbedder {
    fn id(&self) -> &'static str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_batch(&self, content: &[&str]) -> Result<Vec<Vec<f32>>, RagError> {
        Ok(map_err!(self.client.embed(content, &self.model).await))
    }
}
