use crate::error::EmbeddingError;
use fastembed::{EmbeddingModel, ModelInfo};
use ort::execution_providers::CPUExecutionProvider;
#[cfg(feature = "cuda")]
use ort::execution_providers::CUDAExecutionProvider;

/// Default local model, multilingual with 384 dimensions.
pub const DEFAULT_LOCAL_MODEL: &str = "Qdrant/paraphrase-multilingual-MiniLM-L12-v2-onnx-Q";

/// A single fastembed model loaded in process.
pub struct LocalFastEmbedder {
    info: ModelInfo<EmbeddingModel>,
    embedding: fastembed::TextEmbedding,
}

impl LocalFastEmbedder {
    /// Initialise the model with the given `model` code, downloading it on first use.
    pub fn new(model: &str) -> Result<Self, EmbeddingError> {
        tracing::info!("Initializing local Fastembed");
        #[cfg(feature = "cuda")]
        {
            use ort::execution_providers::ExecutionProvider;
            tracing::info!(
                "Using CUDA: {:?}",
                ExecutionProvider::is_available(&CUDAExecutionProvider::default())
            );
        }

        let Some(info) = list_models().into_iter().find(|m| m.model_code == model) else {
            return Err(EmbeddingError::InvalidModel(format!(
                "model '{model}' not supported by fastembed"
            )));
        };

        tracing::info!(
            "Setting up text embedding model: {} ({})",
            info.model_code,
            info.dim
        );

        let embedding = fastembed::TextEmbedding::try_new(
            fastembed::InitOptions::new(info.model.clone())
                .with_execution_providers(vec![
                    #[cfg(feature = "cuda")]
                    CUDAExecutionProvider::default().into(),
                    CPUExecutionProvider::default().into(),
                ])
                .with_show_download_progress(true),
        )?;

        Ok(Self { info, embedding })
    }

    pub fn model(&self) -> &str {
        &self.info.model_code
    }

    pub fn dimension(&self) -> usize {
        self.info.dim
    }

    pub fn list_models(&self) -> Vec<ModelInfo<EmbeddingModel>> {
        list_models()
    }

    pub fn embed(&self, content: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if content.is_empty() {
            return Err(EmbeddingError::InvalidInput(format!(
                "cannot be empty (len = {})",
                content.len()
            )));
        }

        let embeddings = self.embedding.embed(content.to_vec(), None)?;

        tracing::debug!(
            "Embedded {} chunk(s) with '{}'",
            embeddings.len(),
            self.info.model_code
        );

        Ok(embeddings)
    }
}

fn list_models() -> Vec<ModelInfo<EmbeddingModel>> {
    const MODEL_LIST: &[EmbeddingModel] = &[
        EmbeddingModel::ParaphraseMLMiniLML12V2Q,
        EmbeddingModel::ParaphraseMLMiniLML12V2,
        EmbeddingModel::BGESmallENV15,
        EmbeddingModel::BGEBaseENV15,
        EmbeddingModel::AllMiniLML6V2,
        EmbeddingModel::AllMiniLML12V2,
        EmbeddingModel::MultilingualE5Small,
    ];

    fastembed::TextEmbedding::list_supported_models()
        .into_iter()
        .filter(|model| MODEL_LIST.contains(&model.model))
        .collect()
}

impl std::fmt::Debug for LocalFastEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalFastEmbedder")
            .field("model", &self.info.model_code)
            .field("dimension", &self.info.dim)
            .finish()
    }
}
