use crate::{
    config::StartArgs,
    core::{
        completion::Completer,
        embedder::Embedder,
        service::rag::{IndexPaths, RagService},
        vector::VectorIndex,
        TokenCounter,
    },
    err,
    error::RagError,
    map_err,
};
use std::{path::PathBuf, sync::Arc};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Clone)]
pub struct AppState {
    /// The retrieval pipeline.
    pub service: RagService,

    /// Directory of the documents to index.
    pub upload_path: PathBuf,
}

impl AppState {
    /// Load the application state using the provided configuration.
    pub fn new(args: &StartArgs) -> Result<Self, RagError> {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from(args.log()))
            .init();

        let embedder = Self::init_embedder(args)?;
        let completer = Self::init_completer(args)?;
        let tokenizer = Arc::new(map_err!(TokenCounter::new(&args.tokenizer())));

        info!(
            "Using embedder '{}' ({}, {} dimensions), completer '{}' ({}), tokenizer '{}'",
            embedder.id(),
            embedder.model(),
            embedder.dimension(),
            completer.id(),
            completer.model(),
            tokenizer.vocabulary(),
        );

        let service = RagService::new(
            VectorIndex::new(embedder),
            completer,
            tokenizer,
            IndexPaths::in_dir(args.data_dir()),
        );

        Ok(Self {
            service,
            upload_path: PathBuf::from(args.upload_path()),
        })
    }

    fn init_embedder(args: &StartArgs) -> Result<Arc<dyn Embedder>, RagError> {
        #[cfg(not(any(feature = "fe-local", feature = "openai")))]
        compile_error!("one of `fe-local` or `openai` features must be enabled");

        match args.embedding_mode().as_str() {
            #[cfg(feature = "openai")]
            "openai" => {
                use crate::app::embedder::openai::{OpenAiEmbedder, OpenAiEmbeddings};

                let client =
                    OpenAiEmbeddings::with_endpoint(&args.openai_api_key()?, &args.openai_endpoint());
                Ok(Arc::new(OpenAiEmbedder::new(client, &args.embedding_model())?))
            }

            #[cfg(feature = "fe-local")]
            "local" => {
                use crate::app::embedder::fastembed::LocalFastEmbedder;

                let embedder = map_err!(LocalFastEmbedder::new(&args.local_model()));
                Ok(Arc::new(embedder))
            }

            mode => err!(
                InvalidProvider,
                "embedding mode '{mode}' is not available in this build"
            ),
        }
    }

    fn init_completer(args: &StartArgs) -> Result<Arc<dyn Completer>, RagError> {
        #[cfg(not(any(feature = "ollama", feature = "openai")))]
        compile_error!("one of `ollama` or `openai` features must be enabled");

        match args.llm_mode().as_str() {
            #[cfg(feature = "openai")]
            "openai" => {
                use crate::app::completion::openai::OpenAiCompleter;

                Ok(Arc::new(OpenAiCompleter::new(
                    &args.openai_api_key()?,
                    &args.openai_endpoint(),
                    &args.openai_model(),
                )?))
            }

            #[cfg(feature = "ollama")]
            "ollama" => {
                use crate::app::completion::ollama::OllamaCompleter;

                Ok(Arc::new(OllamaCompleter::new(
                    &args.ollama_url(),
                    &args.ollama_model(),
                )?))
            }

            mode => err!(
                InvalidProvider,
                "LLM mode '{mode}' is not available in this build"
            ),
        }
    }
}
