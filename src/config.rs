use crate::{cli::Execute, err, error::RagError};
use clap::Parser;

/// Default directory of the persisted index artifacts.
const DEFAULT_DATA_DIR: &str = "data";
/// Default directory of the corpus to index.
const DEFAULT_UPLOAD_PATH: &str = "uploads";
const DEFAULT_EMBEDDING_MODE: &str = "openai";
const DEFAULT_LLM_MODE: &str = "openai";

#[derive(Debug, Parser)]
#[command(name = "ragkit", version = "0.1", about = "Answer questions from your documents", long_about = None)]
pub struct StartArgs {
    /// RUST_LOG string to use as the env filter.
    #[arg(short, long)]
    log: Option<String>,

    /// Directory holding the index artifacts.
    #[arg(short, long)]
    data_dir: Option<String>,

    /// Directory of the documents to index.
    #[arg(short, long)]
    upload_path: Option<String>,

    /// Embedding provider, `openai` or `local`.
    #[arg(long)]
    embedding_mode: Option<String>,

    /// Model of the OpenAI embedding provider.
    #[cfg(feature = "openai")]
    #[arg(long)]
    embedding_model: Option<String>,

    /// Completion provider, `openai` or `ollama`.
    #[arg(long)]
    llm_mode: Option<String>,

    /// Model of the OpenAI completion provider.
    #[cfg(feature = "openai")]
    #[arg(long)]
    openai_model: Option<String>,

    /// Base URL of an OpenAI compatible API.
    #[cfg(feature = "openai")]
    #[arg(long)]
    openai_endpoint: Option<String>,

    /// Base URL of the Ollama server.
    #[cfg(feature = "ollama")]
    #[arg(long)]
    ollama_url: Option<String>,

    /// Model of the Ollama completion provider.
    #[cfg(feature = "ollama")]
    #[arg(long)]
    ollama_model: Option<String>,

    /// Model of the local fastembed provider.
    #[cfg(feature = "fe-local")]
    #[arg(long)]
    local_model: Option<String>,

    /// Tokenizer vocabulary used for chunking, an encoding or an OpenAI model name.
    #[arg(short, long)]
    tokenizer: Option<String>,

    #[command(subcommand)]
    pub command: Execute,
}

/// Implement a getter method on [StartArgs], using the `$var` environment variable as a fallback
/// and a default if neither the argument nor the environment variable is set.
macro_rules! arg {
    ($id:ident, $var:literal, default $value:expr) => {
        impl StartArgs {
            pub fn $id(&self) -> String {
                match &self.$id {
                    Some(val) => val.to_string(),
                    None => match std::env::var($var) {
                        Ok(val) => val,
                        Err(_) => $value,
                    },
                }
            }
        }
    };
}

#[cfg(feature = "openai")]
impl StartArgs {
    /// Read from the environment only.
    pub fn openai_api_key(&self) -> Result<String, RagError> {
        match std::env::var("OPENAI_API_KEY") {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => err!(InvalidInput, "Missing OPENAI_API_KEY in env"),
        }
    }
}

arg!(log,             "RUST_LOG",              default "info".to_string());
arg!(data_dir,        "DATA_DIR",              default DEFAULT_DATA_DIR.to_string());
arg!(upload_path,     "UPLOAD_PATH",           default DEFAULT_UPLOAD_PATH.to_string());
arg!(embedding_mode,  "EMBEDDING_MODE",        default DEFAULT_EMBEDDING_MODE.to_string());
arg!(llm_mode,        "LLM_MODE",              default DEFAULT_LLM_MODE.to_string());
arg!(tokenizer,       "TOKENIZER",             default chunker::tokens::DEFAULT_VOCABULARY.to_string());

#[cfg(feature = "openai")]
arg!(embedding_model, "EMBEDDING_MODEL",       default crate::app::embedder::openai::TEXT_EMBEDDING_3_SMALL.to_string());
#[cfg(feature = "openai")]
arg!(openai_model,    "OPENAI_MODEL",          default crate::app::completion::openai::DEFAULT_OPENAI_CHAT_MODEL.to_string());
#[cfg(feature = "openai")]
arg!(openai_endpoint, "OPENAI_ENDPOINT",       default crate::app::completion::openai::DEFAULT_OPENAI_ENDPOINT.to_string());

#[cfg(feature = "ollama")]
arg!(ollama_url,      "OLLAMA_URL",            default crate::app::completion::ollama::DEFAULT_OLLAMA_URL.to_string());
#[cfg(feature = "ollama")]
arg!(ollama_model,    "OLLAMA_MODEL",          default crate::app::completion::ollama::DEFAULT_OLLAMA_MODEL.to_string());

#[cfg(feature = "fe-local")]
arg!(local_model,     "LOCAL_EMBEDDING_MODEL", default crate::app::embedder::fastembed::DEFAULT_LOCAL_MODEL.to_string());

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arguments_take_precedence() {
        let args = StartArgs::parse_from([
            "ragkit",
            "--data-dir",
            "__config_data",
            "--llm-mode",
            "ollama",
            "--tokenizer",
            "cl100k_base",
            "status",
        ]);

        assert_eq!("__config_data", args.data_dir());
        assert_eq!("ollama", args.llm_mode());
        assert_eq!("cl100k_base", args.tokenizer());
        assert!(matches!(args.command, Execute::Status));
    }

    #[test]
    fn parses_query_options() {
        let args = StartArgs::parse_from([
            "ragkit",
            "query",
            "What is ownership?",
            "--top-k",
            "3",
            "--system-prompt",
            "Be brief.",
        ]);

        let Execute::Query(query) = args.command else {
            panic!("expected query command");
        };

        assert_eq!("What is ownership?", query.question);
        assert_eq!(3, query.top_k);
        assert_eq!(Some("Be brief.".to_string()), query.system_prompt);
    }

    #[cfg(feature = "ollama")]
    #[test]
    fn ollama_defaults_come_from_provider() {
        use crate::app::completion::ollama::{DEFAULT_OLLAMA_MODEL, DEFAULT_OLLAMA_URL};

        let args = StartArgs::parse_from(["ragkit", "status"]);

        if std::env::var("OLLAMA_URL").is_err() {
            assert_eq!(DEFAULT_OLLAMA_URL, args.ollama_url());
        }
        if std::env::var("OLLAMA_MODEL").is_err() {
            assert_eq!(DEFAULT_OLLAMA_MODEL, args.ollama_model());
        }

        let args = StartArgs::parse_from(["ragkit", "--ollama-model", "qwen2.5:7b", "status"]);
        assert_eq!("qwen2.5:7b", args.ollama_model());
    }

    #[cfg(feature = "openai")]
    #[test]
    fn openai_defaults_come_from_provider() {
        use crate::app::{
            completion::openai::{DEFAULT_OPENAI_CHAT_MODEL, DEFAULT_OPENAI_ENDPOINT},
            embedder::openai::TEXT_EMBEDDING_3_SMALL,
        };

        let args = StartArgs::parse_from(["ragkit", "status"]);

        if std::env::var("OPENAI_MODEL").is_err() {
            assert_eq!(DEFAULT_OPENAI_CHAT_MODEL, args.openai_model());
        }
        if std::env::var("OPENAI_ENDPOINT").is_err() {
            assert_eq!(DEFAULT_OPENAI_ENDPOINT, args.openai_endpoint());
        }
        if std::env::var("EMBEDDING_MODEL").is_err() {
            assert_eq!(TEXT_EMBEDDING_3_SMALL, args.embedding_model());
        }
    }
}
