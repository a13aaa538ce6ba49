use super::ChunkerError;
use tiktoken_rs::CoreBPE;
use tracing::debug;

/// The vocabulary used when none is configured. Resolves to `cl100k_base`.
pub const DEFAULT_VOCABULARY: &str = "gpt-3.5-turbo";

pub type TokenId = u32;

/// Exact tokenization relative to a single vocabulary.
///
/// Chunk budgets are enforced with [Tokenizer::count], so implementations
/// must not approximate.
pub trait Tokenizer {
    fn encode(&self, text: &str) -> Vec<TokenId>;

    /// Decode `tokens` back to text. Errors if the tokens do not form valid UTF-8,
    /// which can happen when a slice splits a multi-byte character.
    fn decode(&self, tokens: &[TokenId]) -> Result<String, ChunkerError>;

    fn count(&self, text: &str) -> usize {
        self.encode(text).len()
    }
}

/// BPE token counter backed by the tiktoken vocabularies.
pub struct TokenCounter {
    vocabulary: String,
    bpe: CoreBPE,
}

impl TokenCounter {
    /// Load the vocabulary for `vocabulary`, which is either an encoding name
    /// (`cl100k_base`, `o200k_base`, `p50k_base`, `p50k_edit`, `r50k_base`)
    /// or an OpenAI model name such as `gpt-3.5-turbo`.
    pub fn new(vocabulary: &str) -> Result<Self, ChunkerError> {
        let bpe = match vocabulary {
            "cl100k_base" => tiktoken_rs::cl100k_base(),
            "o200k_base" => tiktoken_rs::o200k_base(),
            "p50k_base" => tiktoken_rs::p50k_base(),
            "p50k_edit" => tiktoken_rs::p50k_edit(),
            "r50k_base" => tiktoken_rs::r50k_base(),
            model => tiktoken_rs::get_bpe_from_model(model),
        }
        .map_err(|e| ChunkerError::Config(format!("unsupported vocabulary '{vocabulary}': {e}")))?;

        debug!("Loaded tokenizer vocabulary '{vocabulary}'");

        Ok(Self {
            vocabulary: vocabulary.to_string(),
            bpe,
        })
    }

    pub fn vocabulary(&self) -> &str {
        &self.vocabulary
    }
}

impl Tokenizer for TokenCounter {
    fn encode(&self, text: &str) -> Vec<TokenId> {
        self.bpe.encode_ordinary(text)
    }

    fn decode(&self, tokens: &[TokenId]) -> Result<String, ChunkerError> {
        self.bpe
            .decode(tokens.to_vec())
            .map_err(|e| ChunkerError::Tokenizer(e.to_string()))
    }
}

impl std::fmt::Debug for TokenCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCounter")
            .field("vocabulary", &self.vocabulary)
            .finish()
    }
}
