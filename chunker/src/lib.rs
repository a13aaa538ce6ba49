//! Token bounded text chunking.
//!
//! The [ParagraphWindow] accumulates paragraphs into chunks that never exceed a token
//! budget as measured by a [Tokenizer], carrying a token overlap between adjacent chunks.

mod paragraph;
mod sentence;
pub mod tokens;

pub use paragraph::{Chunk, ParagraphWindow, Segment};
pub use tokens::{TokenCounter, TokenId, Tokenizer};

#[derive(Debug, thiserror::Error)]
pub enum ChunkerError {
    #[error("{0}")]
    Config(String),

    #[error("tokenizer: {0}")]
    Tokenizer(String),
}
