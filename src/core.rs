//! The core module defines the business logic of ragkit.
//! It provides the traits and models upstream adapters need to implement.

pub mod completion;
pub mod document;
pub mod embedder;
pub mod service;
pub mod vector;

pub use chunker::{Chunk, ParagraphWindow, TokenCounter, Tokenizer};
