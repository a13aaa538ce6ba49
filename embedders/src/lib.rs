//! Text embedding clients.
//!
//! Both implementations produce `f32` vectors whose dimension is fixed by the model.

pub mod error;

/// Embedder implementations backed by fastembed.
#[cfg(feature = "fe-local")]
pub mod fastembed;

/// Client for the OpenAI embeddings API.
#[cfg(feature = "openai")]
pub mod openai;
