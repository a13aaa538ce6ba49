/// Embedder implementation for fastembed when running it locally.
pub mod local;
