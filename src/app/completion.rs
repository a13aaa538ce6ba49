#[cfg(feature = "ollama")]
pub mod ollama;

#[cfg(feature = "openai")]
pub mod openai;

/// Timeout for a single completion request.
#[cfg(any(feature = "openai", feature = "ollama"))]
const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(120);
