//! Module containing concrete implementations from the [core](crate::core) module.

/// Answer generation implementations.
pub mod completion;

/// Text embedder implementations.
pub mod embedder;

/// Application state configuration.
pub mod state;

#[cfg(test)]
pub mod test;
