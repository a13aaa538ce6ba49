//! Vector storage and exact nearest neighbour retrieval.

pub mod flat;
mod index;

pub use index::{
    sha256, BuildResult, IndexStats, SearchResult, VectorIndex, DEFAULT_BATCH_SIZE,
};
