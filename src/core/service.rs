//! Services tying the core components together.

pub mod rag;
