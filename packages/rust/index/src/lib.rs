//! Embedding and similarity-index capabilities for Newsreel.
//!
//! Deduplication consumes two contracts defined here: [`Embedder`] (text →
//! fixed-length vector) and [`VectorIndex`] (store vectors, answer threshold
//! nearest-neighbor queries). [`MemoryIndex`] is the in-process cosine
//! implementation; the storage crate wraps it with write-through persistence
//! so index content survives across runs.

pub mod memory;
pub mod traits;

pub use memory::{IndexError, MemoryIndex};
pub use traits::{Embedder, IndexMatch, VectorIndex};
