//! Tantivy-backed lexical index over fragments.
//!
//! Writes go through `LexicalBatch`, a staged writer that keeps everything
//! invisible to readers until `commit`. Search returns raw BM25 scores
//! keyed by fragment id; passage text is resolved from the store at query
//! time, not here.

pub mod index;
pub mod schema;

pub use index::{LexicalBatch, LexicalIndex};
