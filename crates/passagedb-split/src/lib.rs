//! Passage splitting strategies: a generic sentence-accumulation splitter
//! and a syntax-aware splitter over tree-sitter parse trees. Both implement
//! `passagedb_core::traits::Splitter`.

pub mod code;
pub mod sentence;

pub use code::{CodeSplitter, Language};
pub use sentence::SentenceSplitter;
