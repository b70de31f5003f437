//! Collection engine: ties the splitters, lexical index and document store
//! together behind a single-writer indexer and a read-only query engine.

pub mod collection;
pub mod indexer;
pub mod query;

pub use collection::{ChunkStrategy, ChunkingConfig, Collection, CollectionConfig};
pub use indexer::Indexer;
pub use query::QueryEngine;
