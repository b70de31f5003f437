use crate::error::Result;

/// Strategy interface for passage splitting. Implementations turn one
/// document into an ordered sequence of sized passages; the collection
/// configuration selects the variant at creation time.
pub trait Splitter: Send + Sync {
    fn split(&self, text: &str) -> Result<Vec<String>>;
}

/// Embedding collaborator. Must return one vector per input text, each of
/// length `dim()`. Called once per fragment during chunked insert, once per
/// document during unchunked insert, and optionally once per query.
///
/// Treated as a blocking call on the writer's path; implementations that
/// are not thread-safe rely on the collection's single-writer discipline.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}
