//! Domain types shared by the splitters, indexer and query engine.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Identifier of one indexed fragment. For chunked documents this is
/// `"{link}#{seq}"`; for unchunked documents it is the link itself.
pub type FragmentId = String;

/// Open-schema metadata: caller-defined string keys, at most one live
/// value per document per key.
pub type Meta = HashMap<String, String>;

/// A source document handed to the indexer.
///
/// `link` is the unique external identity within a collection; re-inserting
/// the same link updates the stored content instead of duplicating it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub link: String,
    pub content: String,
    pub metadata: Meta,
}

impl Document {
    pub fn new(link: impl Into<String>, content: impl Into<String>) -> Self {
        Self { link: link.into(), content: content.into(), metadata: Meta::new() }
    }

    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Raw per-signal scores for one fragment. A signal that produced no match
/// for the fragment stays `None`; scores are never fabricated.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SignalScores {
    /// BM25 score from the lexical index. Higher is better.
    pub lexical: Option<f32>,
    /// Nearest-neighbor distance from the vector index. Lower is better.
    pub distance: Option<f32>,
}

/// One search candidate. No fused ranking is imposed beyond the two raw
/// scores; callers re-rank using both signals as needed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub fragment_id: FragmentId,
    /// Link of the owning document.
    pub link: String,
    pub metadata: Meta,
    /// The fragment's own stored text. Present only when the collection
    /// indexes with chunking enabled.
    pub passage: Option<String>,
    pub scores: SignalScores,
}
