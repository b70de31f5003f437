//! A collection is one directory on disk holding a lexical index, a
//! document/fragment store and a pinned configuration record. Opening an
//! existing collection with a different configuration is refused rather
//! than silently re-interpreted.

use serde::{Deserialize, Serialize};
use std::path::Path;

use passagedb_core::traits::Splitter;
use passagedb_core::{Error, Result};
use passagedb_split::{CodeSplitter, Language, SentenceSplitter};
use passagedb_store::Store;
use passagedb_text::LexicalIndex;

use crate::indexer::Indexer;
use crate::query::QueryEngine;

/// Key of the pinned configuration record in the store.
pub const CONFIG_KEY: &str = "collection_config";

/// How much of a chunked document's content is kept in the document table.
/// Full text stays reconstructable from the fragment rows.
pub const CONTENT_PREFIX_BYTES: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStrategy {
    /// Sentence-boundary accumulation for prose.
    Sentence,
    /// Syntax-tree splitting for source code in the given language.
    Code(Language),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Soft passage size bound in bytes.
    pub target_size: usize,
    pub strategy: ChunkStrategy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionConfig {
    pub embedding_dim: usize,
    /// `None` indexes each document as a single implicit fragment.
    pub chunking: Option<ChunkingConfig>,
}

pub struct Collection {
    pub(crate) store: Store,
    pub(crate) lexical: LexicalIndex,
    config: CollectionConfig,
    pub(crate) splitter: Option<Box<dyn Splitter>>,
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Collection {
    /// Opens the collection at `root`, creating it on first use. The
    /// configuration is pinned on creation; later opens must pass an equal
    /// configuration or fail with `InvalidConfig`.
    pub async fn create(root: &Path, config: CollectionConfig) -> Result<Self> {
        validate(&config)?;
        std::fs::create_dir_all(root).map_err(|e| Error::Other(e.into()))?;

        let store_uri = root.join("store").to_string_lossy().to_string();
        let store = Store::open(&store_uri, config.embedding_dim).await?;

        match store.get_config(CONFIG_KEY).await? {
            Some(stored) => {
                let pinned: CollectionConfig =
                    serde_json::from_str(&stored).map_err(|e| Error::InvalidConfig(e.to_string()))?;
                if pinned != config {
                    return Err(Error::InvalidConfig(format!(
                        "collection was created with a different configuration: {stored}"
                    )));
                }
            }
            None => {
                let encoded = serde_json::to_string(&config).map_err(|e| Error::InvalidConfig(e.to_string()))?;
                store.set_config(CONFIG_KEY, &encoded).await?;
            }
        }

        let lexical = LexicalIndex::open_or_create(&root.join("lexical"))?;
        let splitter = build_splitter(&config);
        tracing::info!(root = %root.display(), dim = config.embedding_dim, "collection opened");
        Ok(Self { store, lexical, config, splitter })
    }

    pub fn config(&self) -> &CollectionConfig {
        &self.config
    }

    /// Write handle. Takes `&mut self` so at most one writer exists per
    /// collection handle.
    pub fn indexer(&mut self) -> Indexer<'_> {
        Indexer::new(self)
    }

    /// Read handle; any number may coexist with each other.
    pub fn query_engine(&self) -> QueryEngine<'_> {
        QueryEngine::new(self)
    }

    /// Full text of a stored document. For chunked collections the text is
    /// reconstructed by concatenating passages in order; the document table
    /// only keeps a prefix.
    pub async fn document_text(&self, link: &str) -> Result<String> {
        if self.config.chunking.is_some() {
            let rows = self.store.fragments_of(link).await?;
            if rows.is_empty() {
                return Err(Error::NotFound(link.to_string()));
            }
            let mut text = String::new();
            for row in rows {
                if let Some(passage) = row.passage {
                    text.push_str(&passage);
                }
            }
            return Ok(text);
        }
        self.store
            .get_document(link)
            .await?
            .ok_or_else(|| Error::NotFound(link.to_string()))
    }
}

fn validate(config: &CollectionConfig) -> Result<()> {
    if config.embedding_dim == 0 {
        return Err(Error::InvalidConfig("embedding_dim must be positive".to_string()));
    }
    if let Some(chunking) = &config.chunking {
        if chunking.target_size == 0 {
            return Err(Error::InvalidConfig("chunking.target_size must be positive".to_string()));
        }
    }
    Ok(())
}

fn build_splitter(config: &CollectionConfig) -> Option<Box<dyn Splitter>> {
    let chunking = config.chunking.as_ref()?;
    Some(match chunking.strategy {
        ChunkStrategy::Sentence => Box::new(SentenceSplitter::new(chunking.target_size)),
        ChunkStrategy::Code(language) => Box::new(CodeSplitter::new(language, chunking.target_size)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_dim_is_rejected() {
        let config = CollectionConfig { embedding_dim: 0, chunking: None };
        assert!(matches!(validate(&config), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn zero_target_size_is_rejected() {
        let config = CollectionConfig {
            embedding_dim: 8,
            chunking: Some(ChunkingConfig { target_size: 0, strategy: ChunkStrategy::Sentence }),
        };
        assert!(matches!(validate(&config), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn config_json_roundtrip() {
        let config = CollectionConfig {
            embedding_dim: 16,
            chunking: Some(ChunkingConfig { target_size: 512, strategy: ChunkStrategy::Code(Language::Python) }),
        };
        let encoded = serde_json::to_string(&config).unwrap();
        let decoded: CollectionConfig = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, config);
    }
}
