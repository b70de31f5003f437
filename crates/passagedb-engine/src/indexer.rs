//! Write path. Every upsert replaces a document's fragments in both the
//! lexical index and the store; the lexical batch stays invisible until it
//! commits last, and a store-side failure restores the prior fragment rows
//! before the error surfaces. Readers therefore never observe a half-written
//! document.

use passagedb_core::traits::Embedder;
use passagedb_core::types::{Document, Meta};
use passagedb_core::{Error, Result};
use passagedb_store::FragmentRow;

use crate::collection::{Collection, CONTENT_PREFIX_BYTES};

/// Pre-write state of one document across all store tables, captured
/// before any store write so a failure can put everything back.
struct Snapshot {
    fragments: Vec<FragmentRow>,
    document: Option<String>,
    metadata: Meta,
}

pub struct Indexer<'a> {
    coll: &'a mut Collection,
}

impl<'a> Indexer<'a> {
    pub(crate) fn new(coll: &'a mut Collection) -> Self {
        Self { coll }
    }

    /// Inserts or replaces one document. Returns the number of fragments
    /// written. All embeddings are validated before anything is touched.
    pub async fn upsert(&mut self, doc: &Document, embedder: &dyn Embedder) -> Result<usize> {
        let dim = self.coll.config().embedding_dim;
        if embedder.dim() != dim {
            return Err(Error::DimensionMismatch { expected: dim, got: embedder.dim() });
        }

        let texts = match &self.coll.splitter {
            Some(splitter) => coalesce(splitter.split(&doc.content)?, target_size(self.coll)),
            None => vec![doc.content.clone()],
        };

        let vectors = embedder.embed_batch(&texts)?;
        if vectors.len() != texts.len() {
            return Err(Error::Other(anyhow::anyhow!(
                "embedder returned {} vectors for {} texts",
                vectors.len(),
                texts.len()
            )));
        }
        for vector in &vectors {
            if vector.len() != dim {
                return Err(Error::DimensionMismatch { expected: dim, got: vector.len() });
            }
        }

        let chunked = self.coll.splitter.is_some();
        let rows: Vec<FragmentRow> = texts
            .iter()
            .zip(vectors)
            .enumerate()
            .map(|(seq, (text, vector))| FragmentRow {
                id: if chunked { fragment_id(&doc.link, seq) } else { doc.link.clone() },
                link: doc.link.clone(),
                seq,
                passage: chunked.then(|| text.clone()),
                vector,
            })
            .collect();
        let stored_content = if chunked { prefix(&doc.content) } else { doc.content.as_str() };

        // Stage lexical writes first; they stay invisible until commit.
        let mut batch = self.coll.lexical.batch()?;
        batch.delete_document(&doc.link);
        for (row, text) in rows.iter().zip(&texts) {
            if let Err(e) = batch.add_fragment(&row.id, &doc.link, text) {
                batch.rollback();
                return Err(Error::WriteFailed(e.to_string()));
            }
        }

        // Snapshot everything being replaced so a failure can restore it.
        let prior = self.snapshot(&doc.link).await?;

        if let Err(e) = self.apply_store_writes(doc, &rows, stored_content).await {
            self.restore(&doc.link, &prior).await;
            batch.rollback();
            return Err(Error::WriteFailed(e.to_string()));
        }

        if let Err(e) = batch.commit() {
            self.restore(&doc.link, &prior).await;
            return Err(Error::WriteFailed(e.to_string()));
        }
        tracing::debug!(link = %doc.link, fragments = rows.len(), "document upserted");
        Ok(rows.len())
    }

    /// Removes a document and everything derived from it. Idempotent. A
    /// failure partway through the store deletes restores the pre-delete
    /// state, so both indexes stay consistent either way.
    pub async fn delete(&mut self, link: &str) -> Result<()> {
        let mut batch = self.coll.lexical.batch()?;
        batch.delete_document(link);

        let prior = self.snapshot(link).await?;
        let store = &self.coll.store;
        let outcome = async {
            store.delete_fragments(link).await?;
            store.delete_metadata(link).await?;
            store.delete_document(link).await?;
            Ok::<(), anyhow::Error>(())
        }
        .await;
        if let Err(e) = outcome {
            self.restore(link, &prior).await;
            batch.rollback();
            return Err(Error::WriteFailed(e.to_string()));
        }

        batch.commit().map_err(|e| Error::WriteFailed(e.to_string()))?;
        tracing::debug!(link, "document deleted");
        Ok(())
    }

    async fn apply_store_writes(&self, doc: &Document, rows: &[FragmentRow], content: &str) -> anyhow::Result<()> {
        let store = &self.coll.store;
        store.delete_fragments(&doc.link).await?;
        store.add_fragments(rows).await?;
        store.upsert_document(&doc.link, content).await?;
        store.put_metadata(&doc.link, &doc.metadata).await?;
        Ok(())
    }

    async fn snapshot(&self, link: &str) -> anyhow::Result<Snapshot> {
        let store = &self.coll.store;
        Ok(Snapshot {
            fragments: store.fragments_of(link).await?,
            document: store.get_document(link).await?,
            metadata: store.get_metadata(link).await?,
        })
    }

    /// Best-effort restore of the snapshot across all store tables after a
    /// failed write. The original error is what the caller sees.
    async fn restore(&self, link: &str, prior: &Snapshot) {
        let store = &self.coll.store;
        let outcome = async {
            store.delete_fragments(link).await?;
            store.add_fragments(&prior.fragments).await?;
            match &prior.document {
                Some(content) => store.upsert_document(link, content).await?,
                None => store.delete_document(link).await?,
            }
            store.delete_metadata(link).await?;
            store.put_metadata(link, &prior.metadata).await?;
            Ok::<(), anyhow::Error>(())
        }
        .await;
        if let Err(e) = outcome {
            tracing::error!(link, error = %e, "restoring pre-write state failed");
        }
    }
}

fn fragment_id(link: &str, seq: usize) -> String {
    format!("{link}#{seq}")
}

fn target_size(coll: &Collection) -> usize {
    coll.config().chunking.map_or(0, |c| c.target_size)
}

/// First `CONTENT_PREFIX_BYTES` of `content`, backed off to a char boundary.
fn prefix(content: &str) -> &str {
    if content.len() <= CONTENT_PREFIX_BYTES {
        return content;
    }
    let mut end = CONTENT_PREFIX_BYTES;
    while !content.is_char_boundary(end) {
        end -= 1;
    }
    &content[..end]
}

/// Merges short passages forward so runs of tiny splitter output do not
/// become one fragment each. Emits the accumulated run before it would
/// exceed `target`; a single oversized passage passes through unsplit.
fn coalesce(passages: Vec<String>, target: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut carry = String::new();
    for passage in passages {
        if !carry.is_empty() && carry.len() + passage.len() > target {
            out.push(std::mem::take(&mut carry));
        }
        carry.push_str(&passage);
    }
    if !carry.is_empty() {
        out.push(carry);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coalesce_merges_short_runs() {
        let passages = vec!["aa".to_string(), "bb".to_string(), "cc".to_string(), "dd".to_string()];
        let merged = coalesce(passages, 5);
        assert_eq!(merged, vec!["aabb".to_string(), "ccdd".to_string()]);
    }

    #[test]
    fn coalesce_passes_oversized_passage_through() {
        let passages = vec!["x".repeat(100), "y".to_string()];
        let merged = coalesce(passages, 10);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].len(), 100);
    }

    #[test]
    fn coalesce_preserves_concatenation() {
        let passages: Vec<String> = (0..20).map(|i| format!("passage {i} ")).collect();
        let joined: String = passages.concat();
        let merged = coalesce(passages, 64);
        assert_eq!(merged.concat(), joined);
        assert!(merged.len() > 1);
    }

    #[test]
    fn prefix_respects_char_boundaries() {
        let content = "é".repeat(CONTENT_PREFIX_BYTES);
        let cut = prefix(&content);
        assert!(cut.len() <= CONTENT_PREFIX_BYTES);
        assert!(content.starts_with(cut));
        assert!(!cut.is_empty());
    }

    #[test]
    fn prefix_is_identity_for_short_content() {
        assert_eq!(prefix("short"), "short");
    }

    #[test]
    fn fragment_ids_are_link_scoped() {
        assert_eq!(fragment_id("docs/a.md", 3), "docs/a.md#3");
    }

    #[tokio::test]
    async fn restore_reverts_partially_applied_store_writes() {
        use crate::collection::{ChunkStrategy, ChunkingConfig, CollectionConfig};
        use passagedb_core::types::Document;
        use passagedb_embed::HashEmbedder;

        let tmp = tempfile::tempdir().unwrap();
        let config = CollectionConfig {
            embedding_dim: 8,
            chunking: Some(ChunkingConfig { target_size: 120, strategy: ChunkStrategy::Sentence }),
        };
        let mut coll = Collection::create(tmp.path(), config).await.unwrap();
        let embedder = HashEmbedder::new(8);
        let doc = Document::new("doc", "Original content about barns.").with_meta("rev", "1");
        let mut indexer = coll.indexer();
        indexer.upsert(&doc, &embedder).await.unwrap();

        let prior = indexer.snapshot("doc").await.unwrap();

        // Leave the store in a half-replaced state, as a write that died
        // between its table updates would.
        let store = &indexer.coll.store;
        store.delete_fragments("doc").await.unwrap();
        store.upsert_document("doc", "Replacement content about silos.").await.unwrap();
        let mut meta = passagedb_core::types::Meta::new();
        meta.insert("rev".to_string(), "2".to_string());
        store.put_metadata("doc", &meta).await.unwrap();

        indexer.restore("doc", &prior).await;

        let store = &indexer.coll.store;
        assert_eq!(store.get_document("doc").await.unwrap().as_deref(), Some("Original content about barns."));
        assert_eq!(store.get_metadata("doc").await.unwrap().get("rev").map(String::as_str), Some("1"));
        let fragments = store.fragments_of("doc").await.unwrap();
        assert_eq!(fragments.len(), prior.fragments.len());
        assert!(fragments[0].passage.as_deref().is_some_and(|p| p.contains("barns")));
    }
}
