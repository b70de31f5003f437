use anyhow::Result;
use std::path::Path;
use tantivy::collector::TopDocs;
use tantivy::directory::MmapDirectory;
use tantivy::query::QueryParser;
use tantivy::schema::{Field, Value};
use tantivy::{doc, Index, IndexWriter, TantivyDocument, Term};

use crate::schema::{build_schema, register_tokenizer};

pub struct LexicalIndex {
    index: Index,
    fragment_id_field: Field,
    link_field: Field,
    content_field: Field,
}

impl LexicalIndex {
    /// Opens the index at `dir`, creating it if absent. Safe to call on
    /// every collection open.
    pub fn open_or_create(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let index = Index::open_or_create(MmapDirectory::open(dir)?, build_schema())?;
        register_tokenizer(&index);
        let schema = index.schema();
        let fragment_id_field = schema.get_field("fragment_id")?;
        let link_field = schema.get_field("link")?;
        let content_field = schema.get_field("content")?;
        Ok(Self { index, fragment_id_field, link_field, content_field })
    }

    /// Starts a staged write batch. Nothing becomes visible to readers
    /// until the batch commits.
    pub fn batch(&self) -> Result<LexicalBatch> {
        Ok(LexicalBatch {
            writer: self.index.writer(50_000_000)?,
            fragment_id_field: self.fragment_id_field,
            link_field: self.link_field,
            content_field: self.content_field,
        })
    }

    /// BM25 search over fragment content. Returns `(fragment_id, score)`
    /// in the index's own ranking order (higher is better).
    ///
    /// Queries are free-form text, not query syntax. Lenient parsing keeps
    /// punctuation-heavy input (code, for one) from being rejected as a
    /// syntax error; unparseable pieces are dropped and the rest matches.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<(String, f32)>> {
        let reader = self.index.reader()?;
        let searcher = reader.searcher();
        let query_parser = QueryParser::for_index(&self.index, vec![self.content_field]);
        let (parsed, _errors) = query_parser.parse_query_lenient(query);
        let top_docs = searcher.search(&parsed, &TopDocs::with_limit(limit))?;
        let mut hits = Vec::new();
        for (score, addr) in top_docs {
            let doc: TantivyDocument = searcher.doc(addr)?;
            let id = doc
                .get_first(self.fragment_id_field)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            hits.push((id, score));
        }
        Ok(hits)
    }
}

/// Staged lexical writes for one upsert or delete.
///
/// Dropping the batch without committing discards everything, which is how
/// the indexer rolls back after a store-side failure.
pub struct LexicalBatch {
    writer: IndexWriter,
    fragment_id_field: Field,
    link_field: Field,
    content_field: Field,
}

impl LexicalBatch {
    /// Queues deletion of every entry belonging to `link`.
    pub fn delete_document(&mut self, link: &str) {
        self.writer.delete_term(Term::from_field_text(self.link_field, link));
    }

    pub fn add_fragment(&mut self, fragment_id: &str, link: &str, content: &str) -> Result<()> {
        self.writer.add_document(doc!(
            self.fragment_id_field => fragment_id.to_string(),
            self.link_field => link.to_string(),
            self.content_field => content.to_string(),
        ))?;
        Ok(())
    }

    pub fn commit(mut self) -> Result<()> {
        self.writer.commit()?;
        Ok(())
    }

    pub fn rollback(mut self) {
        tracing::debug!("rolling back staged lexical writes");
        let _ = self.writer.rollback();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open(dir: &TempDir) -> LexicalIndex {
        LexicalIndex::open_or_create(dir.path()).expect("open index")
    }

    #[test]
    fn committed_fragments_are_searchable() {
        let tmp = TempDir::new().unwrap();
        let index = open(&tmp);
        let mut batch = index.batch().unwrap();
        batch.add_fragment("a#0", "a", "the quick brown fox").unwrap();
        batch.add_fragment("a#1", "a", "jumps over the lazy dog").unwrap();
        batch.commit().unwrap();

        let hits = index.search("fox", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, "a#0");
        assert!(hits[0].1 > 0.0);
    }

    #[test]
    fn uncommitted_batch_is_invisible() {
        let tmp = TempDir::new().unwrap();
        let index = open(&tmp);
        let mut batch = index.batch().unwrap();
        batch.add_fragment("a#0", "a", "ephemeral passage").unwrap();
        batch.rollback();

        assert!(index.search("ephemeral", 10).unwrap().is_empty());
    }

    #[test]
    fn delete_document_removes_all_its_fragments() {
        let tmp = TempDir::new().unwrap();
        let index = open(&tmp);
        let mut batch = index.batch().unwrap();
        batch.add_fragment("a#0", "a", "shared term alpha").unwrap();
        batch.add_fragment("b#0", "b", "shared term beta").unwrap();
        batch.commit().unwrap();

        let mut batch = index.batch().unwrap();
        batch.delete_document("a");
        batch.commit().unwrap();

        let ids: Vec<String> = index.search("shared", 10).unwrap().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["b#0".to_string()]);
    }

    #[test]
    fn punctuated_query_text_matches_instead_of_erroring() {
        let tmp = TempDir::new().unwrap();
        let index = open(&tmp);
        let mut batch = index.batch().unwrap();
        let fragment = "def f():\n    return 1\n";
        batch.add_fragment("a#0", "a", fragment).unwrap();
        batch.commit().unwrap();

        // A fragment's own text is a valid query for itself.
        let hits = index.search(fragment, 10).unwrap();
        assert_eq!(hits.first().map(|(id, _)| id.as_str()), Some("a#0"));

        // Pure query-syntax noise degrades to no matches, never an error.
        assert!(index.search("():[]~^", 10).unwrap().is_empty());
    }

    #[test]
    fn reopen_preserves_committed_entries() {
        let tmp = TempDir::new().unwrap();
        {
            let index = open(&tmp);
            let mut batch = index.batch().unwrap();
            batch.add_fragment("a#0", "a", "durable entry").unwrap();
            batch.commit().unwrap();
        }
        let index = open(&tmp);
        assert_eq!(index.search("durable", 10).unwrap().len(), 1);
    }
}
