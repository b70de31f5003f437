//! Read path. Each search runs the lexical query and, when a query vector
//! is given, the nearest-neighbor query, then resolves every candidate
//! fragment back through the store. A candidate either index knows about
//! but the store cannot resolve is reported as divergence, not dropped.

use std::collections::HashMap;

use passagedb_core::types::{SearchResult, SignalScores};
use passagedb_core::{Error, Result};

use crate::collection::Collection;

pub struct QueryEngine<'a> {
    coll: &'a Collection,
}

impl<'a> QueryEngine<'a> {
    pub(crate) fn new(coll: &'a Collection) -> Self {
        Self { coll }
    }

    /// Searches the collection. `limit` applies per signal, so up to
    /// `2 * limit` distinct fragments can come back. Lexical candidates
    /// lead in BM25 order; vector-only candidates follow nearest first.
    pub async fn search(
        &self,
        query: &str,
        query_vec: Option<&[f32]>,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut order: Vec<String> = Vec::new();
        let mut scores: HashMap<String, SignalScores> = HashMap::new();

        for (id, score) in self.coll.lexical.search(query, limit)? {
            let entry = scores.entry(id.clone()).or_insert_with(|| {
                order.push(id);
                SignalScores::default()
            });
            entry.lexical = Some(score);
        }

        if let Some(vector) = query_vec {
            let dim = self.coll.config().embedding_dim;
            if vector.len() != dim {
                return Err(Error::DimensionMismatch { expected: dim, got: vector.len() });
            }
            for (id, distance) in self.coll.store.vector_search(vector, limit).await? {
                let entry = scores.entry(id.clone()).or_insert_with(|| {
                    order.push(id);
                    SignalScores::default()
                });
                entry.distance = Some(distance);
            }
        }

        let chunked = self.coll.config().chunking.is_some();
        let mut results = Vec::with_capacity(order.len());
        for id in order {
            let Some(entry) = scores.get(&id).copied() else { continue };
            results.push(self.resolve(&id, entry, chunked).await?);
        }
        Ok(results)
    }

    async fn resolve(&self, id: &str, entry: SignalScores, chunked: bool) -> Result<SearchResult> {
        let store = &self.coll.store;
        let (link, passage) = store
            .get_fragment(id)
            .await?
            .ok_or_else(|| Error::IndexDivergence(format!("fragment {id} is indexed but missing from the store")))?;
        if store.get_document(&link).await?.is_none() {
            return Err(Error::IndexDivergence(format!("fragment {id} points at missing document {link}")));
        }
        if chunked && passage.is_none() {
            return Err(Error::IndexDivergence(format!("fragment {id} has no stored passage in a chunked collection")));
        }
        let metadata = store.get_metadata(&link).await?;
        Ok(SearchResult { fragment_id: id.to_string(), link, metadata, passage, scores: entry })
    }
}
