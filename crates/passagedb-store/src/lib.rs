//! LanceDB-backed document, metadata and fragment store, including the
//! vector nearest-neighbor query. The indexer is the only writer; the
//! query engine only reads.

pub mod schema;

use anyhow::{anyhow, Result};
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, Int32Array, RecordBatch, RecordBatchIterator, StringArray,
    TimestampMillisecondArray,
};
use chrono::Utc;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection, Table};
use std::sync::Arc;

use passagedb_core::types::Meta;

use crate::schema::{collection_meta_schema, documents_schema, fragments_schema, metadata_schema};

pub const DOCUMENTS_TABLE: &str = "documents";
pub const METADATA_TABLE: &str = "metadata";
pub const FRAGMENTS_TABLE: &str = "fragments";
pub const COLLECTION_META_TABLE: &str = "collection_meta";

/// One fragment row: the contiguous passage text (when chunking is on) and
/// its embedding, keyed by fragment id and owned by `link`.
#[derive(Debug, Clone)]
pub struct FragmentRow {
    pub id: String,
    pub link: String,
    pub seq: usize,
    pub passage: Option<String>,
    pub vector: Vec<f32>,
}

pub struct Store {
    conn: Connection,
    dim: i32,
}

impl Store {
    /// Connects to `uri` and ensures all tables exist. Creating is
    /// idempotent; existing tables are left untouched.
    pub async fn open(uri: &str, dim: usize) -> Result<Self> {
        let conn = connect(uri).execute().await?;
        let store = Self { conn, dim: i32::try_from(dim)? };
        store.ensure_table(DOCUMENTS_TABLE, documents_schema()).await?;
        store.ensure_table(METADATA_TABLE, metadata_schema()).await?;
        store.ensure_table(FRAGMENTS_TABLE, fragments_schema(store.dim)).await?;
        store.ensure_table(COLLECTION_META_TABLE, collection_meta_schema()).await?;
        Ok(store)
    }

    pub fn dim(&self) -> usize {
        self.dim as usize
    }

    async fn ensure_table(&self, name: &str, schema: Arc<arrow_schema::Schema>) -> Result<()> {
        let names = self.conn.table_names().execute().await?;
        if names.contains(&name.to_string()) {
            return Ok(());
        }
        // create empty table with 0 rows
        let iter = RecordBatchIterator::new(vec![].into_iter(), schema);
        self.conn.create_table(name, Box::new(iter)).execute().await?;
        Ok(())
    }

    async fn table(&self, name: &str) -> Result<Table> {
        Ok(self.conn.open_table(name).execute().await?)
    }

    // ---- collection configuration record ----

    pub async fn set_config(&self, key: &str, value: &str) -> Result<()> {
        let table = self.table(COLLECTION_META_TABLE).await?;
        let batch = RecordBatch::try_new(
            collection_meta_schema(),
            vec![
                Arc::new(StringArray::from(vec![key.to_string()])),
                Arc::new(StringArray::from(vec![value.to_string()])),
                Arc::new(TimestampMillisecondArray::from(vec![Utc::now().timestamp_millis()])),
            ],
        )?;
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), collection_meta_schema()));
        let mut merge = table.merge_insert(&["key"]);
        merge.when_matched_update_all(None).when_not_matched_insert_all();
        let _ = merge.execute(reader).await?;
        Ok(())
    }

    pub async fn get_config(&self, key: &str) -> Result<Option<String>> {
        let table = self.table(COLLECTION_META_TABLE).await?;
        let mut stream = table.query().only_if(format!("key = {}", quoted(key))).execute().await?;
        while let Some(batch) = stream.try_next().await? {
            if batch.num_rows() == 0 {
                continue;
            }
            return Ok(Some(str_col(&batch, "value")?.value(0).to_string()));
        }
        Ok(None)
    }

    // ---- document rows ----

    pub async fn upsert_document(&self, link: &str, content: &str) -> Result<()> {
        let table = self.table(DOCUMENTS_TABLE).await?;
        let batch = RecordBatch::try_new(
            documents_schema(),
            vec![
                Arc::new(StringArray::from(vec![link.to_string()])),
                Arc::new(StringArray::from(vec![content.to_string()])),
            ],
        )?;
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), documents_schema()));
        let mut merge = table.merge_insert(&["link"]);
        merge.when_matched_update_all(None).when_not_matched_insert_all();
        let _ = merge.execute(reader).await?;
        Ok(())
    }

    pub async fn get_document(&self, link: &str) -> Result<Option<String>> {
        let table = self.table(DOCUMENTS_TABLE).await?;
        let mut stream = table.query().only_if(format!("link = {}", quoted(link))).execute().await?;
        while let Some(batch) = stream.try_next().await? {
            if batch.num_rows() == 0 {
                continue;
            }
            return Ok(Some(str_col(&batch, "content")?.value(0).to_string()));
        }
        Ok(None)
    }

    pub async fn document_count(&self, link: &str) -> Result<usize> {
        let table = self.table(DOCUMENTS_TABLE).await?;
        Ok(table.count_rows(Some(format!("link = {}", quoted(link)))).await?)
    }

    pub async fn delete_document(&self, link: &str) -> Result<()> {
        let table = self.table(DOCUMENTS_TABLE).await?;
        table.delete(&format!("link = {}", quoted(link))).await?;
        Ok(())
    }

    // ---- metadata rows ----

    /// Writes or overwrites the given key/value pairs for `link`. One row
    /// per key; updating a key replaces its prior value in place.
    pub async fn put_metadata(&self, link: &str, meta: &Meta) -> Result<()> {
        if meta.is_empty() {
            return Ok(());
        }
        let table = self.table(METADATA_TABLE).await?;
        let mut links = Vec::with_capacity(meta.len());
        let mut keys = Vec::with_capacity(meta.len());
        let mut values = Vec::with_capacity(meta.len());
        for (key, value) in meta {
            links.push(link.to_string());
            keys.push(key.clone());
            values.push(value.clone());
        }
        let batch = RecordBatch::try_new(
            metadata_schema(),
            vec![
                Arc::new(StringArray::from(links)),
                Arc::new(StringArray::from(keys)),
                Arc::new(StringArray::from(values)),
            ],
        )?;
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), metadata_schema()));
        let mut merge = table.merge_insert(&["link", "meta_key"]);
        merge.when_matched_update_all(None).when_not_matched_insert_all();
        let _ = merge.execute(reader).await?;
        Ok(())
    }

    pub async fn get_metadata(&self, link: &str) -> Result<Meta> {
        let table = self.table(METADATA_TABLE).await?;
        let mut stream = table.query().only_if(format!("link = {}", quoted(link))).execute().await?;
        let mut meta = Meta::new();
        while let Some(batch) = stream.try_next().await? {
            let keys = str_col(&batch, "meta_key")?;
            let values = str_col(&batch, "meta_value")?;
            for i in 0..batch.num_rows() {
                meta.insert(keys.value(i).to_string(), values.value(i).to_string());
            }
        }
        Ok(meta)
    }

    pub async fn delete_metadata(&self, link: &str) -> Result<()> {
        let table = self.table(METADATA_TABLE).await?;
        table.delete(&format!("link = {}", quoted(link))).await?;
        Ok(())
    }

    // ---- fragment rows ----

    pub async fn add_fragments(&self, rows: &[FragmentRow]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let table = self.table(FRAGMENTS_TABLE).await?;
        let batch = self.fragments_batch(rows)?;
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), fragments_schema(self.dim)));
        let mut merge = table.merge_insert(&["id"]);
        merge.when_matched_update_all(None).when_not_matched_insert_all();
        let _ = merge.execute(reader).await?;
        Ok(())
    }

    fn fragments_batch(&self, rows: &[FragmentRow]) -> Result<RecordBatch> {
        let mut ids = Vec::with_capacity(rows.len());
        let mut links = Vec::with_capacity(rows.len());
        let mut seqs = Vec::with_capacity(rows.len());
        let mut passages: Vec<Option<String>> = Vec::with_capacity(rows.len());
        let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::with_capacity(rows.len());
        for row in rows {
            ids.push(row.id.clone());
            links.push(row.link.clone());
            seqs.push(i32::try_from(row.seq)?);
            passages.push(row.passage.clone());
            vectors.push(Some(row.vector.iter().map(|&x| Some(x)).collect()));
        }
        let batch = RecordBatch::try_new(
            fragments_schema(self.dim),
            vec![
                Arc::new(StringArray::from(ids)),
                Arc::new(StringArray::from(links)),
                Arc::new(Int32Array::from(seqs)),
                Arc::new(StringArray::from(passages)),
                Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(
                    vectors.into_iter(),
                    self.dim,
                )),
            ],
        )?;
        Ok(batch)
    }

    /// Resolves one fragment to `(owning link, stored passage)`.
    pub async fn get_fragment(&self, id: &str) -> Result<Option<(String, Option<String>)>> {
        let table = self.table(FRAGMENTS_TABLE).await?;
        let mut stream = table.query().only_if(format!("id = {}", quoted(id))).execute().await?;
        while let Some(batch) = stream.try_next().await? {
            if batch.num_rows() == 0 {
                continue;
            }
            let link = str_col(&batch, "link")?.value(0).to_string();
            let passages = str_col(&batch, "passage")?;
            let passage = if passages.is_null(0) { None } else { Some(passages.value(0).to_string()) };
            return Ok(Some((link, passage)));
        }
        Ok(None)
    }

    /// All fragment rows of one document, ordered by `seq`.
    pub async fn fragments_of(&self, link: &str) -> Result<Vec<FragmentRow>> {
        let table = self.table(FRAGMENTS_TABLE).await?;
        let mut stream = table.query().only_if(format!("link = {}", quoted(link))).execute().await?;
        let mut rows = Vec::new();
        while let Some(batch) = stream.try_next().await? {
            let ids = str_col(&batch, "id")?;
            let links = str_col(&batch, "link")?;
            let seqs = batch
                .column_by_name("seq")
                .and_then(|c| c.as_any().downcast_ref::<Int32Array>())
                .ok_or_else(|| anyhow!("fragments.seq column missing"))?;
            let passages = str_col(&batch, "passage")?;
            let vectors = batch
                .column_by_name("vector")
                .and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>())
                .ok_or_else(|| anyhow!("fragments.vector column missing"))?;
            for i in 0..batch.num_rows() {
                let vector = if vectors.is_null(i) {
                    Vec::new()
                } else {
                    let values = vectors.value(i);
                    let floats = values
                        .as_any()
                        .downcast_ref::<Float32Array>()
                        .ok_or_else(|| anyhow!("fragments.vector items are not f32"))?;
                    floats.iter().flatten().collect()
                };
                rows.push(FragmentRow {
                    id: ids.value(i).to_string(),
                    link: links.value(i).to_string(),
                    seq: usize::try_from(seqs.value(i).max(0))?,
                    passage: if passages.is_null(i) { None } else { Some(passages.value(i).to_string()) },
                    vector,
                });
            }
        }
        rows.sort_by_key(|r| r.seq);
        Ok(rows)
    }

    pub async fn delete_fragments(&self, link: &str) -> Result<()> {
        let table = self.table(FRAGMENTS_TABLE).await?;
        table.delete(&format!("link = {}", quoted(link))).await?;
        Ok(())
    }

    // ---- vector nearest-neighbor query ----

    /// Returns up to `limit` `(fragment_id, distance)` pairs, nearest
    /// first. Distances are the index's own raw values (lower is better).
    pub async fn vector_search(&self, vector: &[f32], limit: usize) -> Result<Vec<(String, f32)>> {
        let table = self.table(FRAGMENTS_TABLE).await?;
        let mut stream = table.vector_search(vector.to_vec())?.limit(limit).execute().await?;
        let mut hits = Vec::new();
        while let Some(batch) = stream.try_next().await? {
            let ids = str_col(&batch, "id")?;
            let distances = batch
                .column_by_name("_distance")
                .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
                .ok_or_else(|| anyhow!("_distance column missing from vector query"))?;
            for i in 0..batch.num_rows() {
                hits.push((ids.value(i).to_string(), distances.value(i)));
            }
        }
        Ok(hits)
    }
}

fn quoted(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn str_col<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| anyhow!("{} column missing", name))
}
