//! Arrow schemas for the persisted layout: one document table (link
//! unique), one metadata table (one row per key), one fragment table with
//! the fixed-dimension vector column, and a small key/value table holding
//! the collection configuration record.

use arrow_schema::{DataType, Field, Schema, TimeUnit};
use std::sync::Arc;

pub fn documents_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("link", DataType::Utf8, false),
        Field::new("content", DataType::Utf8, false),
    ]))
}

pub fn metadata_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("link", DataType::Utf8, false),
        Field::new("meta_key", DataType::Utf8, false),
        Field::new("meta_value", DataType::Utf8, false),
    ]))
}

pub fn fragments_schema(dim: i32) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("link", DataType::Utf8, false),
        Field::new("seq", DataType::Int32, false),
        // Null for the implicit fragment of an unchunked document.
        Field::new("passage", DataType::Utf8, true),
        Field::new(
            "vector",
            DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim),
            true,
        ),
    ]))
}

pub fn collection_meta_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("key", DataType::Utf8, false),
        Field::new("value", DataType::Utf8, false),
        Field::new("updated_at", DataType::Timestamp(TimeUnit::Millisecond, None), false),
    ]))
}
