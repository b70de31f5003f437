use passagedb_core::types::Meta;
use passagedb_store::{FragmentRow, Store};

async fn open_store(dim: usize) -> (tempfile::TempDir, Store) {
    let tmp = tempfile::tempdir().expect("tempdir");
    let uri = tmp.path().to_string_lossy().to_string();
    let store = Store::open(&uri, dim).await.expect("open store");
    (tmp, store)
}

fn frag(id: &str, link: &str, seq: usize, passage: &str, vector: Vec<f32>) -> FragmentRow {
    FragmentRow { id: id.to_string(), link: link.to_string(), seq, passage: Some(passage.to_string()), vector }
}

#[tokio::test]
async fn metadata_upsert_overwrites_in_place() -> anyhow::Result<()> {
    let (_tmp, store) = open_store(4).await;
    let mut meta = Meta::new();
    meta.insert("owner".to_string(), "alice".to_string());
    meta.insert("mime_type".to_string(), "text/plain".to_string());
    store.put_metadata("a/b.txt", &meta).await?;

    let mut update = Meta::new();
    update.insert("owner".to_string(), "bob".to_string());
    store.put_metadata("a/b.txt", &update).await?;

    let stored = store.get_metadata("a/b.txt").await?;
    assert_eq!(stored.len(), 2, "one live value per key");
    assert_eq!(stored.get("owner").map(String::as_str), Some("bob"));
    assert_eq!(stored.get("mime_type").map(String::as_str), Some("text/plain"));
    Ok(())
}

#[tokio::test]
async fn document_reupsert_keeps_single_row() -> anyhow::Result<()> {
    let (_tmp, store) = open_store(4).await;
    store.upsert_document("doc", "first version").await?;
    store.upsert_document("doc", "second version").await?;

    assert_eq!(store.document_count("doc").await?, 1);
    assert_eq!(store.get_document("doc").await?.as_deref(), Some("second version"));
    Ok(())
}

#[tokio::test]
async fn fragment_roundtrip_and_cascade_delete() -> anyhow::Result<()> {
    let (_tmp, store) = open_store(4).await;
    store
        .add_fragments(&[
            frag("doc#1", "doc", 1, "second passage", vec![0.0, 1.0, 0.0, 0.0]),
            frag("doc#0", "doc", 0, "first passage", vec![1.0, 0.0, 0.0, 0.0]),
        ])
        .await?;

    let (link, passage) = store.get_fragment("doc#0").await?.expect("fragment exists");
    assert_eq!(link, "doc");
    assert_eq!(passage.as_deref(), Some("first passage"));

    let rows = store.fragments_of("doc").await?;
    let seqs: Vec<usize> = rows.iter().map(|r| r.seq).collect();
    assert_eq!(seqs, vec![0, 1], "ordered by seq");
    assert_eq!(rows[0].vector, vec![1.0, 0.0, 0.0, 0.0]);

    store.delete_fragments("doc").await?;
    assert!(store.get_fragment("doc#0").await?.is_none());
    assert!(store.fragments_of("doc").await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn vector_search_returns_nearest_first() -> anyhow::Result<()> {
    let (_tmp, store) = open_store(4).await;
    store
        .add_fragments(&[
            frag("x#0", "x", 0, "x passage", vec![1.0, 0.0, 0.0, 0.0]),
            frag("y#0", "y", 0, "y passage", vec![0.0, 1.0, 0.0, 0.0]),
        ])
        .await?;

    let hits = store.vector_search(&[1.0, 0.0, 0.0, 0.0], 2).await?;
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].0, "x#0");
    assert!(hits[0].1 < hits[1].1, "nearest hit has the smaller distance");
    Ok(())
}

#[tokio::test]
async fn config_record_persists_across_open() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let uri = tmp.path().to_string_lossy().to_string();
    {
        let store = Store::open(&uri, 8).await?;
        store.set_config("collection_config", "{\"embedding_dim\":8}").await?;
    }
    let store = Store::open(&uri, 8).await?;
    assert_eq!(store.get_config("collection_config").await?.as_deref(), Some("{\"embedding_dim\":8}"));
    assert_eq!(store.get_config("missing").await?, None);
    Ok(())
}
