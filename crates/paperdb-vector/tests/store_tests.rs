use std::collections::HashSet;
use std::sync::Arc;

use paperdb_core::traits::ChunkStore;
use paperdb_core::types::{Checksum, Chunk, ChunkField, Filter, KnnRequest};
use paperdb_vector::{LanceChunkStore, MemoryChunkStore};
use tempfile::TempDir;

const DIM: usize = 4;

const CITATION: [ChunkField; 4] =
    [ChunkField::Title, ChunkField::DocumentChecksum, ChunkField::PageNumber, ChunkField::Text];

fn chunk(title: &str, checksum: &str, page: u32, ordinal: u32, v: [f32; DIM]) -> Chunk {
    Chunk {
        title: title.into(),
        document_checksum: Checksum::new(checksum),
        is_figure: false,
        page_number: page,
        ordinal,
        text: format!("{title} p{page} #{ordinal}"),
        embedding_model: "hashing-4".into(),
        loader: "lopdf".into(),
        chunking_strategy: "segment".into(),
        embedding: Some(v.to_vec()),
    }
}

fn corpus() -> Vec<Chunk> {
    vec![
        chunk("a.pdf", "ca", 1, 0, [1.0, 0.0, 0.0, 0.0]),
        chunk("a.pdf", "ca", 2, 1, [0.9, 0.1, 0.0, 0.0]),
        chunk("b.pdf", "cb", 1, 0, [0.0, 1.0, 0.0, 0.0]),
        chunk("c.pdf", "cc", 1, 0, [-1.0, 0.0, 0.0, 0.0]),
    ]
}

async fn lance_store(dir: &TempDir, dim: usize) -> Arc<dyn ChunkStore> {
    let store = LanceChunkStore::open(&dir.path().join("db"), "chunks", dim, 2)
        .await
        .expect("open lancedb");
    store.ensure_schema().await.expect("schema");
    Arc::new(store)
}

async fn stores(dir: &TempDir) -> Vec<(&'static str, Arc<dyn ChunkStore>)> {
    vec![
        ("memory", Arc::new(MemoryChunkStore::new(DIM)) as Arc<dyn ChunkStore>),
        ("lancedb", lance_store(dir, DIM).await),
    ]
}

#[tokio::test]
async fn upsert_is_idempotent() {
    let dir = TempDir::new().unwrap();
    for (name, store) in stores(&dir).await {
        let first = store.upsert(&corpus()).await.unwrap();
        assert_eq!(first.written, 4, "{name}");
        assert!(first.is_complete());
        store.upsert(&corpus()).await.unwrap();
        let stats = store.stats().await.unwrap();
        assert_eq!(stats.chunk_count, 4, "{name}: re-upsert must not duplicate");
        assert_eq!(stats.document_count, 3, "{name}");
    }
}

#[tokio::test]
async fn existing_checksums_returns_exact_subset() {
    let dir = TempDir::new().unwrap();
    for (name, store) in stores(&dir).await {
        assert!(store.existing_checksums(&[]).await.unwrap().is_empty());
        store.upsert(&corpus()).await.unwrap();
        let asked = [Checksum::new("ca"), Checksum::new("zz"), Checksum::new("cc")];
        let found = store.existing_checksums(&asked).await.unwrap();
        let expected: HashSet<Checksum> = [Checksum::new("ca"), Checksum::new("cc")].into();
        assert_eq!(found, expected, "{name}");
    }
}

#[tokio::test]
async fn deletes_are_visible_immediately() {
    let dir = TempDir::new().unwrap();
    for (name, store) in stores(&dir).await {
        store.upsert(&corpus()).await.unwrap();

        let by_title = store.delete_by_document_ids(&["a.pdf".into()]).await.unwrap();
        assert_eq!(by_title.deleted, 2, "{name}");
        let left = store.existing_checksums(&[Checksum::new("ca"), Checksum::new("cb")]).await.unwrap();
        assert_eq!(left, [Checksum::new("cb")].into(), "{name}");

        let by_checksum = store.delete_by_checksums(&[Checksum::new("cb")]).await.unwrap();
        assert_eq!(by_checksum.deleted, 1, "{name}");

        let rest = store.delete_all().await.unwrap();
        assert_eq!(rest.deleted, 1, "{name}");
        assert_eq!(store.stats().await.unwrap().chunk_count, 0, "{name}");
        assert_eq!(store.delete_all().await.unwrap().deleted, 0, "{name}");
    }
}

#[tokio::test]
async fn knn_ranks_and_applies_score_floor() {
    let dir = TempDir::new().unwrap();
    for (name, store) in stores(&dir).await {
        store.upsert(&corpus()).await.unwrap();
        let query = [1.0, 0.0, 0.0, 0.0];
        let hits = store
            .knn_search(&KnnRequest {
                vector: &query,
                k: 10,
                min_score: 0.5,
                filters: &[],
                fields: &CITATION,
            })
            .await
            .unwrap();
        // the opposite vector scores 1/3 and the orthogonal one exactly 0.5
        assert!(hits.iter().all(|h| h.score >= 0.5), "{name}");
        assert!(hits.iter().all(|h| h.chunk.document_checksum != Checksum::new("cc")), "{name}");
        assert_eq!(hits[0].chunk.page_number, 1, "{name}");
        assert_eq!(hits[0].chunk.title, "a.pdf", "{name}");
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score), "{name}");
        // projection leaves unrequested attributes at their defaults
        assert!(hits[0].chunk.loader.is_empty(), "{name}");
        assert!(hits[0].chunk.embedding.is_none(), "{name}");
        assert!(!hits[0].chunk.text.is_empty(), "{name}");
    }
}

#[tokio::test]
async fn knn_respects_filters_and_k() {
    let dir = TempDir::new().unwrap();
    for (name, store) in stores(&dir).await {
        store.upsert(&corpus()).await.unwrap();
        let query = [1.0, 1.0, 0.0, 0.0];
        let filters = [Filter::Title("b.pdf".into())];
        let hits = store
            .knn_search(&KnnRequest {
                vector: &query,
                k: 10,
                min_score: 0.0,
                filters: &filters,
                fields: &ChunkField::ALL,
            })
            .await
            .unwrap();
        assert_eq!(hits.len(), 1, "{name}");
        assert_eq!(hits[0].chunk.title, "b.pdf", "{name}");

        let top1 = store
            .knn_search(&KnnRequest { vector: &query, k: 1, min_score: 0.0, filters: &[], fields: &ChunkField::ALL })
            .await
            .unwrap();
        assert_eq!(top1.len(), 1, "{name}");
    }
}

#[tokio::test]
async fn upsert_reports_missing_embeddings_and_rejects_wrong_width() {
    let dir = TempDir::new().unwrap();
    for (name, store) in stores(&dir).await {
        let mut chunks = corpus();
        chunks[1].embedding = None;
        let report = store.upsert(&chunks).await.unwrap();
        assert_eq!((report.written, report.failed), (3, 1), "{name}");

        let mut wide = corpus();
        wide[0].embedding = Some(vec![0.0; DIM + 1]);
        let err = store.upsert(&wide).await.expect_err("wrong width");
        assert!(err.is_config(), "{name}: {err}");
    }
}

#[tokio::test]
async fn sample_lists_stored_chunks() {
    let dir = TempDir::new().unwrap();
    for (name, store) in stores(&dir).await {
        store.upsert(&corpus()).await.unwrap();
        let sample = store.sample(2).await.unwrap();
        assert_eq!(sample.len(), 2, "{name}");
        assert!(sample.iter().all(|s| s.id == s.chunk.id()), "{name}");
        assert!(sample.iter().all(|s| s.chunk.embedding.is_none()), "{name}");
    }
}

#[tokio::test]
async fn lance_schema_is_created_once_and_dimension_checked() {
    let dir = TempDir::new().unwrap();
    let store = lance_store(&dir, DIM).await;
    store.ensure_schema().await.expect("second ensure is a no-op");
    store.upsert(&corpus()).await.unwrap();

    let reopened = lance_store(&dir, DIM).await;
    assert_eq!(reopened.stats().await.unwrap().chunk_count, 4, "data survives reopen");
    assert!(reopened.stats().await.unwrap().size_bytes > 0);

    let other = LanceChunkStore::open(&dir.path().join("db"), "chunks", DIM * 2, 2).await.unwrap();
    let err = other.ensure_schema().await.expect_err("dimension mismatch");
    assert!(err.is_config());
}

#[tokio::test]
async fn knn_accepts_k_beyond_row_count() {
    let dir = TempDir::new().unwrap();
    for (name, store) in stores(&dir).await {
        store.upsert(&corpus()).await.unwrap();
        let hits = store
            .knn_search(&KnnRequest {
                vector: &[1.0, 0.0, 0.0, 0.0],
                k: usize::MAX,
                min_score: 0.0,
                filters: &[],
                fields: &CITATION,
            })
            .await
            .unwrap();
        assert_eq!(hits.len(), 4, "{name}");
    }
}
