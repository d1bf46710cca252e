use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use paperdb_core::traits::ChunkStore;
use paperdb_core::types::{
    Checksum, Chunk, ChunkField, ChunkId, DeleteReport, IndexStats, KnnRequest, RetrievedChunk,
    StoredChunk, UpsertReport,
};
use paperdb_core::Result;

use crate::{check_dimensions, cosine_distance, distance_to_score};

/// Process-local store with brute-force search. Nothing survives the
/// process; used for ephemeral sessions and tests.
#[derive(Debug)]
pub struct MemoryChunkStore {
    dim: usize,
    chunks: RwLock<BTreeMap<ChunkId, Chunk>>,
}

impl MemoryChunkStore {
    pub fn new(dim: usize) -> Self {
        Self { dim, chunks: RwLock::new(BTreeMap::new()) }
    }

    pub async fn len(&self) -> usize {
        self.chunks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.chunks.read().await.is_empty()
    }

    async fn remove_where(&self, pred: impl Fn(&Chunk) -> bool) -> DeleteReport {
        let mut guard = self.chunks.write().await;
        let before = guard.len();
        guard.retain(|_, c| !pred(c));
        DeleteReport { deleted: before - guard.len(), failed: 0 }
    }
}

/// Keep only the requested attributes, like a column projection would.
fn project(chunk: &Chunk, fields: &[ChunkField]) -> Chunk {
    let mut out = Chunk::default();
    for field in fields {
        match field {
            ChunkField::Title => out.title.clone_from(&chunk.title),
            ChunkField::DocumentChecksum => out.document_checksum = chunk.document_checksum.clone(),
            ChunkField::IsFigure => out.is_figure = chunk.is_figure,
            ChunkField::PageNumber => out.page_number = chunk.page_number,
            ChunkField::Ordinal => out.ordinal = chunk.ordinal,
            ChunkField::Text => out.text.clone_from(&chunk.text),
            ChunkField::EmbeddingModel => out.embedding_model.clone_from(&chunk.embedding_model),
            ChunkField::Loader => out.loader.clone_from(&chunk.loader),
            ChunkField::ChunkingStrategy => {
                out.chunking_strategy.clone_from(&chunk.chunking_strategy);
            }
        }
    }
    out
}

#[async_trait]
impl ChunkStore for MemoryChunkStore {
    fn vector_dim(&self) -> usize {
        self.dim
    }

    async fn ensure_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn existing_checksums(&self, candidates: &[Checksum]) -> Result<HashSet<Checksum>> {
        if candidates.is_empty() {
            return Ok(HashSet::new());
        }
        let wanted: HashSet<&Checksum> = candidates.iter().collect();
        let guard = self.chunks.read().await;
        Ok(guard
            .values()
            .filter(|c| wanted.contains(&c.document_checksum))
            .map(|c| c.document_checksum.clone())
            .collect())
    }

    async fn upsert(&self, chunks: &[Chunk]) -> Result<UpsertReport> {
        check_dimensions(chunks, self.dim)?;
        let mut report = UpsertReport::default();
        let mut guard = self.chunks.write().await;
        for chunk in chunks {
            if chunk.embedding.is_none() {
                report.failed += 1;
                report.errors.push(format!("chunk {} has no embedding", chunk.id()));
                continue;
            }
            guard.insert(chunk.id(), chunk.clone());
            report.written += 1;
        }
        Ok(report)
    }

    async fn delete_by_document_ids(&self, ids: &[String]) -> Result<DeleteReport> {
        Ok(self.remove_where(|c| ids.iter().any(|id| *id == c.title)).await)
    }

    async fn delete_by_checksums(&self, checksums: &[Checksum]) -> Result<DeleteReport> {
        Ok(self.remove_where(|c| checksums.contains(&c.document_checksum)).await)
    }

    async fn delete_all(&self) -> Result<DeleteReport> {
        Ok(self.remove_where(|_| true).await)
    }

    async fn knn_search(&self, request: &KnnRequest<'_>) -> Result<Vec<RetrievedChunk>> {
        if request.vector.len() != self.dim {
            return Err(paperdb_core::Error::Config(format!(
                "query vector has {} dimensions, index expects {}",
                request.vector.len(),
                self.dim
            )));
        }
        let guard = self.chunks.read().await;
        let mut hits: Vec<RetrievedChunk> = guard
            .iter()
            .filter(|(_, c)| request.filters.iter().all(|f| f.matches(c)))
            .filter_map(|(id, c)| {
                let embedding = c.embedding.as_deref()?;
                let score = distance_to_score(cosine_distance(request.vector, embedding));
                Some(RetrievedChunk { id: id.clone(), score, chunk: project(c, request.fields) })
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(request.k);
        hits.retain(|h| h.score >= request.min_score);
        debug!(hits = hits.len(), "memory knn");
        Ok(hits)
    }

    async fn stats(&self) -> Result<IndexStats> {
        let guard = self.chunks.read().await;
        let documents: HashSet<&Checksum> = guard.values().map(|c| &c.document_checksum).collect();
        let size_bytes = guard
            .values()
            .map(|c| (c.text.len() + c.embedding.as_ref().map_or(0, |e| e.len() * 4)) as u64)
            .sum();
        Ok(IndexStats { chunk_count: guard.len(), document_count: documents.len(), size_bytes })
    }

    async fn sample(&self, n: usize) -> Result<Vec<StoredChunk>> {
        let guard = self.chunks.read().await;
        Ok(guard
            .iter()
            .take(n)
            .map(|(id, c)| StoredChunk { id: id.clone(), chunk: Chunk { embedding: None, ..c.clone() } })
            .collect())
    }
}
