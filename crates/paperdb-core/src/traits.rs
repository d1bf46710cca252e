use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{
    Checksum, Chunk, DeleteReport, IndexStats, KnnRequest, LoadedDocument, RetrievedChunk,
    StoredChunk, UpsertReport,
};

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Identifier recorded on every chunk this embedder produces.
    fn model_id(&self) -> &str;
    fn dim(&self) -> usize;
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut out = self.embed_batch(&[text.to_string()]).await?;
        out.pop().ok_or_else(|| {
            crate::Error::provider(self.model_id(), "embedding response was empty")
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionParams {
    pub temperature: f32,
    pub max_tokens: usize,
}

#[async_trait]
pub trait Completer: Send + Sync {
    fn model(&self) -> &str;
    async fn complete(&self, prompt: &str, params: CompletionParams) -> Result<String>;
}

#[async_trait]
pub trait DocumentLoader: Send + Sync {
    /// Name stored on every chunk for provenance.
    fn name(&self) -> &str;
    /// Lowercase file extensions (without dot) this loader accepts.
    fn extensions(&self) -> &[&str];
    async fn load(&self, path: &Path) -> Result<LoadedDocument>;

    fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions().iter().any(|x| x.eq_ignore_ascii_case(ext)))
    }
}

/// The persistent chunk index. All mutation goes through this trait.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    fn vector_dim(&self) -> usize;
    async fn ensure_schema(&self) -> Result<()>;
    async fn existing_checksums(&self, candidates: &[Checksum]) -> Result<HashSet<Checksum>>;
    async fn upsert(&self, chunks: &[Chunk]) -> Result<UpsertReport>;
    async fn delete_by_document_ids(&self, ids: &[String]) -> Result<DeleteReport>;
    async fn delete_by_checksums(&self, checksums: &[Checksum]) -> Result<DeleteReport>;
    async fn delete_all(&self) -> Result<DeleteReport>;
    async fn knn_search(&self, request: &KnnRequest<'_>) -> Result<Vec<RetrievedChunk>>;
    async fn stats(&self) -> Result<IndexStats>;
    async fn sample(&self, n: usize) -> Result<Vec<StoredChunk>>;
}
