#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use paperdb_core::config::{RefineFallback, RetrievalSettings};
use paperdb_core::traits::{ChunkStore, CompletionParams, Completer, DocumentLoader};
use paperdb_core::types::{
    Checksum, Chunk, DeleteReport, IndexStats, KnnRequest, LoadedDocument, RetrievedChunk,
    Segment, StoredChunk, UpsertReport,
};
use paperdb_core::{Error, Result};
use paperdb_embed::HashingEmbedder;
use paperdb_rag::{AnswerSynthesizer, HybridRetriever, QueryRefiner};
use paperdb_vector::MemoryChunkStore;

pub const DIM: usize = 256;

/// Completer that replays canned responses and records every prompt.
#[derive(Default)]
pub struct ScriptedCompleter {
    responses: Mutex<VecDeque<Result<String>>>,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedCompleter {
    pub fn new(responses: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.iter().map(|r| Ok((*r).to_string())).collect()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        let s = Self::default();
        s.responses.lock().unwrap().push_back(Err(Error::provider("scripted", "timeout")));
        Arc::new(s)
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompt(&self, i: usize) -> String {
        self.prompts.lock().unwrap()[i].clone()
    }
}

#[async_trait]
impl Completer for ScriptedCompleter {
    fn model(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, prompt: &str, _params: CompletionParams) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::provider("scripted", "no scripted response left")))
    }
}

/// Loader that returns fixed segments per file name and ignores file content.
#[derive(Default)]
pub struct StubLoader {
    pub docs: HashMap<String, Vec<Segment>>,
}

impl StubLoader {
    pub fn with(docs: &[(&str, Vec<Segment>)]) -> Arc<Self> {
        Arc::new(Self { docs: docs.iter().map(|(n, s)| ((*n).to_string(), s.clone())).collect() })
    }
}

#[async_trait]
impl DocumentLoader for StubLoader {
    fn name(&self) -> &str {
        "stub"
    }

    fn extensions(&self) -> &[&str] {
        &["pdf"]
    }

    async fn load(&self, path: &Path) -> Result<LoadedDocument> {
        let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        match self.docs.get(&name) {
            Some(segments) => Ok(LoadedDocument { segments: segments.clone() }),
            None => Ok(LoadedDocument::default()),
        }
    }
}

/// Wraps a memory store, counting checksum lookups and optionally failing
/// every chunk after the first of a given document.
pub struct InstrumentedStore {
    pub inner: MemoryChunkStore,
    pub checksum_queries: AtomicUsize,
    pub break_title: Option<String>,
}

impl InstrumentedStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { inner: MemoryChunkStore::new(DIM), checksum_queries: AtomicUsize::new(0), break_title: None })
    }

    pub fn breaking(title: &str) -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryChunkStore::new(DIM),
            checksum_queries: AtomicUsize::new(0),
            break_title: Some(title.to_string()),
        })
    }

    pub fn queries(&self) -> usize {
        self.checksum_queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChunkStore for InstrumentedStore {
    fn vector_dim(&self) -> usize {
        self.inner.vector_dim()
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.inner.ensure_schema().await
    }

    async fn existing_checksums(&self, candidates: &[Checksum]) -> Result<HashSet<Checksum>> {
        self.checksum_queries.fetch_add(1, Ordering::SeqCst);
        self.inner.existing_checksums(candidates).await
    }

    async fn upsert(&self, chunks: &[Chunk]) -> Result<UpsertReport> {
        match &self.break_title {
            Some(title) if chunks.first().is_some_and(|c| &c.title == title) => {
                let mut report = self.inner.upsert(&chunks[..1]).await?;
                report.failed = chunks.len() - 1;
                report.errors.push("simulated batch failure".into());
                Ok(report)
            }
            _ => self.inner.upsert(chunks).await,
        }
    }

    async fn delete_by_document_ids(&self, ids: &[String]) -> Result<DeleteReport> {
        self.inner.delete_by_document_ids(ids).await
    }

    async fn delete_by_checksums(&self, checksums: &[Checksum]) -> Result<DeleteReport> {
        self.inner.delete_by_checksums(checksums).await
    }

    async fn delete_all(&self) -> Result<DeleteReport> {
        self.inner.delete_all().await
    }

    async fn knn_search(&self, request: &KnnRequest<'_>) -> Result<Vec<RetrievedChunk>> {
        self.inner.knn_search(request).await
    }

    async fn stats(&self) -> Result<IndexStats> {
        self.inner.stats().await
    }

    async fn sample(&self, n: usize) -> Result<Vec<StoredChunk>> {
        self.inner.sample(n).await
    }
}

/// Hashing vectors are non-negative, so unrelated texts sit at exactly 0.5;
/// tests use a stricter floor.
pub fn retrieval_settings() -> RetrievalSettings {
    RetrievalSettings { min_score: 0.6, ..RetrievalSettings::default() }
}

pub fn synthesizer(
    completer: Arc<ScriptedCompleter>,
    store: Arc<dyn ChunkStore>,
    settings: RetrievalSettings,
) -> AnswerSynthesizer {
    let refiner = QueryRefiner::new(completer.clone(), RefineFallback::Fail);
    let retriever = HybridRetriever::new(refiner, Arc::new(HashingEmbedder::new(DIM)), store, settings);
    AnswerSynthesizer::new(retriever, completer, CompletionParams { temperature: 0.0, max_tokens: 256 })
}

pub fn stored_chunk(title: &str, checksum: &str, page: u32, ordinal: u32, text: &str) -> Chunk {
    let embedder = HashingEmbedder::new(DIM);
    Chunk {
        title: title.into(),
        document_checksum: Checksum::new(checksum),
        is_figure: false,
        page_number: page,
        ordinal,
        text: text.into(),
        embedding_model: "hashing-256".into(),
        loader: "stub".into(),
        chunking_strategy: "segment".into(),
        embedding: Some(embedder.embed_sync(text)),
    }
}

pub fn write_files(dir: &Path, files: &[(&str, &str)]) {
    for (name, content) in files {
        std::fs::write(dir.join(name), content).unwrap();
    }
}
