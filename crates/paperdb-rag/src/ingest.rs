//! Folder ingestion: checksum dedup, load, chunk, embed, upsert.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{error, info, warn};
use walkdir::WalkDir;

use paperdb_core::chunker::{ChunkContext, Chunker};
use paperdb_core::identity::checksum_file;
use paperdb_core::traits::{ChunkStore, DocumentLoader, Embedder};
use paperdb_core::types::{Checksum, Chunk};
use paperdb_core::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyIndexed,
    /// Same content as an earlier file of the same run.
    Duplicate { of: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    pub name: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub found: usize,
    pub succeeded: usize,
    pub skipped: Vec<Skipped>,
    pub failed: Vec<Failure>,
    pub chunks_written: usize,
}

/// Progress callbacks. All methods default to no-ops.
pub trait IngestObserver: Send + Sync {
    fn scanned(&self, _found: usize, _to_process: usize) {}
    fn document_started(&self, _name: &str) {}
    fn document_finished(&self, _name: &str, _result: std::result::Result<usize, &str>) {}
}

pub struct NoopObserver;

impl IngestObserver for NoopObserver {}

struct Candidate {
    name: String,
    path: PathBuf,
    checksum: Checksum,
}

pub struct IngestPipeline {
    loader: Arc<dyn DocumentLoader>,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn ChunkStore>,
    chunker: Chunker,
    embed_batch_size: usize,
    concurrency: usize,
}

impl IngestPipeline {
    pub fn new(
        loader: Arc<dyn DocumentLoader>,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn ChunkStore>,
        chunker: Chunker,
    ) -> Self {
        Self { loader, embedder, store, chunker, embed_batch_size: 64, concurrency: 1 }
    }

    #[must_use]
    pub fn with_embed_batch_size(mut self, size: usize) -> Self {
        self.embed_batch_size = size.max(1);
        self
    }

    #[must_use]
    pub fn with_concurrency(mut self, workers: usize) -> Self {
        self.concurrency = workers.max(1);
        self
    }

    /// Files directly inside `folder` accepted by the loader, sorted by name.
    fn enumerate(&self, folder: &Path) -> Result<Vec<(String, PathBuf)>> {
        if !folder.is_dir() {
            return Err(Error::Input(format!("folder not found: {}", folder.display())));
        }
        let mut files = Vec::new();
        for entry in WalkDir::new(folder).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| Error::Io(e.into()))?;
            if entry.file_type().is_file() && self.loader.accepts(entry.path()) {
                files.push((entry.file_name().to_string_lossy().into_owned(), entry.into_path()));
            }
        }
        files.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(files)
    }

    pub async fn ingest_folder(&self, folder: &Path, observer: &dyn IngestObserver) -> Result<IngestReport> {
        let files = self.enumerate(folder)?;
        let mut report = IngestReport { found: files.len(), ..IngestReport::default() };
        if files.is_empty() {
            info!(folder = %folder.display(), "no files found");
            observer.scanned(0, 0);
            return Ok(report);
        }

        let mut candidates = Vec::with_capacity(files.len());
        for (name, path) in files {
            let hashed = path.clone();
            let checksum = tokio::task::spawn_blocking(move || checksum_file(&hashed))
                .await
                .map_err(|e| Error::load(&path, e))?;
            match checksum {
                Ok(checksum) => candidates.push(Candidate { name, path, checksum }),
                Err(e) => {
                    warn!(file = %name, error = %e, "could not read file");
                    report.failed.push(Failure { name, reason: e.to_string() });
                }
            }
        }

        let all: Vec<Checksum> = candidates.iter().map(|c| c.checksum.clone()).collect();
        let existing = self.store.existing_checksums(&all).await?;

        let mut first_seen: HashMap<Checksum, String> = HashMap::new();
        let mut to_process = Vec::new();
        for candidate in candidates {
            if existing.contains(&candidate.checksum) {
                report.skipped.push(Skipped { name: candidate.name, reason: SkipReason::AlreadyIndexed });
            } else if let Some(first) = first_seen.get(&candidate.checksum) {
                report.skipped.push(Skipped {
                    name: candidate.name,
                    reason: SkipReason::Duplicate { of: first.clone() },
                });
            } else {
                first_seen.insert(candidate.checksum.clone(), candidate.name.clone());
                to_process.push(candidate);
            }
        }
        info!(
            found = report.found,
            new = to_process.len(),
            skipped = report.skipped.len(),
            "scanned folder"
        );
        observer.scanned(report.found, to_process.len());

        let outcomes: Vec<(String, Result<usize>)> = stream::iter(to_process)
            .map(|candidate| async move {
                observer.document_started(&candidate.name);
                let outcome = self.process(&candidate).await;
                match &outcome {
                    Ok(written) => observer.document_finished(&candidate.name, Ok(*written)),
                    Err(e) => observer.document_finished(&candidate.name, Err(&e.to_string())),
                }
                (candidate.name, outcome)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        for (name, outcome) in outcomes {
            match outcome {
                Ok(written) => {
                    report.succeeded += 1;
                    report.chunks_written += written;
                }
                Err(e) if e.is_config() => return Err(e),
                Err(e) => report.failed.push(Failure { name, reason: e.to_string() }),
            }
        }
        info!(
            succeeded = report.succeeded,
            failed = report.failed.len(),
            chunks = report.chunks_written,
            "ingestion finished"
        );
        Ok(report)
    }

    /// Load, chunk, embed and store one document. Returns chunks written.
    async fn process(&self, candidate: &Candidate) -> Result<usize> {
        let doc = self.loader.load(&candidate.path).await?;
        let ctx = ChunkContext {
            title: &candidate.name,
            checksum: &candidate.checksum,
            embedding_model: self.embedder.model_id(),
            loader: self.loader.name(),
        };
        let mut chunks = self.chunker.build(&doc, &ctx);
        if chunks.is_empty() {
            return Err(Error::load(&candidate.path, "no extractable text"));
        }
        self.embed(&mut chunks).await?;

        match self.store.upsert(&chunks).await {
            Ok(report) if report.is_complete() => {
                info!(file = %candidate.name, chunks = report.written, "indexed");
                Ok(report.written)
            }
            Ok(report) => {
                let mut reason = format!(
                    "{} of {} chunks failed to store: {}",
                    report.failed,
                    chunks.len(),
                    report.errors.first().map_or("", String::as_str)
                );
                self.compensate(candidate, &mut reason).await;
                Err(Error::store(reason))
            }
            Err(e) if e.is_config() => Err(e),
            Err(e) => {
                let mut reason = e.to_string();
                self.compensate(candidate, &mut reason).await;
                Err(Error::store(reason))
            }
        }
    }

    async fn embed(&self, chunks: &mut [Chunk]) -> Result<()> {
        for batch in chunks.chunks_mut(self.embed_batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = self.embedder.embed_batch(&texts).await?;
            if vectors.len() != batch.len() {
                return Err(Error::provider(
                    self.embedder.model_id(),
                    format!("returned {} embeddings for {} texts", vectors.len(), batch.len()),
                ));
            }
            for (chunk, vector) in batch.iter_mut().zip(vectors) {
                chunk.embedding = Some(vector);
            }
        }
        Ok(())
    }

    /// Remove whatever part of a failed document reached the store, so the
    /// checksum pre-check does not skip it on the next run.
    async fn compensate(&self, candidate: &Candidate, reason: &mut String) {
        error!(file = %candidate.name, reason = %reason, "document failed, removing partial chunks");
        match self.store.delete_by_checksums(std::slice::from_ref(&candidate.checksum)).await {
            Ok(report) if report.failed == 0 => {
                if report.deleted > 0 {
                    warn!(file = %candidate.name, removed = report.deleted, "removed partial chunks");
                }
            }
            Ok(report) => {
                let _ = write!(reason, "; cleanup left {} chunks behind", report.failed);
            }
            Err(e) => {
                error!(file = %candidate.name, error = %e, "cleanup failed");
                let _ = write!(reason, "; cleanup failed: {e}");
            }
        }
    }
}
