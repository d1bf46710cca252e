//! Domain types shared by the loaders, the store adapters and the RAG pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Content hash of a whole source document (hex encoded).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Checksum(String);

impl Checksum {
    pub fn new(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Store identifier of a chunk. See [`crate::identity`] for how it is derived.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct ChunkId(String);

impl ChunkId {
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The atomic unit of retrieval.
///
/// - `title`: source filename, also used as the document identifier
/// - `document_checksum`: dedup key shared by every chunk of one document
/// - `is_figure`: tables/images as opposed to prose
/// - `page_number`: page (or offset for loaders without pages)
/// - `ordinal`: position among the chunks of the same document
/// - `embedding_model`/`loader`/`chunking_strategy`: pipeline provenance,
///   all three take part in the chunk identity
/// - `embedding`: only present between the embedding step and persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Chunk {
    pub title: String,
    pub document_checksum: Checksum,
    pub is_figure: bool,
    pub page_number: u32,
    pub ordinal: u32,
    pub text: String,
    pub embedding_model: String,
    pub loader: String,
    pub chunking_strategy: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Chunk {
    pub fn id(&self) -> ChunkId {
        crate::identity::chunk_id(
            &self.document_checksum,
            &self.embedding_model,
            self.page_number,
            self.ordinal,
            &self.loader,
            &self.chunking_strategy,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    Prose,
    Figure,
}

/// One ordered piece of loader output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub kind: SegmentKind,
    pub text: String,
    pub page: u32,
}

impl Segment {
    pub fn prose(page: u32, text: impl Into<String>) -> Self {
        Self { kind: SegmentKind::Prose, text: text.into(), page }
    }

    pub fn figure(page: u32, text: impl Into<String>) -> Self {
        Self { kind: SegmentKind::Figure, text: text.into(), page }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadedDocument {
    pub segments: Vec<Segment>,
}

/// A chunk returned by a similarity search. `chunk.embedding` is never set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub id: ChunkId,
    pub score: f32,
    pub chunk: Chunk,
}

/// A persisted chunk as listed by `ChunkStore::sample`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredChunk {
    pub id: ChunkId,
    pub chunk: Chunk,
}

/// Attributes a similarity search can return. Unrequested attributes are
/// left at their default value in the returned [`Chunk`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkField {
    Title,
    DocumentChecksum,
    IsFigure,
    PageNumber,
    Ordinal,
    Text,
    EmbeddingModel,
    Loader,
    ChunkingStrategy,
}

impl ChunkField {
    pub const ALL: [ChunkField; 9] = [
        ChunkField::Title,
        ChunkField::DocumentChecksum,
        ChunkField::IsFigure,
        ChunkField::PageNumber,
        ChunkField::Ordinal,
        ChunkField::Text,
        ChunkField::EmbeddingModel,
        ChunkField::Loader,
        ChunkField::ChunkingStrategy,
    ];

    pub fn column(self) -> &'static str {
        match self {
            ChunkField::Title => "title",
            ChunkField::DocumentChecksum => "document_checksum",
            ChunkField::IsFigure => "is_figure",
            ChunkField::PageNumber => "page_number",
            ChunkField::Ordinal => "ordinal",
            ChunkField::Text => "text",
            ChunkField::EmbeddingModel => "embedding_model",
            ChunkField::Loader => "loader",
            ChunkField::ChunkingStrategy => "chunking_strategy",
        }
    }
}

/// Predicates usable by similarity searches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Filter {
    Title(String),
    Checksum(Checksum),
    Figures(bool),
}

impl Filter {
    pub fn matches(&self, chunk: &Chunk) -> bool {
        match self {
            Filter::Title(title) => &chunk.title == title,
            Filter::Checksum(checksum) => &chunk.document_checksum == checksum,
            Filter::Figures(is_figure) => chunk.is_figure == *is_figure,
        }
    }
}

/// A boundary-level search request (the `search` shell command).
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub text: String,
    pub filters: Vec<Filter>,
    pub size: usize,
    pub offset: usize,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), filters: Vec::new(), size: 5, offset: 0 }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KnnRequest<'a> {
    pub vector: &'a [f32],
    pub k: usize,
    pub min_score: f32,
    pub filters: &'a [Filter],
    pub fields: &'a [ChunkField],
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpsertReport {
    pub written: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

impl UpsertReport {
    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteReport {
    pub deleted: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub chunk_count: usize,
    pub document_count: usize,
    pub size_bytes: u64,
}
