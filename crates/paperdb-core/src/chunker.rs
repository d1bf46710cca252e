//! Turns loader segments into chunks.
//!
//! Two strategies are available. `segment` keeps one chunk per loader
//! segment. `window` additionally splits long prose segments into
//! overlapping word windows so no chunk exceeds the token budget.

use serde::{Deserialize, Serialize};

use crate::types::{Checksum, Chunk, LoadedDocument, SegmentKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub strategy: ChunkingStrategy,
    pub max_tokens: usize,
    pub overlap_percent: f32,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { strategy: ChunkingStrategy::Segment, max_tokens: 500, overlap_percent: 0.2 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkingStrategy {
    Segment,
    Window,
}

impl ChunkingStrategy {
    pub fn name(self) -> &'static str {
        match self {
            ChunkingStrategy::Segment => "segment",
            ChunkingStrategy::Window => "window",
        }
    }
}

/// Provenance stamped on every chunk of one document.
#[derive(Debug, Clone)]
pub struct ChunkContext<'a> {
    pub title: &'a str,
    pub checksum: &'a Checksum,
    pub embedding_model: &'a str,
    pub loader: &'a str,
}

#[derive(Debug, Clone, Default)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    pub fn strategy(&self) -> ChunkingStrategy {
        self.config.strategy
    }

    pub fn build(&self, doc: &LoadedDocument, ctx: &ChunkContext<'_>) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut ordinal = 0u32;
        for segment in &doc.segments {
            let text = segment.text.trim();
            if text.is_empty() {
                continue;
            }
            let pieces = match (self.config.strategy, segment.kind) {
                (ChunkingStrategy::Window, SegmentKind::Prose)
                    if count_tokens(text) > self.config.max_tokens =>
                {
                    self.split_with_overlap(text)
                }
                _ => vec![text.to_string()],
            };
            for piece in pieces {
                chunks.push(Chunk {
                    title: ctx.title.to_string(),
                    document_checksum: ctx.checksum.clone(),
                    is_figure: segment.kind == SegmentKind::Figure,
                    page_number: segment.page,
                    ordinal,
                    text: piece,
                    embedding_model: ctx.embedding_model.to_string(),
                    loader: ctx.loader.to_string(),
                    chunking_strategy: self.config.strategy.name().to_string(),
                    embedding: None,
                });
                ordinal += 1;
            }
        }
        tracing::debug!(title = ctx.title, chunks = chunks.len(), "built chunks");
        chunks
    }

    fn split_with_overlap(&self, paragraph: &str) -> Vec<String> {
        let words: Vec<&str> = paragraph.split_whitespace().collect();
        // inverse of count_tokens: ~0.75 words per token
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
        let words_per_chunk = ((self.config.max_tokens as f32 * 0.75) as usize).max(1);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
        let overlap_words = ((words_per_chunk as f32 * self.config.overlap_percent.clamp(0.0, 0.9))
            as usize)
            .min(words_per_chunk - 1);
        let mut chunks = Vec::new();
        let mut start = 0;
        while start < words.len() {
            let end = (start + words_per_chunk).min(words.len());
            chunks.push(words[start..end].join(" "));
            if end >= words.len() {
                break;
            }
            start = end - overlap_words;
        }
        chunks
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn count_tokens(text: &str) -> usize {
    let word_count = text.split_whitespace().count();
    (word_count as f32 / 0.75) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Segment;

    fn ctx(checksum: &Checksum) -> ChunkContext<'_> {
        ChunkContext { title: "paper.pdf", checksum, embedding_model: "m", loader: "lopdf" }
    }

    #[test]
    fn segment_strategy_keeps_one_chunk_per_segment() {
        let checksum = Checksum::new("c1");
        let doc = LoadedDocument {
            segments: vec![
                Segment::prose(1, "Intro paragraph."),
                Segment::prose(1, "   "),
                Segment::figure(2, "Chart or figure found on page 2"),
            ],
        };
        let chunks = Chunker::default().build(&doc, &ctx(&checksum));
        assert_eq!(chunks.len(), 2, "blank segment is dropped");
        assert_eq!(chunks[0].ordinal, 0);
        assert_eq!(chunks[1].ordinal, 1);
        assert!(!chunks[0].is_figure);
        assert!(chunks[1].is_figure);
        assert_eq!(chunks[1].page_number, 2);
        assert!(chunks.iter().all(|c| c.chunking_strategy == "segment"));
    }

    #[test]
    fn window_strategy_splits_long_prose_with_overlap() {
        let checksum = Checksum::new("c1");
        let long: Vec<String> = (0..100).map(|i| format!("w{i}")).collect();
        let doc = LoadedDocument { segments: vec![Segment::prose(3, long.join(" "))] };
        let chunker = Chunker::new(ChunkingConfig {
            strategy: ChunkingStrategy::Window,
            max_tokens: 40,
            overlap_percent: 0.2,
        });
        let chunks = chunker.build(&doc, &ctx(&checksum));
        // 30 words per window, 6 words overlap
        assert!(chunks.len() >= 4);
        assert!(chunks[0].text.starts_with("w0 "));
        assert!(chunks[1].text.starts_with("w24 "));
        assert!(chunks.last().is_some_and(|c| c.text.ends_with("w99")));
        assert!(chunks.iter().all(|c| c.page_number == 3));
        let ordinals: Vec<u32> = chunks.iter().map(|c| c.ordinal).collect();
        assert_eq!(ordinals, (0..chunks.len() as u32).collect::<Vec<_>>());
    }

    #[test]
    fn window_strategy_never_splits_figures() {
        let checksum = Checksum::new("c1");
        let long: Vec<String> = (0..100).map(|i| format!("w{i}")).collect();
        let doc = LoadedDocument { segments: vec![Segment::figure(1, long.join(" "))] };
        let chunker = Chunker::new(ChunkingConfig {
            strategy: ChunkingStrategy::Window,
            max_tokens: 10,
            overlap_percent: 0.0,
        });
        assert_eq!(chunker.build(&doc, &ctx(&checksum)).len(), 1);
    }
}
