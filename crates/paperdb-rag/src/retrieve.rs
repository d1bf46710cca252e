//! Multi-query vector retrieval.

use std::sync::Arc;

use futures::future::try_join_all;
use tracing::{debug, info};

use paperdb_core::config::RetrievalSettings;
use paperdb_core::traits::{ChunkStore, Embedder};
use paperdb_core::types::{ChunkField, KnnRequest, RetrievedChunk, SearchQuery};
use paperdb_core::{Error, Result};

use crate::refine::QueryRefiner;

/// Attributes needed to cite a chunk and to show it in search results.
const RESULT_FIELDS: [ChunkField; 5] = [
    ChunkField::Title,
    ChunkField::DocumentChecksum,
    ChunkField::PageNumber,
    ChunkField::IsFigure,
    ChunkField::Text,
];

pub struct HybridRetriever {
    refiner: QueryRefiner,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn ChunkStore>,
    settings: RetrievalSettings,
}

impl HybridRetriever {
    pub fn new(
        refiner: QueryRefiner,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn ChunkStore>,
        settings: RetrievalSettings,
    ) -> Self {
        Self { refiner, embedder, store, settings }
    }

    /// Refine the question, search once per refined query and concatenate
    /// the hits in query order. An empty result is not an error.
    pub async fn retrieve(&self, question: &str) -> Result<Vec<RetrievedChunk>> {
        let queries = self.refiner.refine(question).await?;
        self.retrieve_for_queries(&queries).await
    }

    pub async fn retrieve_for_queries(&self, queries: &[String]) -> Result<Vec<RetrievedChunk>> {
        let per_query: Vec<Vec<RetrievedChunk>> = if self.settings.concurrent {
            try_join_all(queries.iter().map(|q| self.search_one(q))).await?
        } else {
            let mut out = Vec::with_capacity(queries.len());
            for q in queries {
                out.push(self.search_one(q).await?);
            }
            out
        };
        let mut merged: Vec<RetrievedChunk> = per_query.into_iter().flatten().collect();
        merged.truncate(self.settings.max_total_chunks);
        info!(queries = queries.len(), chunks = merged.len(), "retrieved context");
        Ok(merged)
    }

    async fn search_one(&self, query: &str) -> Result<Vec<RetrievedChunk>> {
        let vector = self.embedder.embed(query).await?;
        let mut hits = self
            .store
            .knn_search(&KnnRequest {
                vector: &vector,
                k: self.settings.candidate_k,
                min_score: self.settings.min_score,
                filters: &[],
                fields: &RESULT_FIELDS,
            })
            .await?;
        hits.truncate(self.settings.max_chunks_per_query);
        for hit in &hits {
            debug!(query, score = hit.score, title = %hit.chunk.title, page = hit.chunk.page_number, "hit");
        }
        Ok(hits)
    }

    /// Direct similarity search without refinement, with filters and paging.
    pub async fn search(&self, query: &SearchQuery) -> Result<Vec<RetrievedChunk>> {
        if query.text.trim().is_empty() {
            return Err(Error::Input("search text is empty".into()));
        }
        if query.size == 0 {
            return Ok(Vec::new());
        }
        let vector = self.embedder.embed(query.text.trim()).await?;
        let hits = self
            .store
            .knn_search(&KnnRequest {
                vector: &vector,
                k: query.offset.saturating_add(query.size),
                min_score: self.settings.min_score,
                filters: &query.filters,
                fields: &RESULT_FIELDS,
            })
            .await?;
        Ok(hits.into_iter().skip(query.offset).take(query.size).collect())
    }
}
