//! Startup wiring: every component is built once from `Settings`.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use paperdb_core::chunker::Chunker;
use paperdb_core::config::Settings;
use paperdb_core::traits::{ChunkStore, CompletionParams, Completer, DocumentLoader};
use paperdb_embed::build_embedder;
use paperdb_rag::{AnswerSynthesizer, HybridRetriever, IngestPipeline, OpenAiCompleter, QueryRefiner};
use paperdb_vector::build_store;

pub struct App {
    pub settings: Settings,
    pub loader: Arc<dyn DocumentLoader>,
    pub store: Arc<dyn ChunkStore>,
    pub pipeline: IngestPipeline,
    pub answers: AnswerSynthesizer,
}

impl App {
    pub async fn build(settings: Settings) -> Result<Self> {
        let loader = paperdb_loader::resolve(&settings.ingest.loader)?;

        // the local model loads synchronously
        let embedder = {
            let settings = settings.clone();
            tokio::task::spawn_blocking(move || build_embedder(&settings))
                .await
                .context("embedder loader panicked")??
        };
        let store = build_store(&settings)
            .await
            .with_context(|| format!("opening store at {}", settings.store.resolved_uri().display()))?;
        let completer = Arc::new(OpenAiCompleter::from_settings(&settings)?);
        info!(
            loader = loader.name(),
            embedder = embedder.model_id(),
            completion = completer.model(),
            dim = store.vector_dim(),
            "components ready"
        );

        let pipeline = IngestPipeline::new(
            loader.clone(),
            embedder.clone(),
            store.clone(),
            Chunker::new(settings.ingest.chunking.clone()),
        )
        .with_embed_batch_size(settings.embedding.batch_size)
        .with_concurrency(settings.ingest.concurrency);

        let refiner = QueryRefiner::new(completer.clone(), settings.retrieval.refine_fallback);
        let retriever = HybridRetriever::new(refiner, embedder, store.clone(), settings.retrieval.clone());
        let answers = AnswerSynthesizer::new(
            retriever,
            completer,
            CompletionParams {
                temperature: settings.completion.temperature,
                max_tokens: settings.completion.max_tokens,
            },
        );

        Ok(Self { settings, loader, store, pipeline, answers })
    }
}
