//! Embedding adapters behind [`paperdb_core::traits::Embedder`].

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use paperdb_core::config::{expand_path, EmbeddingProvider, Settings};
use paperdb_core::traits::Embedder;
use paperdb_core::{Error, Result};

mod device;
pub mod hashing;
pub mod local;
pub mod openai;
mod pool;
mod tokenize;

pub use hashing::HashingEmbedder;
pub use local::LocalEmbedder;
pub use openai::OpenAiEmbedder;
pub use pool::masked_mean_l2;

/// Build the configured embedder. Loading the local model blocks, so call
/// this once at startup.
///
/// The embedder's output size must equal `store.vector_dim`.
pub fn build_embedder(settings: &Settings) -> Result<Arc<dyn Embedder>> {
    let dim = settings.store.vector_dim;
    let embedder: Arc<dyn Embedder> = match settings.embedding.provider {
        EmbeddingProvider::Openai => Arc::new(OpenAiEmbedder::new(
            settings.openai.api_key.as_deref(),
            &settings.openai.base_url,
            &settings.embedding.model,
            dim,
            Duration::from_secs(settings.openai.timeout_secs),
            settings.embedding.batch_size,
        )?),
        EmbeddingProvider::Local => {
            let configured: Option<PathBuf> = settings.embedding.model_dir.as_deref().map(expand_path);
            let dir = local::resolve_model_dir(configured.as_deref())?;
            Arc::new(LocalEmbedder::load(&dir, settings.embedding.max_len)?)
        }
        EmbeddingProvider::Hashing => Arc::new(HashingEmbedder::new(dim)),
    };
    if embedder.dim() != dim {
        return Err(Error::Config(format!(
            "embedder {} produces {} dimensions but store.vector_dim is {dim}",
            embedder.model_id(),
            embedder.dim()
        )));
    }
    tracing::info!(model = embedder.model_id(), dim, "embedder ready");
    Ok(embedder)
}
