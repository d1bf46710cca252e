//! Chunk store adapters: LanceDB on disk and a process-local memory store.

use std::sync::Arc;

use paperdb_core::config::{Settings, StoreBackend};
use paperdb_core::traits::ChunkStore;
use paperdb_core::types::Chunk;
use paperdb_core::{Error, Result};

mod lance;
mod memory;
mod records;
pub mod schema;

pub use lance::LanceChunkStore;
pub use memory::MemoryChunkStore;

/// Relevance score on the same `(0, 1]` scale as a cosine-similarity index.
pub fn distance_to_score(cosine_distance: f32) -> f32 {
    1.0 / (1.0 + cosine_distance.max(0.0))
}

pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return 1.0;
    }
    1.0 - dot / (na * nb)
}

/// A present embedding of the wrong width means the embedder and the index
/// disagree, which no retry can fix.
pub(crate) fn check_dimensions(chunks: &[Chunk], dim: usize) -> Result<()> {
    for chunk in chunks {
        if let Some(e) = &chunk.embedding {
            if e.len() != dim {
                return Err(Error::Config(format!(
                    "chunk {} has a {}-dimensional embedding, index expects {dim}",
                    chunk.id(),
                    e.len()
                )));
            }
        }
    }
    Ok(())
}

/// Open the configured store and make sure its schema exists.
pub async fn build_store(settings: &Settings) -> Result<Arc<dyn ChunkStore>> {
    let store: Arc<dyn ChunkStore> = match settings.store.backend {
        StoreBackend::Lancedb => Arc::new(
            LanceChunkStore::open(
                &settings.store.resolved_uri(),
                &settings.store.table,
                settings.store.vector_dim,
                settings.store.write_batch_size,
            )
            .await?,
        ),
        StoreBackend::Memory => Arc::new(MemoryChunkStore::new(settings.store.vector_dim)),
    };
    store.ensure_schema().await?;
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_scale() {
        assert!((distance_to_score(0.0) - 1.0).abs() < 1e-6);
        assert!((distance_to_score(1.0) - 0.5).abs() < 1e-6);
        assert!(distance_to_score(2.0) > 0.0);
        assert!(cosine_distance(&[1.0, 0.0], &[1.0, 0.0]).abs() < 1e-6);
        assert!((cosine_distance(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-6);
    }
}
