//! Document loaders and the named-loader registry.

use std::sync::Arc;

use paperdb_core::traits::DocumentLoader;
use paperdb_core::{Error, Result};

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;
mod lopdf_loader;
mod pdftotext;
pub mod text;

pub use lopdf_loader::LopdfLoader;
pub use pdftotext::{segments_from_output, PdftotextLoader};

/// Names accepted by [`resolve`].
pub const AVAILABLE: &[&str] = &[LopdfLoader::NAME, PdftotextLoader::NAME];

/// Look up a loader by its configured name.
pub fn resolve(name: &str) -> Result<Arc<dyn DocumentLoader>> {
    match name.trim().to_ascii_lowercase().as_str() {
        LopdfLoader::NAME => Ok(Arc::new(LopdfLoader)),
        PdftotextLoader::NAME => Ok(Arc::new(PdftotextLoader::default())),
        other => Err(Error::Config(format!(
            "unknown loader '{other}', expected one of: {}",
            AVAILABLE.join(", ")
        ))),
    }
}
