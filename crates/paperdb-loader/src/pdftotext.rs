use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use paperdb_core::traits::DocumentLoader;
use paperdb_core::types::{LoadedDocument, Segment};
use paperdb_core::{Error, Result};

use crate::text::{paragraphs, split_pages};

/// Loader backed by poppler's `pdftotext` binary.
#[derive(Debug, Clone)]
pub struct PdftotextLoader {
    binary: String,
}

impl Default for PdftotextLoader {
    fn default() -> Self {
        Self { binary: "pdftotext".into() }
    }
}

impl PdftotextLoader {
    pub const NAME: &'static str = "pdftotext";

    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self { binary: binary.into() }
    }
}

/// Turn the form-feed separated output into per-page paragraph segments.
pub fn segments_from_output(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    for (idx, page) in split_pages(text).into_iter().enumerate() {
        #[allow(clippy::cast_possible_truncation)]
        let page_num = idx as u32 + 1;
        segments.extend(paragraphs(page).into_iter().map(|p| Segment::prose(page_num, p)));
    }
    segments
}

#[async_trait]
impl DocumentLoader for PdftotextLoader {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn extensions(&self) -> &[&str] {
        &["pdf"]
    }

    async fn load(&self, path: &Path) -> Result<LoadedDocument> {
        let output = Command::new(&self.binary)
            .arg("-layout")
            .arg("-enc")
            .arg("UTF-8")
            .arg(path)
            .arg("-")
            .output()
            .await
            .map_err(|e| Error::load(path, format!("{} failed to start: {e} (is poppler installed?)", self.binary)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::load(path, format!("{} failed: {}", self.binary, stderr.trim())));
        }
        let text = String::from_utf8_lossy(&output.stdout);
        debug!(path = %path.display(), chars = text.chars().count(), "pdftotext output");
        Ok(LoadedDocument { segments: segments_from_output(&text) })
    }
}
