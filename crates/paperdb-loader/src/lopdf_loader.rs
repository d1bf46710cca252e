use std::path::{Path, PathBuf};

use async_trait::async_trait;
use lopdf::Document;
use tracing::{debug, warn};

use paperdb_core::traits::DocumentLoader;
use paperdb_core::types::{LoadedDocument, Segment};
use paperdb_core::{Error, Result};

use crate::text::paragraphs;

/// Pure-Rust PDF loader.
///
/// Each page yields its paragraphs as prose segments followed by one figure
/// segment per embedded image.
#[derive(Debug, Clone, Default)]
pub struct LopdfLoader;

impl LopdfLoader {
    pub const NAME: &'static str = "lopdf";

    fn load_sync(path: &Path) -> Result<LoadedDocument> {
        let doc = Document::load(path).map_err(|e| Error::load(path, e))?;
        let mut segments = Vec::new();
        for (page_num, page_id) in doc.get_pages() {
            match doc.extract_text(&[page_num]) {
                Ok(text) => {
                    segments.extend(paragraphs(&text).into_iter().map(|p| Segment::prose(page_num, p)));
                }
                Err(e) => {
                    debug!(page = page_num, error = %e, "lopdf: no text on page");
                }
            }
            let images = match doc.get_page_images(page_id) {
                Ok(images) => images.len(),
                Err(e) => {
                    debug!(page = page_num, error = %e, "lopdf: could not list page images");
                    0
                }
            };
            for _ in 0..images {
                segments.push(Segment::figure(page_num, format!("Chart or figure found on page {page_num}")));
            }
        }
        if segments.is_empty() {
            warn!(path = %path.display(), "lopdf extracted nothing");
        }
        Ok(LoadedDocument { segments })
    }
}

#[async_trait]
impl DocumentLoader for LopdfLoader {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn extensions(&self) -> &[&str] {
        &["pdf"]
    }

    async fn load(&self, path: &Path) -> Result<LoadedDocument> {
        let owned: PathBuf = path.to_path_buf();
        tokio::task::spawn_blocking(move || Self::load_sync(&owned))
            .await
            .map_err(|e| Error::load(path, e))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::write_text_pdf;
    use paperdb_core::types::SegmentKind;

    #[tokio::test]
    async fn reads_each_page() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("two-pages.pdf");
        write_text_pdf(&path, &["Solar panels convert light", "Batteries store the charge"]).unwrap();

        let doc = LopdfLoader.load(&path).await.expect("load");
        let pages: Vec<u32> = doc.segments.iter().map(|s| s.page).collect();
        assert!(pages.contains(&1) && pages.contains(&2), "pages: {pages:?}");
        assert!(doc.segments.iter().all(|s| s.kind == SegmentKind::Prose));
        let page_one: String = doc.segments.iter().filter(|s| s.page == 1).map(|s| s.text.as_str()).collect();
        assert!(page_one.contains("Solar"), "page one text: {page_one}");
    }
}
