//! Document checksums and deterministic chunk identifiers.

use std::fs::File;
use std::io;
use std::path::Path;

use crate::types::{Checksum, ChunkId};

/// Field separator used when hashing identity tuples. It cannot appear in
/// any checksum and is stripped from free-form components beforehand.
const SEP: u8 = 0x1f;

/// BLAKE3 digest of a whole document, used for dedup only.
pub fn compute_checksum(bytes: &[u8]) -> Checksum {
    Checksum::new(blake3::hash(bytes).to_hex().to_string())
}

/// Streaming variant of [`compute_checksum`]; equal content gives an equal
/// checksum regardless of the filename.
pub fn checksum_file(path: &Path) -> io::Result<Checksum> {
    let mut file = File::open(path)?;
    let mut hasher = blake3::Hasher::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(Checksum::new(hasher.finalize().to_hex().to_string()))
}

/// Derive the store identifier of a chunk from its pipeline coordinates.
///
/// Equal inputs always give the same id, so re-ingesting an unchanged
/// document overwrites its previous chunks. Changing any component (another
/// embedding model, loader or chunking strategy) gives a disjoint id space.
pub fn chunk_id(
    checksum: &Checksum,
    embedding_model: &str,
    page_number: u32,
    ordinal: u32,
    loader: &str,
    chunking_strategy: &str,
) -> ChunkId {
    let mut hasher = blake3::Hasher::new();
    let page = page_number.to_string();
    let ordinal = ordinal.to_string();
    let parts: [&str; 6] =
        [checksum.as_str(), embedding_model, &page, &ordinal, loader, chunking_strategy];
    for part in parts {
        let clean: Vec<u8> = part.bytes().filter(|b| *b != SEP).collect();
        hasher.update(&clean);
        hasher.update(&[SEP]);
    }
    ChunkId::from_raw(hasher.finalize().to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(model: &str, page: u32, ordinal: u32, loader: &str) -> ChunkId {
        chunk_id(&Checksum::new("abc"), model, page, ordinal, loader, "segment")
    }

    #[test]
    fn same_tuple_same_id() {
        assert_eq!(id("m", 1, 0, "lopdf"), id("m", 1, 0, "lopdf"));
    }

    #[test]
    fn any_component_changes_id() {
        let base = id("m", 1, 0, "lopdf");
        assert_ne!(base, id("m2", 1, 0, "lopdf"));
        assert_ne!(base, id("m", 2, 0, "lopdf"));
        assert_ne!(base, id("m", 1, 1, "lopdf"));
        assert_ne!(base, id("m", 1, 0, "pdftotext"));
        assert_ne!(base, chunk_id(&Checksum::new("abc"), "m", 1, 0, "lopdf", "window"));
    }

    #[test]
    fn concatenation_does_not_collide() {
        // "m1" + page 2 must differ from "m" + page 12
        assert_ne!(id("m1", 2, 0, "x"), id("m", 12, 0, "x"));
    }

    #[test]
    fn checksum_ignores_filename() {
        let dir = tempfile::tempdir().expect("tmp");
        let a = dir.path().join("a.pdf");
        let b = dir.path().join("renamed.pdf");
        std::fs::write(&a, b"same bytes").expect("write");
        std::fs::write(&b, b"same bytes").expect("write");
        let ca = checksum_file(&a).expect("hash a");
        assert_eq!(ca, checksum_file(&b).expect("hash b"));
        assert_eq!(ca, compute_checksum(b"same bytes"));
        assert_ne!(ca, compute_checksum(b"other bytes"));
    }
}
