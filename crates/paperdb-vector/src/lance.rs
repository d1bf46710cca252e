//! LanceDB-backed [`ChunkStore`].

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use arrow_array::{RecordBatch, RecordBatchIterator};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::{connect, Connection, DistanceType, Table};
use tracing::{debug, info, warn};

use paperdb_core::traits::ChunkStore;
use paperdb_core::types::{
    Checksum, Chunk, ChunkField, DeleteReport, Filter, IndexStats, KnnRequest, RetrievedChunk,
    StoredChunk, UpsertReport,
};
use paperdb_core::{Error, Result};

use crate::records::{batch_to_rows, chunks_to_batch, Row};
use crate::schema::{chunk_schema, vector_dim_of, ID_COLUMN, VECTOR_COLUMN};
use crate::{check_dimensions, distance_to_score};

fn lance_err(e: lancedb::Error) -> Error {
    Error::store(e)
}

/// Quote a value for a Lance SQL predicate.
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn in_list<'a>(column: &str, values: impl Iterator<Item = &'a str>) -> String {
    let list: Vec<String> = values.map(quote).collect();
    format!("{column} IN ({})", list.join(", "))
}

fn filter_predicate(filters: &[Filter]) -> Option<String> {
    let clauses: Vec<String> = filters
        .iter()
        .map(|f| match f {
            Filter::Title(title) => format!("title = {}", quote(title)),
            Filter::Checksum(checksum) => format!("document_checksum = {}", quote(checksum.as_str())),
            Filter::Figures(is_figure) => format!("is_figure = {is_figure}"),
        })
        .collect();
    if clauses.is_empty() {
        None
    } else {
        Some(clauses.join(" AND "))
    }
}

fn non_vector_columns() -> Vec<&'static str> {
    let mut cols = vec![ID_COLUMN];
    cols.extend(ChunkField::ALL.iter().map(|f| f.column()));
    cols
}

pub struct LanceChunkStore {
    db: Connection,
    uri: PathBuf,
    table_name: String,
    dim: usize,
    batch_size: usize,
}

impl LanceChunkStore {
    pub async fn open(uri: &Path, table_name: &str, dim: usize, batch_size: usize) -> Result<Self> {
        if let Some(parent) = uri.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let db = connect(uri.to_string_lossy().as_ref()).execute().await.map_err(lance_err)?;
        Ok(Self {
            db,
            uri: uri.to_path_buf(),
            table_name: table_name.to_string(),
            dim,
            batch_size: batch_size.max(1),
        })
    }

    async fn table_exists(&self) -> Result<bool> {
        let names = self.db.table_names().execute().await.map_err(lance_err)?;
        Ok(names.contains(&self.table_name))
    }

    /// `None` until `ensure_schema` created the table.
    async fn table(&self) -> Result<Option<Table>> {
        if !self.table_exists().await? {
            return Ok(None);
        }
        let table = self.db.open_table(&self.table_name).execute().await.map_err(lance_err)?;
        Ok(Some(table))
    }

    async fn require_table(&self) -> Result<Table> {
        self.table().await?.ok_or_else(|| {
            Error::store(format!("table '{}' does not exist yet", self.table_name))
        })
    }

    async fn write_batch(&self, table: &Table, chunks: &[&Chunk]) -> Result<()> {
        let batch = chunks_to_batch(chunks, self.dim)?;
        let schema = batch.schema();
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
        let mut merge = table.merge_insert(&[ID_COLUMN]);
        merge.when_matched_update_all(None).when_not_matched_insert_all();
        merge.execute(reader).await.map_err(lance_err)?;
        Ok(())
    }

    async fn delete_where(&self, predicate: &str) -> Result<DeleteReport> {
        let Some(table) = self.table().await? else {
            return Ok(DeleteReport::default());
        };
        let matching = table.count_rows(Some(predicate.to_string())).await.map_err(lance_err)?;
        if matching == 0 {
            return Ok(DeleteReport::default());
        }
        match table.delete(predicate).await {
            Ok(_) => {
                info!(deleted = matching, predicate, "deleted chunks");
                Ok(DeleteReport { deleted: matching, failed: 0 })
            }
            Err(e) => {
                warn!(error = %e, predicate, "delete failed");
                Ok(DeleteReport { deleted: 0, failed: matching })
            }
        }
    }
}

fn rows_of(batches: &[RecordBatch]) -> Result<Vec<Row>> {
    let mut rows = Vec::new();
    for batch in batches {
        rows.extend(batch_to_rows(batch)?);
    }
    Ok(rows)
}

#[async_trait]
impl ChunkStore for LanceChunkStore {
    fn vector_dim(&self) -> usize {
        self.dim
    }

    async fn ensure_schema(&self) -> Result<()> {
        if let Some(table) = self.table().await? {
            let schema = table.schema().await.map_err(lance_err)?;
            return match vector_dim_of(&schema) {
                Some(existing) if existing == self.dim => Ok(()),
                Some(existing) => Err(Error::Config(format!(
                    "table '{}' stores {existing}-dimensional vectors but {} are configured",
                    self.table_name, self.dim
                ))),
                None => Err(Error::Config(format!(
                    "table '{}' has no '{VECTOR_COLUMN}' column",
                    self.table_name
                ))),
            };
        }
        self.db
            .create_empty_table(&self.table_name, chunk_schema(self.dim))
            .execute()
            .await
            .map_err(lance_err)?;
        info!(table = %self.table_name, dim = self.dim, "created chunk table");
        Ok(())
    }

    async fn existing_checksums(&self, candidates: &[Checksum]) -> Result<HashSet<Checksum>> {
        if candidates.is_empty() {
            return Ok(HashSet::new());
        }
        let Some(table) = self.table().await? else {
            return Ok(HashSet::new());
        };
        let predicate = in_list("document_checksum", candidates.iter().map(Checksum::as_str));
        let batches: Vec<RecordBatch> = table
            .query()
            .only_if(predicate)
            .select(Select::columns(&[ID_COLUMN, "document_checksum"]))
            .execute()
            .await
            .map_err(lance_err)?
            .try_collect()
            .await
            .map_err(lance_err)?;
        let wanted: HashSet<&Checksum> = candidates.iter().collect();
        Ok(rows_of(&batches)?
            .into_iter()
            .map(|row| row.chunk.document_checksum)
            .filter(|c| wanted.contains(c))
            .collect())
    }

    async fn upsert(&self, chunks: &[Chunk]) -> Result<UpsertReport> {
        check_dimensions(chunks, self.dim)?;
        let mut report = UpsertReport::default();
        let mut ready: Vec<&Chunk> = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            if chunk.embedding.is_some() {
                ready.push(chunk);
            } else {
                report.failed += 1;
                report.errors.push(format!("chunk {} has no embedding", chunk.id()));
            }
        }
        if ready.is_empty() {
            return Ok(report);
        }
        let table = self.require_table().await?;
        let mut batches_ok = 0usize;
        let mut batches = 0usize;
        for batch in ready.chunks(self.batch_size) {
            batches += 1;
            match self.write_batch(&table, batch).await {
                Ok(()) => {
                    batches_ok += 1;
                    report.written += batch.len();
                }
                Err(e) => {
                    warn!(error = %e, size = batch.len(), "chunk batch failed");
                    report.failed += batch.len();
                    report.errors.push(e.to_string());
                }
            }
        }
        if batches_ok == 0 {
            return Err(Error::store(format!(
                "all {batches} write batches failed: {}",
                report.errors.last().map_or("", String::as_str)
            )));
        }
        debug!(written = report.written, failed = report.failed, "upsert finished");
        Ok(report)
    }

    async fn delete_by_document_ids(&self, ids: &[String]) -> Result<DeleteReport> {
        if ids.is_empty() {
            return Ok(DeleteReport::default());
        }
        self.delete_where(&in_list("title", ids.iter().map(String::as_str))).await
    }

    async fn delete_by_checksums(&self, checksums: &[Checksum]) -> Result<DeleteReport> {
        if checksums.is_empty() {
            return Ok(DeleteReport::default());
        }
        self.delete_where(&in_list("document_checksum", checksums.iter().map(Checksum::as_str)))
            .await
    }

    async fn delete_all(&self) -> Result<DeleteReport> {
        self.delete_where("true").await
    }

    async fn knn_search(&self, request: &KnnRequest<'_>) -> Result<Vec<RetrievedChunk>> {
        if request.vector.len() != self.dim {
            return Err(Error::Config(format!(
                "query vector has {} dimensions, index expects {}",
                request.vector.len(),
                self.dim
            )));
        }
        let Some(table) = self.table().await? else {
            return Ok(Vec::new());
        };
        // keep the limit within the row count
        let rows = table.count_rows(None).await.map_err(lance_err)?;
        if rows == 0 || request.k == 0 {
            return Ok(Vec::new());
        }
        let mut columns = vec![ID_COLUMN];
        columns.extend(request.fields.iter().map(|f| f.column()));
        let mut query = table
            .vector_search(request.vector.to_vec())
            .map_err(lance_err)?
            .column(VECTOR_COLUMN)
            .distance_type(DistanceType::Cosine)
            .limit(request.k.min(rows))
            .select(Select::columns(&columns));
        if let Some(predicate) = filter_predicate(request.filters) {
            query = query.only_if(predicate);
        }
        let batches: Vec<RecordBatch> = query
            .execute()
            .await
            .map_err(lance_err)?
            .try_collect()
            .await
            .map_err(lance_err)?;

        let mut hits: Vec<RetrievedChunk> = rows_of(&batches)?
            .into_iter()
            .filter_map(|row| {
                let score = distance_to_score(row.distance?);
                (score >= request.min_score).then_some(RetrievedChunk { id: row.id, score, chunk: row.chunk })
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        for hit in &hits {
            debug!(id = %hit.id, score = hit.score, "knn hit");
        }
        Ok(hits)
    }

    async fn stats(&self) -> Result<IndexStats> {
        let size_bytes = dir_size(&self.uri);
        let Some(table) = self.table().await? else {
            return Ok(IndexStats { size_bytes, ..IndexStats::default() });
        };
        let chunk_count = table.count_rows(None).await.map_err(lance_err)?;
        let batches: Vec<RecordBatch> = table
            .query()
            .select(Select::columns(&[ID_COLUMN, "document_checksum"]))
            .execute()
            .await
            .map_err(lance_err)?
            .try_collect()
            .await
            .map_err(lance_err)?;
        let documents: HashSet<Checksum> = rows_of(&batches)?
            .into_iter()
            .map(|r| r.chunk.document_checksum)
            .collect();
        Ok(IndexStats { chunk_count, document_count: documents.len(), size_bytes })
    }

    async fn sample(&self, n: usize) -> Result<Vec<StoredChunk>> {
        let Some(table) = self.table().await? else {
            return Ok(Vec::new());
        };
        if n == 0 {
            return Ok(Vec::new());
        }
        let batches: Vec<RecordBatch> = table
            .query()
            .select(Select::columns(&non_vector_columns()))
            .limit(n)
            .execute()
            .await
            .map_err(lance_err)?
            .try_collect()
            .await
            .map_err(lance_err)?;
        Ok(rows_of(&batches)?
            .into_iter()
            .take(n)
            .map(|r| StoredChunk { id: r.id, chunk: r.chunk })
            .collect())
    }
}

fn dir_size(root: &Path) -> u64 {
    walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicates_quote_values() {
        assert_eq!(in_list("title", ["a.pdf", "o'brien.pdf"].into_iter()), "title IN ('a.pdf', 'o''brien.pdf')");
        assert_eq!(filter_predicate(&[]), None);
        assert_eq!(
            filter_predicate(&[Filter::Title("x.pdf".into()), Filter::Figures(false)]).as_deref(),
            Some("title = 'x.pdf' AND is_figure = false")
        );
    }
}
