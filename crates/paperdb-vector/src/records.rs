//! Conversion between [`Chunk`]s and Arrow record batches.

use std::sync::Arc;

use arrow_array::types::Float32Type;
use arrow_array::{
    Array, BooleanArray, FixedSizeListArray, Float32Array, Int32Array, RecordBatch, StringArray,
};

use paperdb_core::types::{Checksum, Chunk, ChunkId};
use paperdb_core::{Error, Result};

use crate::schema::{chunk_schema, ID_COLUMN};

/// Build one batch from chunks that all carry an embedding of width `dim`.
pub fn chunks_to_batch(chunks: &[&Chunk], dim: usize) -> Result<RecordBatch> {
    let mut ids = Vec::with_capacity(chunks.len());
    let mut titles = Vec::with_capacity(chunks.len());
    let mut checksums = Vec::with_capacity(chunks.len());
    let mut figures = Vec::with_capacity(chunks.len());
    let mut pages = Vec::with_capacity(chunks.len());
    let mut ordinals = Vec::with_capacity(chunks.len());
    let mut texts = Vec::with_capacity(chunks.len());
    let mut models = Vec::with_capacity(chunks.len());
    let mut loaders = Vec::with_capacity(chunks.len());
    let mut strategies = Vec::with_capacity(chunks.len());
    let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        let embedding = chunk
            .embedding
            .as_ref()
            .ok_or_else(|| Error::store(format!("chunk {} has no embedding", chunk.id())))?;
        ids.push(chunk.id().to_string());
        titles.push(chunk.title.clone());
        checksums.push(chunk.document_checksum.to_string());
        figures.push(chunk.is_figure);
        pages.push(to_i32(chunk.page_number)?);
        ordinals.push(to_i32(chunk.ordinal)?);
        texts.push(chunk.text.clone());
        models.push(chunk.embedding_model.clone());
        loaders.push(chunk.loader.clone());
        strategies.push(chunk.chunking_strategy.clone());
        vectors.push(Some(embedding.iter().map(|&x| Some(x)).collect()));
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    let list_len = dim as i32;
    RecordBatch::try_new(
        chunk_schema(dim),
        vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(StringArray::from(titles)),
            Arc::new(StringArray::from(checksums)),
            Arc::new(BooleanArray::from(figures)),
            Arc::new(Int32Array::from(pages)),
            Arc::new(Int32Array::from(ordinals)),
            Arc::new(StringArray::from(texts)),
            Arc::new(StringArray::from(models)),
            Arc::new(StringArray::from(loaders)),
            Arc::new(StringArray::from(strategies)),
            Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(
                vectors.into_iter(),
                list_len,
            )),
        ],
    )
    .map_err(Error::store)
}

fn to_i32(v: u32) -> Result<i32> {
    i32::try_from(v).map_err(|_| Error::store(format!("value {v} does not fit the index schema")))
}

/// One decoded row: id, chunk (projected columns only) and the raw
/// `_distance` if the batch came from a vector search.
pub struct Row {
    pub id: ChunkId,
    pub chunk: Chunk,
    pub distance: Option<f32>,
}

fn strings<'a>(batch: &'a RecordBatch, name: &str) -> Option<&'a StringArray> {
    batch.column_by_name(name).and_then(|c| c.as_any().downcast_ref::<StringArray>())
}

fn ints<'a>(batch: &'a RecordBatch, name: &str) -> Option<&'a Int32Array> {
    batch.column_by_name(name).and_then(|c| c.as_any().downcast_ref::<Int32Array>())
}

fn text_at(col: Option<&StringArray>, i: usize) -> String {
    col.filter(|c| !c.is_null(i)).map(|c| c.value(i).to_string()).unwrap_or_default()
}

fn u32_at(col: Option<&Int32Array>, i: usize) -> u32 {
    col.filter(|c| !c.is_null(i)).and_then(|c| u32::try_from(c.value(i)).ok()).unwrap_or_default()
}

/// Decode rows; columns absent from the batch keep their default value.
pub fn batch_to_rows(batch: &RecordBatch) -> Result<Vec<Row>> {
    let ids = strings(batch, ID_COLUMN)
        .ok_or_else(|| Error::store("result batch has no id column"))?;
    let titles = strings(batch, "title");
    let checksums = strings(batch, "document_checksum");
    let figures = batch
        .column_by_name("is_figure")
        .and_then(|c| c.as_any().downcast_ref::<BooleanArray>());
    let pages = ints(batch, "page_number");
    let ordinals = ints(batch, "ordinal");
    let texts = strings(batch, "text");
    let models = strings(batch, "embedding_model");
    let loaders = strings(batch, "loader");
    let strategies = strings(batch, "chunking_strategy");
    let distances = batch
        .column_by_name("_distance")
        .and_then(|c| c.as_any().downcast_ref::<Float32Array>());

    let mut rows = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        let chunk = Chunk {
            title: text_at(titles, i),
            document_checksum: Checksum::new(text_at(checksums, i)),
            is_figure: figures.is_some_and(|c| !c.is_null(i) && c.value(i)),
            page_number: u32_at(pages, i),
            ordinal: u32_at(ordinals, i),
            text: text_at(texts, i),
            embedding_model: text_at(models, i),
            loader: text_at(loaders, i),
            chunking_strategy: text_at(strategies, i),
            embedding: None,
        };
        rows.push(Row {
            id: ChunkId::from_raw(ids.value(i)),
            chunk,
            distance: distances.map(|d| d.value(i)),
        });
    }
    Ok(rows)
}
