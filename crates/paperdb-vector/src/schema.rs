use std::sync::Arc;

use arrow_schema::{DataType, Field, Schema};

pub const VECTOR_COLUMN: &str = "vector";
pub const ID_COLUMN: &str = "id";

pub fn chunk_schema(dim: usize) -> Arc<Schema> {
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    let list_len = dim as i32;
    Arc::new(Schema::new(vec![
        Field::new(ID_COLUMN, DataType::Utf8, false),
        Field::new("title", DataType::Utf8, false),
        Field::new("document_checksum", DataType::Utf8, false),
        Field::new("is_figure", DataType::Boolean, false),
        Field::new("page_number", DataType::Int32, false),
        Field::new("ordinal", DataType::Int32, false),
        Field::new("text", DataType::Utf8, false),
        Field::new("embedding_model", DataType::Utf8, false),
        Field::new("loader", DataType::Utf8, false),
        Field::new("chunking_strategy", DataType::Utf8, false),
        Field::new(
            VECTOR_COLUMN,
            DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), list_len),
            true,
        ),
    ]))
}

/// Vector width of an existing table schema, if it has a vector column.
pub fn vector_dim_of(schema: &Schema) -> Option<usize> {
    match schema.field_with_name(VECTOR_COLUMN).ok()?.data_type() {
        DataType::FixedSizeList(_, len) => usize::try_from(*len).ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_dim_round_trips_through_schema() {
        assert_eq!(vector_dim_of(&chunk_schema(384)), Some(384));
        let bare = Schema::new(vec![Field::new("id", DataType::Utf8, false)]);
        assert_eq!(vector_dim_of(&bare), None);
    }
}
