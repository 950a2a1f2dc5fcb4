use anyhow::{Context, Result};
use gpu_columnar::bitmask;
use gpu_columnar::{Column, HostColumn, Table};
use gpu_memory_manager::{MemoryResourceRef, Stream};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::fs::File;
use std::path::Path;
use tracing::info;

use crate::record_batch_convert::array_to_host;
use crate::schema_utils::gpu_type_for;

/// Read a whole Parquet file into one device table.
///
/// Record batches are stitched on the host and uploaded once, so the
/// result has a single buffer per column no matter how the file was
/// split into row groups.
pub fn load_parquet_table(path: impl AsRef<Path>, stream: &Stream, mr: &MemoryResourceRef) -> Result<Table> {
    let path = path.as_ref();
    info!("Loading table from {}", path.display());

    let file = File::open(path).with_context(|| format!("Failed to open file: {}", path.display()))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file).context("Failed to create Parquet reader")?;

    let schema = builder.schema().clone();
    let row_count = builder.metadata().file_metadata().num_rows();
    info!("  Schema: {:?}", schema);
    info!("  Rows: {}", row_count);

    let mut hosts = schema
        .fields()
        .iter()
        .map(|field| {
            let dtype = gpu_type_for(field.data_type())
                .with_context(|| format!("Column '{}'", field.name()))?;
            HostColumn::from_bytes(dtype, Vec::new(), 0, field.is_nullable().then(Vec::new))
                .map_err(anyhow::Error::from)
        })
        .collect::<Result<Vec<_>>>()?;

    let reader = builder.build().context("Failed to build Parquet reader")?;
    for batch in reader {
        let batch = batch.context("Failed to read record batch")?;
        for ((host, field), array) in hosts.iter_mut().zip(schema.fields()).zip(batch.columns()) {
            let part = array_to_host(field, array.as_ref())
                .with_context(|| format!("Converting column '{}'", field.name()))?;
            append(host, part);
        }
    }

    let columns = hosts
        .iter()
        .map(|host| Column::from_host(host, stream, mr))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Table::new(columns)?)
}

fn append(dst: &mut HostColumn, src: HostColumn) {
    if let Some(mask) = dst.validity.as_mut() {
        for row in 0..src.n_rows {
            let out_row = dst.n_rows + row;
            if out_row % 8 == 0 {
                mask.push(0);
            }
            if src.is_valid(row) {
                bitmask::set_bit(mask, out_row, true);
            }
        }
    }
    dst.data.extend_from_slice(&src.data);
    dst.n_rows += src.n_rows;
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow_array::{Int32Array, RecordBatch, UInt8Array};
    use arrow_schema::{DataType, Field, Schema};
    use gpu_columnar::Value;
    use gpu_memory_manager::HostMemoryResource;
    use parquet::arrow::ArrowWriter;
    use parquet::file::properties::WriterProperties;
    use std::sync::Arc;

    #[test]
    fn test_load_spans_row_groups() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int32, false),
            Field::new("score", DataType::UInt8, true),
        ]));
        let file = tempfile::NamedTempFile::new().unwrap();

        let props = WriterProperties::builder().set_max_row_group_size(5).build();
        let mut writer = ArrowWriter::try_new(file.reopen().unwrap(), schema.clone(), Some(props)).unwrap();
        let ids: Vec<i32> = (0..12).collect();
        let scores: Vec<Option<u8>> = (0..12u8).map(|v| (v % 3 != 0).then_some(v)).collect();
        let batch = RecordBatch::try_new(
            schema,
            vec![Arc::new(Int32Array::from(ids.clone())), Arc::new(UInt8Array::from(scores.clone()))],
        )
        .unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let stream = Stream::new().unwrap();
        let mr: MemoryResourceRef = Arc::new(HostMemoryResource::new());
        let table = load_parquet_table(file.path(), &stream, &mr).unwrap();

        assert_eq!(table.num_rows(), 12);
        let host = table.to_host().unwrap();
        assert_eq!(host.column(0).unwrap().values::<i32>().unwrap(), ids);
        assert_eq!(host.column(1).unwrap().options::<u8>().unwrap(), scores);
        assert_eq!(host.row(3), vec![Value::Int(3), Value::Null]);
    }

    #[test]
    fn test_missing_file() {
        let stream = Stream::new().unwrap();
        let mr: MemoryResourceRef = Arc::new(HostMemoryResource::new());
        let err = load_parquet_table("/nonexistent/table.parquet", &stream, &mr).unwrap_err();
        assert!(err.to_string().contains("Failed to open file"));
    }
}
