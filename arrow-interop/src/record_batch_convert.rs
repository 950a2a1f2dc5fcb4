//! Conversion between Arrow `RecordBatch` and device [`Table`]s.

use anyhow::{bail, Context, Result};
use arrow_array::cast::AsArray;
use arrow_array::types::{
    ArrowPrimitiveType, Date32Type, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type,
    Int8Type, TimestampMillisecondType, UInt16Type, UInt32Type, UInt64Type, UInt8Type,
};
use arrow_array::{Array, ArrayRef, BooleanArray, PrimitiveArray, RecordBatch};
use arrow_schema::{DataType, Field, SchemaRef};
use gpu_columnar::bitmask;
use gpu_columnar::{Column, GpuDataType, HostColumn, NativeType, Table};
use gpu_memory_manager::{MemoryResourceRef, Stream};
use std::sync::Arc;
use tracing::debug;

use crate::schema_utils::gpu_type_for;

// ---------------------------------------------------------------------------
// Arrow → device
// ---------------------------------------------------------------------------

/// Upload every column of `batch` as a device column on `stream`.
///
/// Nullable fields, and any column that actually holds nulls, get a null
/// mask. The uploads are enqueued; nothing waits for them.
pub fn record_batch_to_table(batch: &RecordBatch, stream: &Stream, mr: &MemoryResourceRef) -> Result<Table> {
    let mut columns = Vec::with_capacity(batch.num_columns());

    for (field, array) in batch.schema().fields().iter().zip(batch.columns()) {
        let host = array_to_host(field, array.as_ref())
            .with_context(|| format!("Converting column '{}'", field.name()))?;
        columns.push(Column::from_host(&host, stream, mr)?);
    }

    debug!(
        "Uploaded record batch: {} rows x {} columns",
        batch.num_rows(),
        batch.num_columns()
    );
    Ok(Table::new(columns)?)
}

pub(crate) fn array_to_host(field: &Field, array: &dyn Array) -> Result<HostColumn> {
    let dtype = gpu_type_for(array.data_type())?;

    let mut host = match dtype {
        GpuDataType::Bool8 => {
            let a = array.as_boolean_opt().context("Expected a boolean array")?;
            let values: Vec<bool> = a.values().iter().collect();
            HostColumn::from_values(&values)
        }
        GpuDataType::Int8 => primitive_to_host::<Int8Type>(array)?,
        GpuDataType::Int16 => primitive_to_host::<Int16Type>(array)?,
        GpuDataType::Int32 => primitive_to_host::<Int32Type>(array)?,
        GpuDataType::Int64 => primitive_to_host::<Int64Type>(array)?,
        GpuDataType::UInt8 => primitive_to_host::<UInt8Type>(array)?,
        GpuDataType::UInt16 => primitive_to_host::<UInt16Type>(array)?,
        GpuDataType::UInt32 => primitive_to_host::<UInt32Type>(array)?,
        GpuDataType::UInt64 => primitive_to_host::<UInt64Type>(array)?,
        GpuDataType::Float32 => primitive_to_host::<Float32Type>(array)?,
        GpuDataType::Float64 => primitive_to_host::<Float64Type>(array)?,
        GpuDataType::Date32 => primitive_to_host::<Date32Type>(array)?.with_dtype(dtype)?,
        GpuDataType::TimestampMs => primitive_to_host::<TimestampMillisecondType>(array)?.with_dtype(dtype)?,
    };

    if field.is_nullable() || array.null_count() > 0 {
        host.validity = Some(bitmask::pack((0..array.len()).map(|row| array.is_valid(row))));
    }
    Ok(host)
}

fn primitive_to_host<T>(array: &dyn Array) -> Result<HostColumn>
where
    T: ArrowPrimitiveType,
    T::Native: NativeType,
{
    let a = array
        .as_primitive_opt::<T>()
        .with_context(|| format!("Expected a {:?} array", T::DATA_TYPE))?;
    Ok(HostColumn::from_values::<T::Native>(a.values()))
}

// ---------------------------------------------------------------------------
// Device → Arrow
// ---------------------------------------------------------------------------

/// Download `table` into a `RecordBatch` with the given schema.
///
/// Blocks until each column's stream has finished the work that produces
/// it. The caller supplies the schema so field names, nullability and
/// timestamp zones come back intact.
pub fn table_to_record_batch(table: &Table, schema: SchemaRef) -> Result<RecordBatch> {
    if schema.fields().len() != table.num_columns() {
        bail!(
            "Schema has {} fields but the table has {} columns",
            schema.fields().len(),
            table.num_columns()
        );
    }

    let host = table.to_host().context("Downloading table")?;
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(host.num_columns());

    for (col, field) in host.columns().iter().zip(schema.fields()) {
        let array = host_to_array(col, field).with_context(|| format!("Building column '{}'", field.name()))?;
        columns.push(array);
    }

    RecordBatch::try_new(schema, columns).context("Building RecordBatch from device table")
}

fn host_to_array(col: &HostColumn, field: &Field) -> Result<ArrayRef> {
    let expected = gpu_type_for(field.data_type())?;
    if expected != col.dtype {
        bail!("Field type {:?} does not match device type {:?}", field.data_type(), col.dtype);
    }

    let array: ArrayRef = match col.dtype {
        GpuDataType::Bool8 => Arc::new(BooleanArray::from(col.options::<bool>()?)),
        GpuDataType::Int8 => primitive_from_host::<Int8Type>(col)?,
        GpuDataType::Int16 => primitive_from_host::<Int16Type>(col)?,
        GpuDataType::Int32 => primitive_from_host::<Int32Type>(col)?,
        GpuDataType::Int64 => primitive_from_host::<Int64Type>(col)?,
        GpuDataType::UInt8 => primitive_from_host::<UInt8Type>(col)?,
        GpuDataType::UInt16 => primitive_from_host::<UInt16Type>(col)?,
        GpuDataType::UInt32 => primitive_from_host::<UInt32Type>(col)?,
        GpuDataType::UInt64 => primitive_from_host::<UInt64Type>(col)?,
        GpuDataType::Float32 => primitive_from_host::<Float32Type>(col)?,
        GpuDataType::Float64 => primitive_from_host::<Float64Type>(col)?,
        GpuDataType::Date32 => primitive_from_host::<Date32Type>(col)?,
        GpuDataType::TimestampMs => {
            let DataType::Timestamp(_, tz) = field.data_type() else {
                bail!("Expected a timestamp field, got {:?}", field.data_type());
            };
            let values: PrimitiveArray<TimestampMillisecondType> =
                col.options::<i64>()?.into_iter().collect();
            Arc::new(values.with_timezone_opt(tz.clone()))
        }
    };
    Ok(array)
}

fn primitive_from_host<T>(col: &HostColumn) -> Result<ArrayRef>
where
    T: ArrowPrimitiveType,
    T::Native: NativeType,
{
    let values: PrimitiveArray<T> = col.options::<T::Native>()?.into_iter().collect();
    Ok(Arc::new(values))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
