use anyhow::{bail, Result};
use arrow_schema::{DataType, Field, Schema, SchemaRef, TimeUnit};
use gpu_columnar::GpuDataType;
use std::collections::HashSet;
use std::sync::Arc;

/// Device type for an Arrow type, if the device can hold it.
pub fn gpu_type_for(data_type: &DataType) -> Result<GpuDataType> {
    Ok(match data_type {
        DataType::Boolean => GpuDataType::Bool8,
        DataType::Int8 => GpuDataType::Int8,
        DataType::Int16 => GpuDataType::Int16,
        DataType::Int32 => GpuDataType::Int32,
        DataType::Int64 => GpuDataType::Int64,
        DataType::UInt8 => GpuDataType::UInt8,
        DataType::UInt16 => GpuDataType::UInt16,
        DataType::UInt32 => GpuDataType::UInt32,
        DataType::UInt64 => GpuDataType::UInt64,
        DataType::Float32 => GpuDataType::Float32,
        DataType::Float64 => GpuDataType::Float64,
        DataType::Date32 => GpuDataType::Date32,
        DataType::Timestamp(TimeUnit::Millisecond, _) => GpuDataType::TimestampMs,
        other => bail!("Unsupported column type for device conversion: {:?}", other),
    })
}

pub fn arrow_type_for(dtype: GpuDataType) -> DataType {
    match dtype {
        GpuDataType::Bool8 => DataType::Boolean,
        GpuDataType::Int8 => DataType::Int8,
        GpuDataType::Int16 => DataType::Int16,
        GpuDataType::Int32 => DataType::Int32,
        GpuDataType::Int64 => DataType::Int64,
        GpuDataType::UInt8 => DataType::UInt8,
        GpuDataType::UInt16 => DataType::UInt16,
        GpuDataType::UInt32 => DataType::UInt32,
        GpuDataType::UInt64 => DataType::UInt64,
        GpuDataType::Float32 => DataType::Float32,
        GpuDataType::Float64 => DataType::Float64,
        GpuDataType::Date32 => DataType::Date32,
        GpuDataType::TimestampMs => DataType::Timestamp(TimeUnit::Millisecond, None),
    }
}

/// Output schema of a cross join: left fields, then right fields.
///
/// A right field whose name is already taken gets a `right_` prefix
/// (repeated until the name is free).
pub fn join_schema(left: &Schema, right: &Schema) -> SchemaRef {
    let mut taken: HashSet<String> = left.fields().iter().map(|f| f.name().clone()).collect();
    let mut fields: Vec<Field> = left.fields().iter().map(|f| f.as_ref().clone()).collect();

    for field in right.fields() {
        let mut name = field.name().clone();
        while taken.contains(&name) {
            name = format!("right_{name}");
        }
        taken.insert(name.clone());
        fields.push(field.as_ref().clone().with_name(name));
    }

    Arc::new(Schema::new(fields))
}

pub trait SchemaExt {
    /// Bytes per row on the device, excluding null masks.
    fn row_byte_width(&self) -> Result<usize>;
    fn is_device_compatible(&self) -> bool;
}

impl SchemaExt for Schema {
    fn row_byte_width(&self) -> Result<usize> {
        self.fields()
            .iter()
            .map(|f| gpu_type_for(f.data_type()).map(GpuDataType::byte_width))
            .sum()
    }

    fn is_device_compatible(&self) -> bool {
        self.fields().iter().all(|f| gpu_type_for(f.data_type()).is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_schema_prefixes_collisions() {
        let left = Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("right_id", DataType::Int32, false),
        ]);
        let right = Schema::new(vec![
            Field::new("id", DataType::Int64, true),
            Field::new("price", DataType::Float64, true),
        ]);

        let joined = join_schema(&left, &right);
        let names: Vec<&str> = joined.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(names, vec!["id", "right_id", "right_right_id", "price"]);
        assert!(joined.field(2).is_nullable());
    }

    #[test]
    fn test_row_byte_width() {
        let schema = Schema::new(vec![
            Field::new("a", DataType::Int64, false),   // 8
            Field::new("b", DataType::Float32, false), // 4
            Field::new("c", DataType::Boolean, true),  // 1
        ]);
        assert_eq!(schema.row_byte_width().unwrap(), 13);
        assert!(schema.is_device_compatible());

        let strings = Schema::new(vec![Field::new("s", DataType::Utf8, false)]);
        assert!(!strings.is_device_compatible());
        assert!(strings.row_byte_width().is_err());
    }

    #[test]
    fn test_type_mapping_is_symmetric() {
        for dtype in [GpuDataType::Bool8, GpuDataType::UInt16, GpuDataType::Date32, GpuDataType::TimestampMs] {
            assert_eq!(gpu_type_for(&arrow_type_for(dtype)).unwrap(), dtype);
        }
    }
}
