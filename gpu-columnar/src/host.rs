//! Host-side copies of device columns, used to stage uploads and to inspect
//! results.

use std::fmt;

use crate::bitmask;
use crate::data_type::{GpuDataType, NativeType};
use crate::error::ColumnError;

/// One cell of a downloaded column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v.into())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::UInt(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
        }
    }
}

/// An owned host buffer of column data in device layout.
#[derive(Debug, Clone, PartialEq)]
pub struct HostColumn {
    pub dtype: GpuDataType,
    /// Raw little-endian, packed element bytes.
    pub data: Vec<u8>,
    /// Number of rows represented.
    pub n_rows: usize,
    /// Validity bitmap (see [`crate::bitmask`]); `None` means all valid.
    pub validity: Option<Vec<u8>>,
}

impl HostColumn {
    /// Create from a pre-filled byte vec.
    pub fn from_bytes(
        dtype: GpuDataType,
        data: Vec<u8>,
        n_rows: usize,
        validity: Option<Vec<u8>>,
    ) -> Result<Self, ColumnError> {
        let expected = n_rows.checked_mul(dtype.byte_width());
        if expected != Some(data.len()) {
            return Err(ColumnError::SizeMismatch {
                dtype,
                rows: n_rows,
                expected: expected.unwrap_or(usize::MAX),
                actual: data.len(),
            });
        }
        if let Some(mask) = &validity {
            let expected = bitmask::mask_bytes(n_rows);
            if mask.len() != expected {
                return Err(ColumnError::MaskSizeMismatch {
                    rows: n_rows,
                    expected,
                    actual: mask.len(),
                });
            }
        }
        Ok(Self {
            dtype,
            data,
            n_rows,
            validity,
        })
    }

    pub fn from_values<T: NativeType>(values: &[T]) -> Self {
        Self {
            dtype: T::DTYPE,
            data: encode(values.iter().copied()),
            n_rows: values.len(),
            validity: None,
        }
    }

    /// Nulls become zeroed slots with a cleared validity bit.
    pub fn from_options<T: NativeType + Default>(values: &[Option<T>]) -> Self {
        Self {
            dtype: T::DTYPE,
            data: encode(values.iter().map(|v| v.unwrap_or_default())),
            n_rows: values.len(),
            validity: Some(bitmask::pack(values.iter().map(Option::is_some))),
        }
    }

    /// Reinterpret as another type with the same representation (for
    /// example `Int64` as `TimestampMs`).
    pub fn with_dtype(mut self, dtype: GpuDataType) -> Result<Self, ColumnError> {
        if dtype.byte_width() != self.dtype.byte_width() {
            return Err(ColumnError::SizeMismatch {
                dtype,
                rows: self.n_rows,
                expected: self.n_rows.saturating_mul(dtype.byte_width()),
                actual: self.data.len(),
            });
        }
        self.dtype = dtype;
        Ok(self)
    }

    pub fn is_valid(&self, row: usize) -> bool {
        self.validity
            .as_ref()
            .map_or(true, |mask| bitmask::get_bit(mask, row))
    }

    pub fn null_count(&self) -> usize {
        self.validity
            .as_ref()
            .map_or(0, |mask| bitmask::count_nulls(mask, self.n_rows))
    }

    fn slot(&self, row: usize) -> &[u8] {
        let width = self.dtype.byte_width();
        &self.data[row * width..(row + 1) * width]
    }

    pub fn value(&self, row: usize) -> Value {
        if !self.is_valid(row) {
            return Value::Null;
        }
        let raw = self.slot(row);
        match self.dtype {
            GpuDataType::Bool8 => Value::Bool(bool::read_le(raw)),
            GpuDataType::Int8 => Value::Int(i8::read_le(raw).into()),
            GpuDataType::Int16 => Value::Int(i16::read_le(raw).into()),
            GpuDataType::Int32 | GpuDataType::Date32 => Value::Int(i32::read_le(raw).into()),
            GpuDataType::Int64 | GpuDataType::TimestampMs => Value::Int(i64::read_le(raw)),
            GpuDataType::UInt8 => Value::UInt(u8::read_le(raw).into()),
            GpuDataType::UInt16 => Value::UInt(u16::read_le(raw).into()),
            GpuDataType::UInt32 => Value::UInt(u32::read_le(raw).into()),
            GpuDataType::UInt64 => Value::UInt(u64::read_le(raw)),
            GpuDataType::Float32 => Value::Float(f32::read_le(raw).into()),
            GpuDataType::Float64 => Value::Float(f64::read_le(raw)),
        }
    }

    /// All slots decoded as `T`, nulls included as whatever the slot holds.
    pub fn values<T: NativeType>(&self) -> Result<Vec<T>, ColumnError> {
        if !T::compatible(self.dtype) {
            return Err(ColumnError::TypeMismatch {
                actual: self.dtype,
                requested: T::NAME,
            });
        }
        Ok(self
            .data
            .chunks_exact(self.dtype.byte_width())
            .map(T::read_le)
            .collect())
    }

    pub fn options<T: NativeType>(&self) -> Result<Vec<Option<T>>, ColumnError> {
        let values = self.values::<T>()?;
        Ok(values
            .into_iter()
            .enumerate()
            .map(|(row, v)| self.is_valid(row).then_some(v))
            .collect())
    }
}

fn encode<T: NativeType>(values: impl Iterator<Item = T>) -> Vec<u8> {
    let width = T::DTYPE.byte_width();
    let mut data = Vec::new();
    for v in values {
        let start = data.len();
        data.resize(start + width, 0);
        v.write_le(&mut data[start..]);
    }
    data
}

/// Host copy of a whole table.
#[derive(Debug, Clone, PartialEq)]
pub struct HostTable {
    columns: Vec<HostColumn>,
    n_rows: usize,
}

impl HostTable {
    pub fn new(columns: Vec<HostColumn>) -> Result<Self, ColumnError> {
        let n_rows = columns.first().map_or(0, |c| c.n_rows);
        if let Some((index, col)) = columns.iter().enumerate().find(|(_, c)| c.n_rows != n_rows) {
            return Err(ColumnError::RowCountMismatch {
                index,
                expected: n_rows,
                actual: col.n_rows,
            });
        }
        Ok(Self { columns, n_rows })
    }

    pub fn num_rows(&self) -> usize {
        self.n_rows
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[HostColumn] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> Option<&HostColumn> {
        self.columns.get(index)
    }

    pub fn into_columns(self) -> Vec<HostColumn> {
        self.columns
    }

    pub fn row(&self, row: usize) -> Vec<Value> {
        self.columns.iter().map(|c| c.value(row)).collect()
    }

    pub fn rows(&self) -> Vec<Vec<Value>> {
        (0..self.n_rows).map(|row| self.row(row)).collect()
    }
}
