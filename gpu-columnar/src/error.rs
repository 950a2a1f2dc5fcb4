use gpu_memory_manager::{DeviceError, MemoryError};
use thiserror::Error;

use crate::data_type::GpuDataType;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ColumnError {
    #[error("column size mismatch: expected {expected} bytes for {rows} rows of {dtype:?}, got {actual}")]
    SizeMismatch {
        dtype: GpuDataType,
        rows: usize,
        expected: usize,
        actual: usize,
    },

    #[error("null mask size mismatch: expected {expected} bytes for {rows} rows, got {actual}")]
    MaskSizeMismatch {
        rows: usize,
        expected: usize,
        actual: usize,
    },

    #[error("column {index} has {actual} rows, table has {expected}")]
    RowCountMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("type mismatch: column holds {actual:?}, requested {requested}")]
    TypeMismatch {
        actual: GpuDataType,
        requested: &'static str,
    },

    #[error(transparent)]
    Memory(#[from] MemoryError),

    #[error(transparent)]
    Device(#[from] DeviceError),
}
