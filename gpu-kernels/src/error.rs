use gpu_columnar::ColumnError;
use gpu_memory_manager::{DeviceError, MemoryError};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KernelError {
    #[error("output of {rows} rows x {factor} exceeds the addressable size")]
    SizeOverflow { rows: usize, factor: usize },

    #[error("invalid repeat counts: {0}")]
    InvalidCounts(String),

    #[error(transparent)]
    Column(ColumnError),

    #[error(transparent)]
    Memory(#[from] MemoryError),

    #[error(transparent)]
    Device(#[from] DeviceError),
}

impl From<ColumnError> for KernelError {
    fn from(err: ColumnError) -> Self {
        match err {
            ColumnError::Memory(err) => KernelError::Memory(err),
            ColumnError::Device(err) => KernelError::Device(err),
            other => KernelError::Column(other),
        }
    }
}
