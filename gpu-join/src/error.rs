use gpu_columnar::ColumnError;
use gpu_kernels::KernelError;
use gpu_memory_manager::{DeviceError, MemoryError};
use thiserror::Error;

/// Everything a join call can fail with.
///
/// `InvalidArgument` is raised before any device work is issued. Memory
/// errors surface synchronously from the allocation that failed; device
/// errors surface at the next stream synchronization.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JoinError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Memory(#[from] MemoryError),

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Column(ColumnError),
}

impl From<ColumnError> for JoinError {
    fn from(err: ColumnError) -> Self {
        match err {
            ColumnError::Memory(err) => JoinError::Memory(err),
            ColumnError::Device(err) => JoinError::Device(err),
            other => JoinError::Column(other),
        }
    }
}

impl From<KernelError> for JoinError {
    fn from(err: KernelError) -> Self {
        match err {
            err @ (KernelError::SizeOverflow { .. } | KernelError::InvalidCounts(_)) => {
                JoinError::InvalidArgument(err.to_string())
            }
            KernelError::Column(err) => err.into(),
            KernelError::Memory(err) => JoinError::Memory(err),
            KernelError::Device(err) => JoinError::Device(err),
        }
    }
}
