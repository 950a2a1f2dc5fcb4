use thiserror::Error;

/// Failures raised synchronously by a memory resource.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MemoryError {
    #[error("out of device memory in {resource}: requested {requested} bytes, {available} available")]
    OutOfMemory {
        resource: String,
        requested: usize,
        available: usize,
    },

    #[error("requested size {requested} exceeds largest slab size {largest}")]
    ExceedsSlabSize { requested: usize, largest: usize },

    #[error("maximum number of slabs ({max_slabs}) reached for class {class}")]
    SlabClassExhausted { class: usize, max_slabs: usize },
}

/// Failures of work executed on a stream.
///
/// These are asynchronous: they are recorded by the stream worker and
/// reported by the next [`crate::Stream::synchronize`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeviceError {
    #[error("kernel `{kernel}` failed on stream {stream}: {message}")]
    KernelFailed {
        kernel: String,
        stream: u64,
        message: String,
    },

    #[error("failed to create stream: {0}")]
    StreamCreation(String),

    #[error("device runtime error: {0}")]
    Runtime(String),
}

impl DeviceError {
    /// Convenience constructor for kernel bodies that detect a fault.
    pub fn kernel(kernel: impl Into<String>, message: impl Into<String>) -> Self {
        DeviceError::KernelFailed {
            kernel: kernel.into(),
            stream: 0,
            message: message.into(),
        }
    }
}
