//! Device-resident cross join for a columnar table engine.
//!
//! This crate re-exports the workspace so applications can depend on one
//! package:
//!
//! - [`memory`]: streams, device buffers and memory resources
//! - [`columnar`]: columns, tables and host copies
//! - [`kernels`]: repeat, tile and the row gather behind them
//! - [`join`]: the cross join operator, options layer and executor
//! - [`arrow`]: Arrow `RecordBatch` and Parquet bridges
//!
//! ```no_run
//! use gpu_join_engine::prelude::*;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), JoinError> {
//! let stream = Stream::new()?;
//! let mr: MemoryResourceRef = Arc::new(HostMemoryResource::new());
//! let left = Table::new(vec![Column::from_slice(&[1i64, 2], &stream, &mr)?])?;
//! let right = Table::new(vec![Column::from_slice(&[10i64, 20, 30], &stream, &mr)?])?;
//!
//! let pairs = cross_join(&left, &right, &stream, &mr)?;
//! stream.synchronize()?;
//! assert_eq!(pairs.num_rows(), 6);
//! # Ok(())
//! # }
//! ```

pub use arrow_interop as arrow;
pub use gpu_columnar as columnar;
pub use gpu_join as join;
pub use gpu_kernels as kernels;
pub use gpu_memory_manager as memory;

pub mod prelude {
    pub use gpu_columnar::{Column, GpuDataType, HostTable, Table, Value};
    pub use gpu_join::api::JoinOptions;
    pub use gpu_join::{cross_join, EngineConfig, JoinError, JoinExecutor, JoinKind, JoinOperator};
    pub use gpu_memory_manager::{
        default_resource, set_default_resource, HostMemoryResource, MemoryResourceRef, SlabAllocator, Stream,
        TrackingResource,
    };
}
