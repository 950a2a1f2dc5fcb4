//! Device-resident columnar data model.
//!
//! A [`Column`] owns its device buffers; a [`Table`] owns its columns.
//! Ownership only ever moves: [`Table::release`] hands the columns out and
//! [`concatenate_columns`] stitches two column lists without touching data.

pub mod bitmask;
pub mod column;
pub mod data_type;
pub mod error;
pub mod host;
pub mod table;

pub use column::Column;
pub use data_type::{GpuDataType, NativeType};
pub use error::ColumnError;
pub use host::{HostColumn, HostTable, Value};
pub use table::{concatenate_columns, Table};
