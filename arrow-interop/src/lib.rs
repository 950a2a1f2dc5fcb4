//! Arrow ↔ device table conversion utilities.
//!
//! Columns cross the boundary in their native width: an Arrow `Int16`
//! column becomes an `Int16` device column and comes back as `Int16`.
//! Validity travels as the device null mask, so nulls survive a round trip
//! through any kernel that preserves masks.
//!
//! # Layout contract
//!
//! Each device column is a **flat, row-contiguous** little-endian buffer,
//! plus an optional LSB-first validity bitmap:
//!
//! ```text
//! [  value[0]  |  value[1]  | ... |  value[n-1]  ]
//! ```
//!
//! Arrow booleans are bit-packed; on the device they take one byte each.

pub mod parquet_loader;
pub mod record_batch_convert;
pub mod schema_utils;

pub use parquet_loader::load_parquet_table;
pub use record_batch_convert::{record_batch_to_table, table_to_record_batch};
pub use schema_utils::{arrow_type_for, gpu_type_for, join_schema, SchemaExt};
