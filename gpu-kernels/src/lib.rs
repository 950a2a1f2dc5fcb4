//! Row-copying primitives on device tables.
//!
//! Each primitive allocates its outputs through the caller's memory
//! resource and enqueues the copies on the caller's stream; none of them
//! waits for the device except [`repeat_by_counts`], which must read the
//! counts to size its output.

pub mod empty_like;
pub mod error;
pub mod gather;
pub mod launch;
pub mod repeat;
pub mod tile;

pub use empty_like::empty_like;
pub use error::KernelError;
pub use gather::{gather_column, gather_table, RowMap};
pub use launch::LaunchConfig;
pub use repeat::{repeat, repeat_by_counts};
pub use tile::tile;
