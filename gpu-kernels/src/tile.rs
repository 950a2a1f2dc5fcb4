use gpu_columnar::Table;
use gpu_memory_manager::{MemoryResourceRef, Stream};
use tracing::debug;

use crate::error::KernelError;
use crate::gather::{gather_table, RowMap};

/// Concatenate `count` copies of `table` end to end.
///
/// Output row `k` is input row `k % rows`. A `count` of zero, or an empty
/// input, yields an empty table with the same schema.
pub fn tile(table: &Table, count: usize, stream: &Stream, mr: &MemoryResourceRef) -> Result<Table, KernelError> {
    let rows = table.num_rows();
    let out_rows = rows
        .checked_mul(count)
        .ok_or(KernelError::SizeOverflow { rows, factor: count })?;

    debug!("tile: {} rows x {} -> {} rows", rows, count, out_rows);
    gather_table(table, out_rows, &RowMap::Tile { rows }, stream, mr)
}
