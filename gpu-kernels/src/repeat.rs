use gpu_columnar::{Column, Table, Value};
use gpu_memory_manager::{MemoryResourceRef, Stream};
use std::sync::Arc;
use tracing::debug;

use crate::error::KernelError;
use crate::gather::{gather_table, RowMap};

/// Repeat every row of `table` `count` times, keeping row order.
///
/// Output row `k` is input row `k / count`. A `count` of zero, or an empty
/// input, yields an empty table with the same schema.
pub fn repeat(table: &Table, count: usize, stream: &Stream, mr: &MemoryResourceRef) -> Result<Table, KernelError> {
    let rows = table.num_rows();
    let out_rows = rows
        .checked_mul(count)
        .ok_or(KernelError::SizeOverflow { rows, factor: count })?;

    debug!("repeat: {} rows x {} -> {} rows", rows, count, out_rows);
    gather_table(table, out_rows, &RowMap::Repeat { count }, stream, mr)
}

/// Repeat row `i` of `table` `counts[i]` times.
///
/// `counts` must be a non-null integral column with one entry per row and
/// no negative values. Sizing the output requires the counts on the host,
/// so this synchronizes the stream the counts were written on before
/// enqueueing the gather on `stream`.
pub fn repeat_by_counts(
    table: &Table,
    counts: &Column,
    stream: &Stream,
    mr: &MemoryResourceRef,
) -> Result<Table, KernelError> {
    if counts.len() != table.num_rows() {
        return Err(KernelError::InvalidCounts(format!(
            "{} counts for a table of {} rows",
            counts.len(),
            table.num_rows()
        )));
    }

    let host = counts.to_host()?;
    let mut offsets = Vec::with_capacity(host.n_rows + 1);
    let mut total = 0usize;
    offsets.push(total);

    for row in 0..host.n_rows {
        let count = match host.value(row) {
            Value::Int(v) => usize::try_from(v)
                .map_err(|_| KernelError::InvalidCounts(format!("negative count {v} at row {row}")))?,
            Value::UInt(v) => usize::try_from(v)
                .map_err(|_| KernelError::InvalidCounts(format!("count {v} at row {row} is too large")))?,
            Value::Null => {
                return Err(KernelError::InvalidCounts(format!("null count at row {row}")));
            }
            Value::Bool(_) | Value::Float(_) => {
                return Err(KernelError::InvalidCounts(format!(
                    "counts must be integral, got {:?}",
                    counts.dtype()
                )));
            }
        };
        total = total
            .checked_add(count)
            .ok_or(KernelError::SizeOverflow { rows: total, factor: count })?;
        offsets.push(total);
    }

    debug!("repeat_by_counts: {} rows -> {} rows", table.num_rows(), total);
    gather_table(table, total, &RowMap::Offsets(Arc::new(offsets)), stream, mr)
}
