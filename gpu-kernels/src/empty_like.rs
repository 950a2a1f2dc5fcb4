use gpu_columnar::{Column, Table};
use gpu_memory_manager::{MemoryResourceRef, Stream};

use crate::error::KernelError;

/// A zero-row table with `table`'s schema: same column count, element
/// types and null-mask presence.
pub fn empty_like(table: &Table, stream: &Stream, mr: &MemoryResourceRef) -> Result<Table, KernelError> {
    let columns = table
        .columns()
        .iter()
        .map(|col| Column::empty(col.dtype(), col.is_nullable(), stream, mr))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Table::new(columns)?)
}
