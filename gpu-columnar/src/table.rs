//! Tables: ordered sets of equal-length device columns.

use tracing::debug;

use crate::column::Column;
use crate::data_type::GpuDataType;
use crate::error::ColumnError;
use crate::host::HostTable;

/// An ordered sequence of columns sharing one row count.
///
/// The table exclusively owns its columns. Column order is the schema
/// order.
#[derive(Debug)]
pub struct Table {
    columns: Vec<Column>,
    num_rows: usize,
}

impl Table {
    /// Take ownership of `columns`, checking they all have the same length.
    pub fn new(columns: Vec<Column>) -> Result<Self, ColumnError> {
        let num_rows = columns.first().map_or(0, Column::len);
        if let Some((index, col)) = columns
            .iter()
            .enumerate()
            .find(|(_, col)| col.len() != num_rows)
        {
            return Err(ColumnError::RowCountMismatch {
                index,
                expected: num_rows,
                actual: col.len(),
            });
        }
        Ok(Self { columns, num_rows })
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn dtypes(&self) -> Vec<GpuDataType> {
        self.columns.iter().map(Column::dtype).collect()
    }

    /// Device bytes owned by all columns.
    pub fn allocated_bytes(&self) -> usize {
        self.columns.iter().map(Column::allocated_bytes).sum()
    }

    /// Give up ownership of the columns. The table is consumed.
    pub fn release(self) -> Vec<Column> {
        self.columns
    }

    /// Stitch `other`'s columns after this table's.
    pub fn hstack(self, other: Table) -> Result<Table, ColumnError> {
        Table::new(concatenate_columns(self.release(), other.release()))
    }

    /// Synchronize and download every column.
    pub fn to_host(&self) -> Result<HostTable, ColumnError> {
        let columns = self
            .columns
            .iter()
            .map(Column::to_host)
            .collect::<Result<Vec<_>, _>>()?;
        HostTable::new(columns)
    }
}

/// Move `second`'s columns after `first`'s.
///
/// Ownership transfer only: no element data is touched and nothing is
/// checked about row counts; constructing a [`Table`] from the result does
/// that.
pub fn concatenate_columns(mut first: Vec<Column>, second: Vec<Column>) -> Vec<Column> {
    debug!("Stitching {} + {} columns", first.len(), second.len());
    first.extend(second);
    first
}
