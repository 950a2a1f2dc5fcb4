//! Row gather: the shared kernel behind repeat and tile.
//!
//! Output row `k` of every column is a copy of input row `map(k)`, value
//! and validity bit alike. Outputs are allocated on the host side of the
//! call; the copies are enqueued on the stream.

use gpu_columnar::bitmask;
use gpu_columnar::{Column, Table};
use gpu_memory_manager::{DeviceBuffer, MemoryResourceRef, Stream};
use rayon::prelude::*;
use std::sync::Arc;
use tracing::debug;

use crate::error::KernelError;
use crate::launch::LaunchConfig;

/// Maps an output row to the input row it copies.
#[derive(Debug, Clone)]
pub enum RowMap {
    /// Each input row appears `count` times in a row.
    Repeat { count: usize },
    /// The whole input of `rows` rows appears back to back.
    Tile { rows: usize },
    /// Exclusive prefix sums of per-row counts; `offsets.len() == rows + 1`.
    Offsets(Arc<Vec<usize>>),
}

impl RowMap {
    /// Only evaluated for `out_row < output rows`, so the divisors are
    /// never zero.
    pub fn source_row(&self, out_row: usize) -> usize {
        match self {
            RowMap::Repeat { count } => out_row / count,
            RowMap::Tile { rows } => out_row % rows,
            RowMap::Offsets(offsets) => offsets.partition_point(|&start| start <= out_row) - 1,
        }
    }
}

pub fn gather_table(
    table: &Table,
    out_rows: usize,
    map: &RowMap,
    stream: &Stream,
    mr: &MemoryResourceRef,
) -> Result<Table, KernelError> {
    let columns = table
        .columns()
        .iter()
        .map(|col| gather_column(col, out_rows, map, stream, mr))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Table::new(columns)?)
}

pub fn gather_column(
    col: &Column,
    out_rows: usize,
    map: &RowMap,
    stream: &Stream,
    mr: &MemoryResourceRef,
) -> Result<Column, KernelError> {
    let width = col.dtype().byte_width();
    let out_bytes = out_rows
        .checked_mul(width)
        .ok_or(KernelError::SizeOverflow {
            rows: out_rows,
            factor: width,
        })?;

    let data = DeviceBuffer::new(out_bytes, stream, mr)?;
    let null_mask = match col.null_mask() {
        Some(_) => Some(DeviceBuffer::new(bitmask::mask_bytes(out_rows), stream, mr)?),
        None => None,
    };

    if out_rows > 0 {
        let config = LaunchConfig::for_elements(out_rows);
        debug!(
            "gather {:?}: {} -> {} rows, grid={} block={} on stream {}",
            col.dtype(),
            col.len(),
            out_rows,
            config.grid,
            config.block,
            stream.id()
        );

        launch_gather_values(col.data(), &data, width, map.clone(), config, stream);
        if let (Some(src), Some(dst)) = (col.null_mask(), &null_mask) {
            launch_gather_mask(src, dst, out_rows, map.clone(), stream);
        }
    }

    Ok(Column::new(col.dtype(), out_rows, data, null_mask)?)
}

fn launch_gather_values(
    src: &DeviceBuffer,
    dst: &DeviceBuffer,
    width: usize,
    map: RowMap,
    config: LaunchConfig,
    stream: &Stream,
) {
    let (src, dst) = (src.view(), dst.view());
    stream.enqueue("gather_values", move || {
        let src = src.read();
        let src: &[u8] = &src;
        let mut dst = dst.write();
        let dst: &mut [u8] = &mut dst;

        let rows_per_block = config.block_len();
        dst.par_chunks_mut(rows_per_block * width)
            .enumerate()
            .for_each(|(block, out)| {
                let first_row = block * rows_per_block;
                for (i, slot) in out.chunks_exact_mut(width).enumerate() {
                    let row = map.source_row(first_row + i);
                    slot.copy_from_slice(&src[row * width..(row + 1) * width]);
                }
            });
        Ok(())
    });
}

fn launch_gather_mask(src: &DeviceBuffer, dst: &DeviceBuffer, out_rows: usize, map: RowMap, stream: &Stream) {
    let (src, dst) = (src.view(), dst.view());
    stream.enqueue("gather_null_mask", move || {
        let src = src.read();
        let src: &[u8] = &src;
        let mut dst = dst.write();
        let dst: &mut [u8] = &mut dst;

        // One output byte per work item so no two items share a byte.
        dst.par_iter_mut().enumerate().for_each(|(byte_idx, byte)| {
            let first_row = byte_idx * 8;
            let mut bits = 0u8;
            for bit in 0..8usize.min(out_rows - first_row) {
                if bitmask::get_bit(src, map.source_row(first_row + bit)) {
                    bits |= 1 << bit;
                }
            }
            *byte = bits;
        });
        Ok(())
    });
}
