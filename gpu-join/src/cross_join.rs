//! Cartesian product of two device tables.
//!
//! The left table is repeated row by row (`right.rows` times) and the right
//! table is tiled as a block (`left.rows` times). Stitched side by side the
//! two give every `(left_row, right_row)` pair with the right row cycling
//! fastest, using one allocate-and-fill pass per side.

use gpu_columnar::{concatenate_columns, Table};
use gpu_kernels::{empty_like, repeat, tile};
use gpu_memory_manager::{MemoryResourceRef, Stream};
use tracing::debug;

use crate::error::JoinError;
use crate::join::{JoinKind, JoinOperator};

/// Cross join as a [`JoinOperator`] strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrossJoin;

impl JoinOperator for CrossJoin {
    fn kind(&self) -> JoinKind {
        JoinKind::Cross
    }

    fn join(&self, left: &Table, right: &Table, stream: &Stream, mr: &MemoryResourceRef) -> Result<Table, JoinError> {
        cross_join(left, right, stream, mr)
    }
}

/// Every combination of a left row and a right row.
///
/// The result has `left.num_rows() * right.num_rows()` rows, left's columns
/// followed by right's, and row `i` equals `left.row(i / right.num_rows())`
/// followed by `right.row(i % right.num_rows())`. All output memory comes
/// from `mr` and all device work is enqueued on `stream`; the call returns
/// without waiting for it.
///
/// A table without columns is an invalid argument whatever its row count.
/// A table without rows is not an error: the result is then empty but
/// still carries the full typed column list.
///
/// On failure every intermediate allocation has been released by the time
/// the error is returned.
pub fn cross_join(left: &Table, right: &Table, stream: &Stream, mr: &MemoryResourceRef) -> Result<Table, JoinError> {
    if left.num_columns() == 0 || right.num_columns() == 0 {
        return Err(JoinError::InvalidArgument(format!(
            "cross join needs at least one column on each side (left has {}, right has {})",
            left.num_columns(),
            right.num_columns()
        )));
    }

    let left_rows = left.num_rows();
    let right_rows = right.num_rows();
    debug!(
        "cross_join: left {}x{}, right {}x{} on stream {} using '{}'",
        left_rows,
        left.num_columns(),
        right_rows,
        right.num_columns(),
        stream.id(),
        mr.name()
    );

    if left_rows == 0 || right_rows == 0 {
        let empty_left = empty_like(left, stream, mr)?;
        let empty_right = empty_like(right, stream, mr)?;
        return Ok(Table::new(concatenate_columns(
            empty_left.release(),
            empty_right.release(),
        ))?);
    }

    let out_rows = left_rows.checked_mul(right_rows).ok_or_else(|| {
        JoinError::InvalidArgument(format!(
            "cross join of {left_rows} x {right_rows} rows exceeds the addressable size"
        ))
    })?;

    let left_repeated = repeat(left, right_rows, stream, mr)?;
    let right_tiled = tile(right, left_rows, stream, mr)?;

    let result = Table::new(concatenate_columns(
        left_repeated.release(),
        right_tiled.release(),
    ))?;
    debug!("cross_join: produced {} rows x {} columns", out_rows, result.num_columns());

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpu_columnar::{Column, GpuDataType, Value};
    use gpu_memory_manager::{
        DevicePtr, HostMemoryResource, LimitingResource, MemoryError, MemoryResource, TrackingResource,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Forwards the first `remaining` allocations, then reports out of memory.
    #[derive(Debug)]
    struct FailAfter {
        upstream: MemoryResourceRef,
        remaining: AtomicUsize,
    }

    impl MemoryResource for FailAfter {
        fn allocate(&self, bytes: usize, stream: &Stream) -> Result<DevicePtr, MemoryError> {
            let granted = self
                .remaining
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
                .is_ok();
            if !granted {
                return Err(MemoryError::OutOfMemory {
                    resource: self.name().to_string(),
                    requested: bytes,
                    available: 0,
                });
            }
            self.upstream.allocate(bytes, stream)
        }

        fn deallocate(&self, ptr: DevicePtr, bytes: usize, stream: &Stream) {
            self.upstream.deallocate(ptr, bytes, stream);
        }

        fn name(&self) -> &str {
            "fail-after"
        }
    }

    fn setup() -> (Stream, MemoryResourceRef) {
        (Stream::new().unwrap(), Arc::new(HostMemoryResource::new()))
    }

    fn int_table(values: &[i64], stream: &Stream, mr: &MemoryResourceRef) -> Table {
        Table::new(vec![Column::from_slice(values, stream, mr).unwrap()]).unwrap()
    }

    #[test]
    fn pairs_in_right_fastest_order() {
        let (stream, mr) = setup();
        let left = int_table(&[1, 2], &stream, &mr);
        let right = int_table(&[10, 20, 30], &stream, &mr);

        let out = cross_join(&left, &right, &stream, &mr).unwrap();

        let pairs: Vec<Vec<Value>> = [(1, 10), (1, 20), (1, 30), (2, 10), (2, 20), (2, 30)]
            .iter()
            .map(|&(l, r)| vec![Value::Int(l), Value::Int(r)])
            .collect();
        assert_eq!(out.to_host().unwrap().rows(), pairs);
    }

    #[test]
    fn zero_columns_is_invalid_on_either_side() {
        let (stream, mr) = setup();
        let empty_schema = Table::new(Vec::new()).unwrap();
        let table = int_table(&[1], &stream, &mr);

        assert!(matches!(
            cross_join(&empty_schema, &table, &stream, &mr),
            Err(JoinError::InvalidArgument(_))
        ));
        assert!(matches!(
            cross_join(&table, &empty_schema, &stream, &mr),
            Err(JoinError::InvalidArgument(_))
        ));
    }

    #[test]
    fn zero_rows_keep_the_combined_schema() {
        let (stream, mr) = setup();
        let left = Table::new(vec![
            Column::from_slice::<i32>(&[], &stream, &mr).unwrap(),
            Column::from_options::<f64>(&[], &stream, &mr).unwrap(),
        ])
        .unwrap();
        let right = int_table(&[1, 2, 3], &stream, &mr);

        for out in [
            cross_join(&left, &right, &stream, &mr).unwrap(),
            cross_join(&right, &left, &stream, &mr).unwrap(),
        ] {
            assert_eq!(out.num_rows(), 0);
            assert_eq!(out.num_columns(), 3);
        }

        let out = cross_join(&left, &right, &stream, &mr).unwrap();
        assert_eq!(
            out.dtypes(),
            vec![GpuDataType::Int32, GpuDataType::Float64, GpuDataType::Int64]
        );
        assert!(out.column(1).unwrap().is_nullable());
        assert!(!out.column(2).unwrap().is_nullable());
    }

    #[test]
    fn operator_dispatch_matches_function() {
        let (stream, mr) = setup();
        let left = int_table(&[5], &stream, &mr);
        let right = int_table(&[6, 7], &stream, &mr);

        let op = JoinKind::Cross.operator();
        assert_eq!(op.kind(), JoinKind::Cross);
        let out = op.join(&left, &right, &stream, &mr).unwrap();
        assert_eq!(out.num_rows(), 2);
        assert_eq!(out.column(1).unwrap().to_vec::<i64>().unwrap(), vec![6, 7]);
    }

    #[test]
    fn allocation_failure_releases_intermediates() {
        let stream = Stream::new().unwrap();
        let tracker = Arc::new(TrackingResource::new(Arc::new(HostMemoryResource::new())));
        let host: MemoryResourceRef = Arc::new(HostMemoryResource::new());

        let left = int_table(&[1, 2, 3, 4], &stream, &host);
        let right = int_table(&[1, 2, 3, 4], &stream, &host);

        // Room for the repeated left side (16 x 8 bytes) but not the tiled right.
        let limited: MemoryResourceRef = Arc::new(LimitingResource::new(tracker.clone(), 200));
        let err = cross_join(&left, &right, &stream, &limited).unwrap_err();

        assert!(matches!(err, JoinError::Memory(MemoryError::OutOfMemory { .. })));
        assert_eq!(tracker.stats().total_allocations, 1);
        assert_eq!(tracker.live_allocations(), 0);
        stream.synchronize().unwrap();
    }

    fn mixed_empty_table(stream: &Stream, mr: &MemoryResourceRef) -> Table {
        Table::new(vec![
            Column::from_slice::<i32>(&[], stream, mr).unwrap(),
            Column::from_options::<f64>(&[], stream, mr).unwrap(),
        ])
        .unwrap()
    }

    #[test]
    fn zero_rows_hold_only_the_output_buffers() {
        let stream = Stream::new().unwrap();
        let host: MemoryResourceRef = Arc::new(HostMemoryResource::new());
        let tracker = Arc::new(TrackingResource::new(Arc::new(HostMemoryResource::new())));
        let tracked: MemoryResourceRef = tracker.clone();

        let left = mixed_empty_table(&stream, &host);
        let right = int_table(&[1, 2, 3], &stream, &host);

        let out = cross_join(&left, &right, &stream, &tracked).unwrap();

        // Int32 data, Float64 data and mask, Int64 data.
        assert_eq!(tracker.live_allocations(), 4);
        assert_eq!(tracker.live_bytes(), 0);
        assert_eq!(out.num_rows(), 0);

        drop(out);
        assert_eq!(tracker.live_allocations(), 0);
        stream.synchronize().unwrap();
    }

    #[test]
    fn zero_rows_failure_releases_the_first_side() {
        let stream = Stream::new().unwrap();
        let host: MemoryResourceRef = Arc::new(HostMemoryResource::new());
        let tracker = Arc::new(TrackingResource::new(Arc::new(HostMemoryResource::new())));

        let left = mixed_empty_table(&stream, &host);
        let right = int_table(&[1, 2, 3], &stream, &host);

        // Enough for the left side's three empty buffers only.
        let failing: MemoryResourceRef = Arc::new(FailAfter {
            upstream: tracker.clone(),
            remaining: AtomicUsize::new(3),
        });
        let err = cross_join(&left, &right, &stream, &failing).unwrap_err();

        assert!(matches!(err, JoinError::Memory(MemoryError::OutOfMemory { .. })));
        assert_eq!(tracker.stats().total_allocations, 3);
        assert_eq!(tracker.live_allocations(), 0);
        stream.synchronize().unwrap();
    }
}
