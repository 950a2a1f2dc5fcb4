//! Device-resident columns.

use gpu_memory_manager::{DeviceBuffer, MemoryResourceRef, Stream};
use std::fmt;

use crate::bitmask;
use crate::data_type::{GpuDataType, NativeType};
use crate::error::ColumnError;
use crate::host::HostColumn;

/// A typed array in device memory with an optional validity bitmap.
///
/// The column owns both buffers. Invariant: `data` holds exactly
/// `len * dtype.byte_width()` bytes and `null_mask`, when present, exactly
/// `bitmask::mask_bytes(len)` bytes.
pub struct Column {
    dtype: GpuDataType,
    len: usize,
    data: DeviceBuffer,
    null_mask: Option<DeviceBuffer>,
}

impl Column {
    pub fn new(
        dtype: GpuDataType,
        len: usize,
        data: DeviceBuffer,
        null_mask: Option<DeviceBuffer>,
    ) -> Result<Self, ColumnError> {
        let expected = len.checked_mul(dtype.byte_width());
        if expected != Some(data.size()) {
            return Err(ColumnError::SizeMismatch {
                dtype,
                rows: len,
                expected: expected.unwrap_or(usize::MAX),
                actual: data.size(),
            });
        }
        if let Some(mask) = &null_mask {
            let expected = bitmask::mask_bytes(len);
            if mask.size() != expected {
                return Err(ColumnError::MaskSizeMismatch {
                    rows: len,
                    expected,
                    actual: mask.size(),
                });
            }
        }
        Ok(Self {
            dtype,
            len,
            data,
            null_mask,
        })
    }

    /// A zero-row column of `dtype`; `nullable` decides whether it carries
    /// an (empty) null mask.
    pub fn empty(
        dtype: GpuDataType,
        nullable: bool,
        stream: &Stream,
        mr: &MemoryResourceRef,
    ) -> Result<Self, ColumnError> {
        let data = DeviceBuffer::new(0, stream, mr)?;
        let null_mask = if nullable {
            Some(DeviceBuffer::new(0, stream, mr)?)
        } else {
            None
        };
        Self::new(dtype, 0, data, null_mask)
    }

    /// Upload a host column. The copies are enqueued on `stream`.
    pub fn from_host(host: &HostColumn, stream: &Stream, mr: &MemoryResourceRef) -> Result<Self, ColumnError> {
        let data = DeviceBuffer::from_host(&host.data, stream, mr)?;
        let null_mask = match &host.validity {
            Some(mask) => Some(DeviceBuffer::from_host(mask, stream, mr)?),
            None => None,
        };
        Self::new(host.dtype, host.n_rows, data, null_mask)
    }

    pub fn from_slice<T: NativeType>(
        values: &[T],
        stream: &Stream,
        mr: &MemoryResourceRef,
    ) -> Result<Self, ColumnError> {
        Self::from_host(&HostColumn::from_values(values), stream, mr)
    }

    pub fn from_options<T: NativeType + Default>(
        values: &[Option<T>],
        stream: &Stream,
        mr: &MemoryResourceRef,
    ) -> Result<Self, ColumnError> {
        Self::from_host(&HostColumn::from_options(values), stream, mr)
    }

    pub fn dtype(&self) -> GpuDataType {
        self.dtype
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether the column carries a null mask. A nullable column may still
    /// have no nulls.
    pub fn is_nullable(&self) -> bool {
        self.null_mask.is_some()
    }

    pub fn data(&self) -> &DeviceBuffer {
        &self.data
    }

    pub fn null_mask(&self) -> Option<&DeviceBuffer> {
        self.null_mask.as_ref()
    }

    /// Device bytes owned by this column.
    pub fn allocated_bytes(&self) -> usize {
        self.data.size() + self.null_mask.as_ref().map_or(0, DeviceBuffer::size)
    }

    pub fn into_parts(self) -> (GpuDataType, usize, DeviceBuffer, Option<DeviceBuffer>) {
        (self.dtype, self.len, self.data, self.null_mask)
    }

    /// Synchronize and download.
    pub fn to_host(&self) -> Result<HostColumn, ColumnError> {
        let data = self.data.to_host()?;
        let validity = match &self.null_mask {
            Some(mask) => Some(mask.to_host()?),
            None => None,
        };
        HostColumn::from_bytes(self.dtype, data, self.len, validity)
    }

    /// Synchronize and download the values as `T`, ignoring the null mask.
    pub fn to_vec<T: NativeType>(&self) -> Result<Vec<T>, ColumnError> {
        self.to_host()?.values()
    }
}

impl fmt::Debug for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("dtype", &self.dtype)
            .field("len", &self.len)
            .field("nullable", &self.is_nullable())
            .field("data", &self.data)
            .finish()
    }
}
