//! Owning device buffers.

use std::fmt;
use tracing::debug;

use crate::error::{DeviceError, MemoryError};
use crate::resource::{DevicePtr, DeviceView, MemoryResourceRef};
use crate::stream::Stream;

/// A single-owner, untyped device allocation.
///
/// The buffer remembers the resource that allocated it and returns the
/// memory there when dropped. It is move-only: handing a buffer to someone
/// else transfers ownership, there is no way to obtain a second owner.
pub struct DeviceBuffer {
    ptr: Option<DevicePtr>,
    size: usize,
    stream: Stream,
    mr: MemoryResourceRef,
}

impl DeviceBuffer {
    /// Allocate `size` bytes from `mr` for use on `stream`. Contents are
    /// unspecified until written.
    pub fn new(size: usize, stream: &Stream, mr: &MemoryResourceRef) -> Result<Self, MemoryError> {
        let ptr = mr.allocate(size, stream)?;
        Ok(Self {
            ptr: Some(ptr),
            size,
            stream: stream.clone(),
            mr: mr.clone(),
        })
    }

    /// Allocate and enqueue a host-to-device copy of `bytes` on `stream`.
    pub fn from_host(bytes: &[u8], stream: &Stream, mr: &MemoryResourceRef) -> Result<Self, MemoryError> {
        let buffer = Self::new(bytes.len(), stream, mr)?;
        if !bytes.is_empty() {
            let src = bytes.to_vec();
            let dst = buffer.view();
            stream.enqueue("copy_htod", move || {
                dst.write().copy_from_slice(&src);
                Ok(())
            });
        }
        Ok(buffer)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn address(&self) -> u64 {
        self.ptr.as_ref().map_or(0, DevicePtr::address)
    }

    /// The stream this buffer's memory was last associated with.
    pub fn stream(&self) -> &Stream {
        &self.stream
    }

    /// Associate the buffer with another stream; its deallocation is then
    /// reported on that stream.
    pub fn set_stream(&mut self, stream: &Stream) {
        self.stream = stream.clone();
    }

    pub fn memory_resource(&self) -> &MemoryResourceRef {
        &self.mr
    }

    /// Kernel-side view of the whole buffer.
    pub fn view(&self) -> DeviceView {
        match &self.ptr {
            Some(ptr) => ptr.view(self.size),
            None => DevicePtr::zeroed(0).view(0),
        }
    }

    /// Synchronize the buffer's stream and copy its contents to the host.
    pub fn to_host(&self) -> Result<Vec<u8>, DeviceError> {
        self.stream.synchronize()?;
        Ok(self.view().read().to_vec())
    }
}

impl Drop for DeviceBuffer {
    fn drop(&mut self) {
        if let Some(ptr) = self.ptr.take() {
            self.mr.deallocate(ptr, self.size, &self.stream);
        }
    }
}

impl fmt::Debug for DeviceBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceBuffer")
            .field("address", &format_args!("{:#x}", self.address()))
            .field("size", &self.size)
            .field("stream", &self.stream.id())
            .field("resource", &self.mr.name())
            .finish()
    }
}

/// Enqueue a device-to-device copy of `src` into `dst` on `stream`.
///
/// Panics inside the copy (a length mismatch) surface as a kernel failure
/// at the next synchronization.
pub fn copy_async(dst: &DeviceBuffer, src: &DeviceBuffer, stream: &Stream) {
    let (dst, src) = (dst.view(), src.view());
    debug!("copy_dtod: {} bytes on stream {}", src.len(), stream.id());
    stream.enqueue("copy_dtod", move || {
        if dst.len() != src.len() {
            return Err(DeviceError::kernel(
                "copy_dtod",
                format!("destination holds {} bytes, source {}", dst.len(), src.len()),
            ));
        }
        let bytes = src.read().to_vec();
        dst.write().copy_from_slice(&bytes);
        Ok(())
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::HostMemoryResource;
    use crate::tracking::TrackingResource;
    use std::sync::Arc;

    #[test]
    fn host_round_trip() {
        let stream = Stream::new().unwrap();
        let mr: MemoryResourceRef = Arc::new(HostMemoryResource::new());

        let buffer = DeviceBuffer::from_host(&[1, 2, 3, 4], &stream, &mr).unwrap();
        assert_eq!(buffer.size(), 4);
        assert_eq!(buffer.to_host().unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn drop_returns_memory_to_its_resource() {
        let stream = Stream::new().unwrap();
        let tracker = Arc::new(TrackingResource::new(Arc::new(HostMemoryResource::new())));
        let mr: MemoryResourceRef = tracker.clone();

        let buffer = DeviceBuffer::new(256, &stream, &mr).unwrap();
        assert_eq!(tracker.live_bytes(), 256);

        let moved = buffer;
        assert_eq!(tracker.live_allocations(), 1);
        drop(moved);
        assert_eq!(tracker.live_allocations(), 0);
    }

    #[test]
    fn device_copy_is_stream_ordered() {
        let stream = Stream::new().unwrap();
        let mr: MemoryResourceRef = Arc::new(HostMemoryResource::new());

        let src = DeviceBuffer::from_host(&[9, 8, 7], &stream, &mr).unwrap();
        let dst = DeviceBuffer::new(3, &stream, &mr).unwrap();
        copy_async(&dst, &src, &stream);
        drop(src);

        assert_eq!(dst.to_host().unwrap(), vec![9, 8, 7]);
    }

    #[test]
    fn mismatched_copy_fails_at_synchronize() {
        let stream = Stream::new().unwrap();
        let mr: MemoryResourceRef = Arc::new(HostMemoryResource::new());

        let src = DeviceBuffer::from_host(&[1, 2], &stream, &mr).unwrap();
        let dst = DeviceBuffer::new(3, &stream, &mr).unwrap();
        copy_async(&dst, &src, &stream);

        let err = dst.to_host().unwrap_err();
        assert!(matches!(err, DeviceError::KernelFailed { .. }));
    }
}
