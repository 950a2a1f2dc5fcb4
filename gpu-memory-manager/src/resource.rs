//! The device memory resource abstraction.
//!
//! Every device allocation made by the engine goes through a
//! [`MemoryResource`] chosen by the caller, so pooling, limiting and
//! accounting strategies can be layered without the operators knowing.

use once_cell::sync::Lazy;
use parking_lot::{
    MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLock, RwLockReadGuard, RwLockWriteGuard,
};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::MemoryError;
use crate::stream::Stream;

/// Shared, type-erased handle to a memory resource.
pub type MemoryResourceRef = Arc<dyn MemoryResource>;

type Storage = Arc<RwLock<Box<[u8]>>>;

static NEXT_ADDRESS: AtomicU64 = AtomicU64::new(0x7f00_0000_0000);

static DEFAULT_RESOURCE: Lazy<RwLock<MemoryResourceRef>> =
    Lazy::new(|| RwLock::new(Arc::new(HostMemoryResource::new())));

/// An allocate/deallocate capability for device memory.
///
/// Implementations must be safe to call concurrently from any thread and for
/// any stream. `stream` names the queue on which the memory will be used;
/// resources may use it to order reuse, the simple ones ignore it.
pub trait MemoryResource: Send + Sync + fmt::Debug {
    fn allocate(&self, bytes: usize, stream: &Stream) -> Result<DevicePtr, MemoryError>;

    /// Return an allocation. `bytes` is the size originally requested.
    fn deallocate(&self, ptr: DevicePtr, bytes: usize, stream: &Stream);

    fn name(&self) -> &str;
}

/// One allocation handed out by a memory resource.
///
/// Not `Clone`: whoever holds the `DevicePtr` is responsible for giving it
/// back through [`MemoryResource::deallocate`].
pub struct DevicePtr {
    address: u64,
    storage: Storage,
}

impl DevicePtr {
    /// Back a fresh allocation of `capacity` zeroed bytes.
    pub fn zeroed(capacity: usize) -> Self {
        let stride = capacity.max(1).next_multiple_of(256) as u64;
        let address = NEXT_ADDRESS.fetch_add(stride, Ordering::Relaxed);
        Self {
            address,
            storage: Arc::new(RwLock::new(vec![0u8; capacity].into_boxed_slice())),
        }
    }

    /// Simulated device address; unique among live allocations.
    pub fn address(&self) -> u64 {
        self.address
    }

    /// Bytes of backing storage, which may exceed the requested size.
    pub fn capacity(&self) -> usize {
        self.storage.read().len()
    }

    /// True when no enqueued work still references this memory.
    pub fn is_unreferenced(&self) -> bool {
        Arc::strong_count(&self.storage) == 1
    }

    pub(crate) fn view(&self, len: usize) -> DeviceView {
        DeviceView {
            address: self.address,
            len,
            storage: Arc::clone(&self.storage),
        }
    }
}

impl fmt::Debug for DevicePtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DevicePtr({:#x})", self.address)
    }
}

/// Non-owning view of device memory captured by enqueued work.
///
/// A view keeps the backing storage alive until the work holding it has
/// run, the way an in-flight kernel keeps using a raw device pointer. It
/// confers no ownership: the allocation is still returned to its resource
/// when the owning buffer is dropped.
#[derive(Clone)]
pub struct DeviceView {
    address: u64,
    len: usize,
    storage: Storage,
}

impl DeviceView {
    pub fn address(&self) -> u64 {
        self.address
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Never hold a read and a write guard on the same view at once.
    pub fn read(&self) -> MappedRwLockReadGuard<'_, [u8]> {
        let len = self.len;
        RwLockReadGuard::map(self.storage.read(), move |bytes| &bytes[..len])
    }

    pub fn write(&self) -> MappedRwLockWriteGuard<'_, [u8]> {
        let len = self.len;
        RwLockWriteGuard::map(self.storage.write(), move |bytes| &mut bytes[..len])
    }
}

impl fmt::Debug for DeviceView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceView({:#x}, {} bytes)", self.address, self.len)
    }
}

/// Plain allocator: every request gets fresh zeroed memory, every
/// deallocation frees it.
#[derive(Debug, Default)]
pub struct HostMemoryResource;

impl HostMemoryResource {
    pub fn new() -> Self {
        Self
    }
}

impl MemoryResource for HostMemoryResource {
    fn allocate(&self, bytes: usize, stream: &Stream) -> Result<DevicePtr, MemoryError> {
        let ptr = DevicePtr::zeroed(bytes);
        debug!("host: allocated {} bytes at {:?} for stream {}", bytes, ptr, stream.id());
        Ok(ptr)
    }

    fn deallocate(&self, ptr: DevicePtr, bytes: usize, stream: &Stream) {
        debug!("host: freed {} bytes at {:?} on stream {}", bytes, ptr, stream.id());
    }

    fn name(&self) -> &str {
        "host"
    }
}

/// The process-wide default resource.
///
/// Valid for the lifetime of the process. It starts as a
/// [`HostMemoryResource`] and can be replaced with
/// [`set_default_resource`]. Operators never consult it on their own: only
/// convenience entry points that accept an optional resource fall back to it.
pub fn default_resource() -> MemoryResourceRef {
    DEFAULT_RESOURCE.read().clone()
}

/// Swap the process-wide default resource, returning the previous one.
///
/// Buffers already allocated keep a reference to the resource that
/// allocated them, so swapping never strands live memory.
pub fn set_default_resource(resource: MemoryResourceRef) -> MemoryResourceRef {
    info!("Default memory resource set to '{}'", resource.name());
    std::mem::replace(&mut *DEFAULT_RESOURCE.write(), resource)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_allocations_are_zeroed_and_distinct() {
        let stream = Stream::new().unwrap();
        let mr = HostMemoryResource::new();

        let a = mr.allocate(64, &stream).unwrap();
        let b = mr.allocate(64, &stream).unwrap();

        assert_ne!(a.address(), b.address());
        assert_eq!(a.capacity(), 64);
        assert!(a.view(64).read().iter().all(|&byte| byte == 0));

        mr.deallocate(a, 64, &stream);
        mr.deallocate(b, 64, &stream);
    }

    #[test]
    fn views_share_storage_and_respect_length() {
        let ptr = DevicePtr::zeroed(16);
        let view = ptr.view(8);
        assert!(!ptr.is_unreferenced());

        view.write().copy_from_slice(&[7u8; 8]);
        let whole = ptr.view(16);
        assert_eq!(&whole.read()[..8], &[7u8; 8]);
        assert_eq!(&whole.read()[8..], &[0u8; 8]);

        drop(view);
        drop(whole);
        assert!(ptr.is_unreferenced());
    }

    #[test]
    fn default_resource_can_be_swapped() {
        #[derive(Debug)]
        struct Named;
        impl MemoryResource for Named {
            fn allocate(&self, bytes: usize, _: &Stream) -> Result<DevicePtr, MemoryError> {
                Ok(DevicePtr::zeroed(bytes))
            }
            fn deallocate(&self, _: DevicePtr, _: usize, _: &Stream) {}
            fn name(&self) -> &str {
                "named"
            }
        }

        let previous = set_default_resource(Arc::new(Named));
        assert_eq!(default_resource().name(), "named");
        set_default_resource(previous);
        assert_ne!(default_resource().name(), "named");
    }
}
