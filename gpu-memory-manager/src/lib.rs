//! Device memory plumbing shared by every operator.
//!
//! - [`MemoryResource`]: the allocate/deallocate contract callers inject.
//! - [`DeviceBuffer`]: single-owner allocation that frees itself on drop.
//! - [`Stream`]: ordered queue on which all device work is enqueued.

pub mod buffer;
pub mod error;
pub mod resource;
pub mod slab_allocator;
pub mod stream;
pub mod tracking;

pub use buffer::{copy_async, DeviceBuffer};
pub use error::{DeviceError, MemoryError};
pub use resource::{
    default_resource, set_default_resource, DevicePtr, DeviceView, HostMemoryResource,
    MemoryResource, MemoryResourceRef,
};
pub use slab_allocator::SlabAllocator;
pub use stream::{Stream, StreamStats};
pub use tracking::{AllocationStats, LimitingResource, TrackingResource};
