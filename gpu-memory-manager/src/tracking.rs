//! Resource adaptors that observe or bound an upstream resource.

use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, warn};

use crate::error::MemoryError;
use crate::resource::{DevicePtr, MemoryResource, MemoryResourceRef};
use crate::stream::Stream;

/// Snapshot of a [`TrackingResource`]'s counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocationStats {
    pub live_allocations: usize,
    pub live_bytes: usize,
    pub peak_bytes: usize,
    pub total_allocations: usize,
}

/// Records every allocation that passes through to `upstream`.
#[derive(Debug)]
pub struct TrackingResource {
    upstream: MemoryResourceRef,
    live: DashMap<u64, usize>,
    live_bytes: AtomicUsize,
    peak_bytes: AtomicUsize,
    total_allocations: AtomicUsize,
}

impl TrackingResource {
    pub fn new(upstream: MemoryResourceRef) -> Self {
        Self {
            upstream,
            live: DashMap::new(),
            live_bytes: AtomicUsize::new(0),
            peak_bytes: AtomicUsize::new(0),
            total_allocations: AtomicUsize::new(0),
        }
    }

    pub fn live_allocations(&self) -> usize {
        self.live.len()
    }

    pub fn live_bytes(&self) -> usize {
        self.live_bytes.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> AllocationStats {
        AllocationStats {
            live_allocations: self.live.len(),
            live_bytes: self.live_bytes.load(Ordering::Acquire),
            peak_bytes: self.peak_bytes.load(Ordering::Acquire),
            total_allocations: self.total_allocations.load(Ordering::Acquire),
        }
    }
}

impl MemoryResource for TrackingResource {
    fn allocate(&self, bytes: usize, stream: &Stream) -> Result<DevicePtr, MemoryError> {
        let ptr = self.upstream.allocate(bytes, stream)?;

        self.live.insert(ptr.address(), bytes);
        let now = self.live_bytes.fetch_add(bytes, Ordering::AcqRel) + bytes;
        self.peak_bytes.fetch_max(now, Ordering::AcqRel);
        self.total_allocations.fetch_add(1, Ordering::AcqRel);

        Ok(ptr)
    }

    fn deallocate(&self, ptr: DevicePtr, bytes: usize, stream: &Stream) {
        match self.live.remove(&ptr.address()) {
            Some((_, recorded)) => {
                if recorded != bytes {
                    warn!(
                        "Deallocation size {} differs from allocation size {} at {:?}",
                        bytes, recorded, ptr
                    );
                }
                self.live_bytes.fetch_sub(recorded, Ordering::AcqRel);
            }
            None => warn!("Deallocating untracked allocation {:?}", ptr),
        }
        self.upstream.deallocate(ptr, bytes, stream);
    }

    fn name(&self) -> &str {
        "tracking"
    }
}

/// Fails allocations that would push live bytes above `limit`.
#[derive(Debug)]
pub struct LimitingResource {
    upstream: MemoryResourceRef,
    limit: usize,
    used: AtomicUsize,
}

impl LimitingResource {
    pub fn new(upstream: MemoryResourceRef, limit: usize) -> Self {
        Self {
            upstream,
            limit,
            used: AtomicUsize::new(0),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn used(&self) -> usize {
        self.used.load(Ordering::Acquire)
    }

    fn reserve(&self, bytes: usize) -> Result<(), MemoryError> {
        self.used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                used.checked_add(bytes).filter(|&total| total <= self.limit)
            })
            .map(|_| ())
            .map_err(|used| MemoryError::OutOfMemory {
                resource: self.name().to_string(),
                requested: bytes,
                available: self.limit.saturating_sub(used),
            })
    }
}

impl MemoryResource for LimitingResource {
    fn allocate(&self, bytes: usize, stream: &Stream) -> Result<DevicePtr, MemoryError> {
        self.reserve(bytes)?;
        match self.upstream.allocate(bytes, stream) {
            Ok(ptr) => Ok(ptr),
            Err(err) => {
                self.used.fetch_sub(bytes, Ordering::AcqRel);
                Err(err)
            }
        }
    }

    fn deallocate(&self, ptr: DevicePtr, bytes: usize, stream: &Stream) {
        debug!("limit: releasing {} of {} bytes", bytes, self.used());
        self.used.fetch_sub(bytes, Ordering::AcqRel);
        self.upstream.deallocate(ptr, bytes, stream);
    }

    fn name(&self) -> &str {
        "limiting"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::HostMemoryResource;
    use std::sync::Arc;

    #[test]
    fn tracking_counts_live_and_peak() {
        let stream = Stream::new().unwrap();
        let tracker = TrackingResource::new(Arc::new(HostMemoryResource::new()));

        let a = tracker.allocate(100, &stream).unwrap();
        let b = tracker.allocate(50, &stream).unwrap();
        assert_eq!(tracker.live_allocations(), 2);
        assert_eq!(tracker.live_bytes(), 150);

        tracker.deallocate(a, 100, &stream);
        let c = tracker.allocate(10, &stream).unwrap();

        assert_eq!(
            tracker.stats(),
            AllocationStats {
                live_allocations: 2,
                live_bytes: 60,
                peak_bytes: 150,
                total_allocations: 3,
            }
        );

        tracker.deallocate(b, 50, &stream);
        tracker.deallocate(c, 10, &stream);
        assert_eq!(tracker.live_allocations(), 0);
        assert_eq!(tracker.live_bytes(), 0);
    }

    #[test]
    fn limit_rejects_and_recovers() {
        let stream = Stream::new().unwrap();
        let limited = LimitingResource::new(Arc::new(HostMemoryResource::new()), 128);

        let a = limited.allocate(100, &stream).unwrap();
        let err = limited.allocate(64, &stream).unwrap_err();
        assert_eq!(
            err,
            MemoryError::OutOfMemory {
                resource: "limiting".into(),
                requested: 64,
                available: 28,
            }
        );
        assert_eq!(limited.used(), 100);

        limited.deallocate(a, 100, &stream);
        let b = limited.allocate(128, &stream).unwrap();
        assert_eq!(limited.used(), 128);
        limited.deallocate(b, 128, &stream);
    }

    #[test]
    fn upstream_failure_releases_reservation() {
        let stream = Stream::new().unwrap();
        let inner: MemoryResourceRef = Arc::new(LimitingResource::new(
            Arc::new(HostMemoryResource::new()),
            10,
        ));
        let outer = LimitingResource::new(inner, 1000);

        assert!(outer.allocate(20, &stream).is_err());
        assert_eq!(outer.used(), 0);
    }
}
