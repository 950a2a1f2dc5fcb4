use parking_lot::Mutex;
use std::collections::VecDeque;
use tracing::{debug, info, warn};

use crate::error::MemoryError;
use crate::resource::{DevicePtr, MemoryResource};
use crate::stream::Stream;

/// Slab allocator for device memory
///
/// Serves requests from fixed-size slab classes (the smallest class that
/// fits) and keeps freed slabs for reuse, trading some internal
/// fragmentation for allocation speed. Contents of a reused slab are
/// unspecified.
#[derive(Debug)]
pub struct SlabAllocator {
    slab_classes: Vec<SlabClass>,
}

#[derive(Debug)]
struct SlabClass {
    size: usize,
    free_slabs: Mutex<VecDeque<DevicePtr>>,
    max_slabs: usize,
    allocated_count: Mutex<usize>,
}

impl SlabAllocator {
    pub fn new(slab_sizes: &[usize], max_slabs_per_class: usize) -> Self {
        let mut sizes = slab_sizes.to_vec();
        sizes.sort_unstable();
        sizes.dedup();

        info!("Initializing Slab Allocator");
        info!("  Slab sizes: {:?}", sizes);
        info!("  Max slabs per class: {}", max_slabs_per_class);

        let slab_classes = sizes
            .into_iter()
            .map(|size| SlabClass {
                size,
                free_slabs: Mutex::new(VecDeque::new()),
                max_slabs: max_slabs_per_class,
                allocated_count: Mutex::new(0),
            })
            .collect();

        Self { slab_classes }
    }

    pub fn slab_sizes(&self) -> Vec<usize> {
        self.slab_classes.iter().map(|class| class.size).collect()
    }

    /// Slabs of class `class_idx` currently handed out or pooled.
    pub fn allocated_slabs(&self, class_idx: usize) -> usize {
        self.slab_classes
            .get(class_idx)
            .map_or(0, |class| *class.allocated_count.lock())
    }

    /// Slabs of class `class_idx` waiting for reuse.
    pub fn pooled_slabs(&self, class_idx: usize) -> usize {
        self.slab_classes
            .get(class_idx)
            .map_or(0, |class| class.free_slabs.lock().len())
    }

    /// Index of the smallest slab class that fits `size`.
    pub fn find_slab_class(&self, size: usize) -> Result<usize, MemoryError> {
        self.slab_classes
            .iter()
            .position(|class| class.size >= size)
            .ok_or_else(|| MemoryError::ExceedsSlabSize {
                requested: size,
                largest: self.slab_classes.last().map_or(0, |class| class.size),
            })
    }

    fn allocate_new_slab(&self, class: &SlabClass, class_idx: usize) -> Result<DevicePtr, MemoryError> {
        let mut count = class.allocated_count.lock();

        if *count >= class.max_slabs {
            return Err(MemoryError::SlabClassExhausted {
                class: class_idx,
                max_slabs: class.max_slabs,
            });
        }

        debug!("Allocating new slab for class {} (size {})", class_idx, class.size);
        *count += 1;

        Ok(DevicePtr::zeroed(class.size))
    }
}

impl MemoryResource for SlabAllocator {
    fn allocate(&self, bytes: usize, _stream: &Stream) -> Result<DevicePtr, MemoryError> {
        if bytes == 0 {
            return Ok(DevicePtr::zeroed(0));
        }

        let class_idx = self.find_slab_class(bytes)?;
        let class = &self.slab_classes[class_idx];

        let reused = class.free_slabs.lock().pop_front();
        match reused {
            Some(ptr) => {
                debug!("Reusing slab from class {} (size {})", class_idx, class.size);
                Ok(ptr)
            }
            None => self.allocate_new_slab(class, class_idx),
        }
    }

    fn deallocate(&self, ptr: DevicePtr, bytes: usize, stream: &Stream) {
        if bytes == 0 {
            return;
        }

        let class_idx = match self.find_slab_class(bytes) {
            Ok(idx) => idx,
            Err(err) => {
                warn!("Dropping allocation not owned by this slab allocator: {}", err);
                return;
            }
        };
        let class = &self.slab_classes[class_idx];

        if ptr.is_unreferenced() {
            debug!("Returning slab to pool (class {})", class_idx);
            class.free_slabs.lock().push_back(ptr);
        } else {
            // Pending work on the stream still reads or writes this slab, so
            // it cannot be handed out again; the work releases the memory.
            debug!(
                "Freeing slab (not pooling) from class {}: still in use on stream {}",
                class_idx,
                stream.id()
            );
            *class.allocated_count.lock() -= 1;
        }
    }

    fn name(&self) -> &str {
        "slab"
    }
}

impl Drop for SlabAllocator {
    fn drop(&mut self) {
        info!("Shutting down Slab Allocator");

        for (idx, class) in self.slab_classes.iter().enumerate() {
            let free_slabs = class.free_slabs.lock();
            info!(
                "  Class {}: {} free slabs, {} allocated",
                idx,
                free_slabs.len(),
                *class.allocated_count.lock()
            );
        }
    }
}
