use gpu_memory_manager::{
    HostMemoryResource, LimitingResource, MemoryResourceRef, SlabAllocator, TrackingResource,
};
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

use crate::error::JoinError;

pub const MEMORY_RESOURCE_ENV: &str = "GPU_JOIN_MEMORY_RESOURCE";
pub const MAX_DEVICE_MEMORY_ENV: &str = "GPU_JOIN_MAX_DEVICE_MEMORY";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// Every allocation goes straight to the host allocator.
    Host,
    /// Slab pool with fixed size classes.
    Pool,
}

impl FromStr for ResourceKind {
    type Err = JoinError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "host" => Ok(ResourceKind::Host),
            "pool" | "slab" => Ok(ResourceKind::Pool),
            other => Err(JoinError::Config(format!("unknown memory resource '{other}'"))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Allocator backing device memory
    pub memory_resource: ResourceKind,
    /// Maximum device memory to use (bytes), unbounded when `None`
    pub max_device_memory: Option<usize>,
    /// Slab classes for `ResourceKind::Pool`
    pub slab_sizes: Vec<usize>,
    pub max_slabs_per_class: usize,
    /// Wrap the resource in a `TrackingResource`
    pub track_allocations: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            memory_resource: ResourceKind::Host,
            max_device_memory: None,
            slab_sizes: vec![
                4 * 1024,          // 4KB
                64 * 1024,         // 64KB
                1024 * 1024,       // 1MB
                16 * 1024 * 1024,  // 16MB
                256 * 1024 * 1024, // 256MB
            ],
            max_slabs_per_class: 64,
            track_allocations: false,
        }
    }
}

/// A resource stack built from an [`EngineConfig`].
#[derive(Debug, Clone)]
pub struct BuiltResource {
    pub resource: MemoryResourceRef,
    pub tracker: Option<Arc<TrackingResource>>,
}

impl EngineConfig {
    /// Defaults overridden by `GPU_JOIN_MEMORY_RESOURCE` and
    /// `GPU_JOIN_MAX_DEVICE_MEMORY`.
    pub fn from_env() -> Result<Self, JoinError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, JoinError> {
        let mut config = Self::default();

        if let Some(kind) = lookup(MEMORY_RESOURCE_ENV) {
            config.memory_resource = kind.parse()?;
        }
        if let Some(limit) = lookup(MAX_DEVICE_MEMORY_ENV) {
            let limit = limit.trim().parse::<usize>().map_err(|e| {
                JoinError::Config(format!("{MAX_DEVICE_MEMORY_ENV}='{limit}': {e}"))
            })?;
            config.max_device_memory = Some(limit);
        }

        Ok(config)
    }

    /// Base allocator, then the memory cap, then tracking outermost.
    pub fn build_resource(&self) -> BuiltResource {
        let mut resource: MemoryResourceRef = match self.memory_resource {
            ResourceKind::Host => Arc::new(HostMemoryResource::new()),
            ResourceKind::Pool => Arc::new(SlabAllocator::new(&self.slab_sizes, self.max_slabs_per_class)),
        };

        if let Some(limit) = self.max_device_memory {
            resource = Arc::new(LimitingResource::new(resource, limit));
        }

        let tracker = self.track_allocations.then(|| Arc::new(TrackingResource::new(resource.clone())));
        if let Some(tracker) = &tracker {
            resource = tracker.clone();
        }

        info!(
            "Built memory resource: {:?}, limit {:?}, tracking {}",
            self.memory_resource, self.max_device_memory, self.track_allocations
        );
        BuiltResource { resource, tracker }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn env_overrides_defaults() {
        let config = EngineConfig::from_lookup(lookup(&[
            (MEMORY_RESOURCE_ENV, "Pool"),
            (MAX_DEVICE_MEMORY_ENV, "1048576"),
        ]))
        .unwrap();

        assert_eq!(config.memory_resource, ResourceKind::Pool);
        assert_eq!(config.max_device_memory, Some(1 << 20));
        assert_eq!(config.slab_sizes, EngineConfig::default().slab_sizes);
    }

    #[test]
    fn bad_env_values_are_config_errors() {
        assert!(matches!(
            EngineConfig::from_lookup(lookup(&[(MEMORY_RESOURCE_ENV, "managed")])),
            Err(JoinError::Config(_))
        ));
        assert!(matches!(
            EngineConfig::from_lookup(lookup(&[(MAX_DEVICE_MEMORY_ENV, "lots")])),
            Err(JoinError::Config(_))
        ));
    }

    #[test]
    fn resource_stack_order() {
        let config = EngineConfig {
            memory_resource: ResourceKind::Pool,
            max_device_memory: Some(4096),
            track_allocations: true,
            ..EngineConfig::default()
        };
        let built = config.build_resource();

        assert_eq!(built.resource.name(), "tracking");
        assert!(built.tracker.is_some());

        let plain = EngineConfig::default().build_resource();
        assert_eq!(plain.resource.name(), "host");
        assert!(plain.tracker.is_none());
    }
}
