use gpu_columnar::Table;
use gpu_memory_manager::{AllocationStats, MemoryResourceRef, Stream, TrackingResource};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::error::JoinError;
use crate::join::JoinKind;

/// Runs joins on a private stream with a resource built from an
/// [`EngineConfig`].
///
/// Several executors can run side by side; each owns its own stream, so
/// their work proceeds concurrently.
#[derive(Debug)]
pub struct JoinExecutor {
    config: EngineConfig,
    resource: MemoryResourceRef,
    tracker: Option<Arc<TrackingResource>>,
    stream: Stream,
}

impl JoinExecutor {
    pub fn new(config: EngineConfig) -> Result<Self, JoinError> {
        let built = config.build_resource();
        let stream = Stream::new()?;
        info!("Join executor ready on stream {} using '{}'", stream.id(), built.resource.name());

        Ok(Self {
            config,
            resource: built.resource,
            tracker: built.tracker,
            stream,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn stream(&self) -> &Stream {
        &self.stream
    }

    pub fn memory_resource(&self) -> &MemoryResourceRef {
        &self.resource
    }

    /// `None` unless the config enabled allocation tracking.
    pub fn allocation_stats(&self) -> Option<AllocationStats> {
        self.tracker.as_ref().map(|tracker| tracker.stats())
    }

    /// Issue the join and return without waiting for the device.
    pub fn submit(&self, kind: JoinKind, left: &Table, right: &Table) -> Result<Table, JoinError> {
        debug!("Submitting {} join on stream {}", kind, self.stream.id());
        kind.operator().join(left, right, &self.stream, &self.resource)
    }

    /// Issue the join and wait for its device work to finish.
    pub async fn execute(&self, kind: JoinKind, left: &Table, right: &Table) -> Result<Table, JoinError> {
        let result = self.submit(kind, left, right)?;
        self.stream.synchronize_async().await?;
        debug!("{} join complete: {} rows", kind, result.num_rows());
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpu_columnar::Column;

    #[tokio::test]
    async fn executes_with_tracking() {
        let config = EngineConfig {
            track_allocations: true,
            ..EngineConfig::default()
        };
        let executor = JoinExecutor::new(config).unwrap();
        let (stream, mr) = (executor.stream(), executor.memory_resource());

        let left = Table::new(vec![Column::from_slice(&[1i64, 2, 3], stream, mr).unwrap()]).unwrap();
        let right = Table::new(vec![Column::from_options(&[Some(1.5f64), None], stream, mr).unwrap()]).unwrap();

        let out = executor.execute(JoinKind::Cross, &left, &right).await.unwrap();
        assert_eq!(out.num_rows(), 6);
        assert_eq!(executor.stream().pending(), 0);

        // inputs hold three buffers, the output three more
        assert_eq!(executor.allocation_stats().unwrap().live_allocations, 6);
        drop(out);
        assert_eq!(executor.allocation_stats().unwrap().live_allocations, 3);
    }

    #[tokio::test]
    async fn invalid_arguments_fail_before_submission() {
        let executor = JoinExecutor::new(EngineConfig::default()).unwrap();
        let empty = Table::new(Vec::new()).unwrap();

        let err = executor.execute(JoinKind::Cross, &empty, &empty).await.unwrap_err();
        assert!(matches!(err, JoinError::InvalidArgument(_)));
        assert_eq!(executor.stream().stats().enqueued, 0);
    }
}
