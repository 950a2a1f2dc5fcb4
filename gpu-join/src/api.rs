//! Entry points with optional stream and memory resource.
//!
//! Callers that do not care where memory comes from or which stream the
//! work lands on get the process default resource and the default stream.

use gpu_columnar::Table;
use gpu_memory_manager::{default_resource, MemoryResourceRef, Stream};

use crate::error::JoinError;
use crate::join::JoinKind;

#[derive(Debug, Clone, Default)]
pub struct JoinOptions {
    memory_resource: Option<MemoryResourceRef>,
    stream: Option<Stream>,
}

impl JoinOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_memory_resource(mut self, mr: MemoryResourceRef) -> Self {
        self.memory_resource = Some(mr);
        self
    }

    pub fn with_stream(mut self, stream: Stream) -> Self {
        self.stream = Some(stream);
        self
    }

    /// The stream and resource a join with these options runs on.
    pub fn resolve(&self) -> Result<(Stream, MemoryResourceRef), JoinError> {
        let stream = match &self.stream {
            Some(stream) => stream.clone(),
            None => Stream::default_stream()?,
        };
        let mr = self.memory_resource.clone().unwrap_or_else(default_resource);
        Ok((stream, mr))
    }
}

pub fn join(kind: JoinKind, left: &Table, right: &Table, options: &JoinOptions) -> Result<Table, JoinError> {
    let (stream, mr) = options.resolve()?;
    kind.operator().join(left, right, &stream, &mr)
}

pub fn cross_join(left: &Table, right: &Table, options: &JoinOptions) -> Result<Table, JoinError> {
    join(JoinKind::Cross, left, right, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpu_columnar::Column;
    use gpu_memory_manager::{HostMemoryResource, TrackingResource};
    use std::sync::Arc;

    #[test]
    fn defaults_resolve_to_process_defaults() {
        let (stream, mr) = JoinOptions::new().resolve().unwrap();
        assert!(stream.same_as(&Stream::default_stream().unwrap()));
        assert_eq!(mr.name(), default_resource().name());
    }

    #[test]
    fn explicit_resource_and_stream_are_used() {
        let stream = Stream::new().unwrap();
        let tracker = Arc::new(TrackingResource::new(Arc::new(HostMemoryResource::new())));
        let host: MemoryResourceRef = Arc::new(HostMemoryResource::new());

        let left = Table::new(vec![Column::from_slice(&[1i32, 2], &stream, &host).unwrap()]).unwrap();
        let right = Table::new(vec![Column::from_slice(&[true, false], &stream, &host).unwrap()]).unwrap();

        let options = JoinOptions::new()
            .with_stream(stream.clone())
            .with_memory_resource(tracker.clone());
        let out = cross_join(&left, &right, &options).unwrap();

        assert_eq!(out.num_rows(), 4);
        assert_eq!(tracker.live_allocations(), 2);
        assert!(out.column(0).unwrap().data().stream().same_as(&stream));

        drop(out);
        assert_eq!(tracker.live_allocations(), 0);
    }
}
