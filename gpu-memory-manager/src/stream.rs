//! Ordered execution streams.
//!
//! A [`Stream`] is an ordering token for device work: commands enqueued on
//! one stream run strictly in submission order on that stream's worker,
//! while separate streams run concurrently. Enqueueing never waits for the
//! work to finish; callers that need results (or errors) must call
//! [`Stream::synchronize`].
//!
//! A command that fails (or panics) poisons the stream: queued commands are
//! discarded, later submissions are dropped, and every `synchronize` returns
//! the error until an owner calls [`Stream::clear_error`]. Work discarded on
//! a shared stream therefore never reads back as a successful result.

use once_cell::sync::OnceCell;
use parking_lot::{Condvar, Mutex};
use std::any::Any;
use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use tracing::{debug, info, warn};

use crate::error::DeviceError;

static NEXT_STREAM_ID: AtomicU64 = AtomicU64::new(1);
static DEFAULT_STREAM: OnceCell<Stream> = OnceCell::new();

type Work = Box<dyn FnOnce() -> Result<(), DeviceError> + Send + 'static>;

struct Command {
    label: String,
    work: Work,
}

#[derive(Default)]
struct QueueState {
    queue: VecDeque<Command>,
    busy: bool,
    closed: bool,
    error: Option<DeviceError>,
    stats: StreamStats,
}

struct Shared {
    id: u64,
    state: Mutex<QueueState>,
    work_ready: Condvar,
    drained: Condvar,
}

struct StreamHandle {
    shared: Arc<Shared>,
    worker_thread: ThreadId,
    worker: Option<JoinHandle<()>>,
}

/// Counters describing what a stream has processed so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub enqueued: u64,
    pub completed: u64,
    /// Commands dropped because an earlier command on the stream failed.
    pub discarded: u64,
}

/// Handle to an ordered command queue. Cloning yields another handle to the
/// same queue; the worker shuts down once the last handle is dropped and
/// the remaining work has drained.
#[derive(Clone)]
pub struct Stream {
    inner: Arc<StreamHandle>,
}

impl Stream {
    pub fn new() -> Result<Self, DeviceError> {
        let id = NEXT_STREAM_ID.fetch_add(1, Ordering::Relaxed);
        let shared = Arc::new(Shared {
            id,
            state: Mutex::new(QueueState::default()),
            work_ready: Condvar::new(),
            drained: Condvar::new(),
        });

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name(format!("gpu-stream-{id}"))
            .spawn(move || worker_loop(worker_shared))
            .map_err(|err| DeviceError::StreamCreation(err.to_string()))?;

        debug!("Created stream {}", id);

        Ok(Self {
            inner: Arc::new(StreamHandle {
                shared,
                worker_thread: worker.thread().id(),
                worker: Some(worker),
            }),
        })
    }

    /// The process-wide default stream.
    ///
    /// Created on first use and kept alive for the lifetime of the process.
    /// It is a convenience for callers that do not manage their own streams;
    /// every operation in this workspace also accepts an explicit stream.
    pub fn default_stream() -> Result<Stream, DeviceError> {
        DEFAULT_STREAM
            .get_or_try_init(|| {
                info!("Creating process-wide default stream");
                Stream::new()
            })
            .cloned()
    }

    pub fn id(&self) -> u64 {
        self.inner.shared.id
    }

    /// True when both handles refer to the same command queue.
    pub fn same_as(&self, other: &Stream) -> bool {
        Arc::ptr_eq(&self.inner.shared, &other.inner.shared)
    }

    /// Enqueue `work` behind everything previously submitted to this stream.
    ///
    /// Returns immediately. If the stream holds a pending failure the
    /// command is dropped without running.
    pub fn enqueue<F>(&self, label: impl Into<String>, work: F)
    where
        F: FnOnce() -> Result<(), DeviceError> + Send + 'static,
    {
        let command = Command {
            label: label.into(),
            work: Box::new(work),
        };
        let shared = &self.inner.shared;

        let rejected = {
            let mut state = shared.state.lock();
            if state.error.is_some() {
                state.stats.discarded += 1;
                Some(command)
            } else {
                state.stats.enqueued += 1;
                state.queue.push_back(command);
                None
            }
        };

        match rejected {
            Some(command) => debug!(
                "Stream {} has a pending error, discarding `{}`",
                shared.id, command.label
            ),
            None => {
                shared.work_ready.notify_one();
            }
        }
    }

    /// Block until all work submitted so far has finished.
    ///
    /// Returns the stream's pending failure, if any. The failure stays in
    /// place, so every caller sharing the stream observes it, until
    /// [`Stream::clear_error`] is called.
    pub fn synchronize(&self) -> Result<(), DeviceError> {
        if thread::current().id() == self.inner.worker_thread {
            return Err(DeviceError::Runtime(format!(
                "stream {} cannot be synchronized from its own work",
                self.id()
            )));
        }

        let shared = &self.inner.shared;
        let mut state = shared.state.lock();
        while state.busy || !state.queue.is_empty() {
            shared.drained.wait(&mut state);
        }

        match &state.error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    /// Drop the pending failure so the stream accepts work again.
    ///
    /// Returns the failure that was cleared. Results whose work was
    /// discarded stay invalid; callers must recompute them.
    pub fn clear_error(&self) -> Option<DeviceError> {
        let err = self.inner.shared.state.lock().error.take();
        if let Some(err) = &err {
            info!("Stream {}: clearing failure `{}`", self.id(), err);
        }
        err
    }

    /// The pending failure, without waiting for queued work.
    pub fn error(&self) -> Option<DeviceError> {
        self.inner.shared.state.lock().error.clone()
    }

    /// [`Stream::synchronize`] without blocking the async runtime.
    pub async fn synchronize_async(&self) -> Result<(), DeviceError> {
        let stream = self.clone();
        tokio::task::spawn_blocking(move || stream.synchronize())
            .await
            .map_err(|err| DeviceError::Runtime(format!("synchronize task failed: {err}")))?
    }

    /// Number of commands queued or running.
    pub fn pending(&self) -> usize {
        let state = self.inner.shared.state.lock();
        state.queue.len() + usize::from(state.busy)
    }

    pub fn stats(&self) -> StreamStats {
        self.inner.shared.state.lock().stats
    }
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream").field("id", &self.id()).finish()
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.shared.state.lock().closed = true;
        self.shared.work_ready.notify_all();

        if let Some(worker) = self.worker.take() {
            // The last handle can be released by a command running on the
            // worker itself; it exits on its own once the queue is empty.
            if thread::current().id() == self.worker_thread {
                return;
            }
            if worker.join().is_err() {
                warn!("Stream {} worker terminated abnormally", self.shared.id);
            }
        }
        debug!("Stream {} shut down", self.shared.id);
    }
}

fn worker_loop(shared: Arc<Shared>) {
    loop {
        let Command { label, work } = {
            let mut state = shared.state.lock();
            loop {
                if let Some(command) = state.queue.pop_front() {
                    state.busy = true;
                    break command;
                }
                if state.closed {
                    return;
                }
                shared.work_ready.wait(&mut state);
            }
        };

        let outcome = match panic::catch_unwind(AssertUnwindSafe(work)) {
            Ok(result) => result,
            Err(payload) => Err(DeviceError::KernelFailed {
                kernel: label.clone(),
                stream: shared.id,
                message: panic_message(payload.as_ref()),
            }),
        };

        let discarded = {
            let mut state = shared.state.lock();
            state.busy = false;
            state.stats.completed += 1;

            let discarded = match outcome {
                Ok(()) => Vec::new(),
                Err(err) => {
                    let err = attach_stream(err, shared.id);
                    warn!("Stream {}: `{}` failed: {}", shared.id, label, err);
                    let discarded: Vec<Command> = state.queue.drain(..).collect();
                    state.stats.discarded += discarded.len() as u64;
                    state.error.get_or_insert(err);
                    discarded
                }
            };

            if state.queue.is_empty() {
                shared.drained.notify_all();
            }
            discarded
        };
        drop(discarded);
    }
}

fn attach_stream(err: DeviceError, id: u64) -> DeviceError {
    match err {
        DeviceError::KernelFailed {
            kernel, message, ..
        } => DeviceError::KernelFailed {
            kernel,
            stream: id,
            message,
        },
        other => other,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "kernel panicked".to_string()
    }
}
