//! Bounded worker pool for thumbnail generation.
//!
//! A fixed number of workers drain one shared FIFO queue. Each worker runs a
//! task to completion (extraction, compositing, encoding) before taking the
//! next one, so at most `workers` generations are ever in progress.
//!
//! ```text
//!  submit() ──► [ bounded queue ] ──► worker 0 ─┐
//!     │                           ──► worker 1 ─┼─► FrameSource ─► Compositor
//!     │                           ──► worker N ─┘
//!     ▼
//!  TaskHandle ◄──────────── oneshot reply ──────────────┘
//! ```
//!
//! The queue is bounded: when it is full, [`Dispatcher::submit`] fails with
//! [`ThumbnailError::QueueFull`] instead of buffering without limit.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::compositor::Compositor;
use crate::error::ThumbnailError;
use crate::media::FrameSource;

/// Default number of tasks that may wait in the queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Default deadline for a single frame extraction.
pub const DEFAULT_EXTRACT_TIMEOUT: Duration = Duration::from_secs(30);

/// Number of workers to start when none is configured.
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

// =============================================================================
// Task
// =============================================================================

/// One unit of generation work.
#[derive(Debug, Clone)]
pub struct Task {
    /// Source locator of the video
    pub key: String,

    /// When the task entered the queue
    pub submitted_at: Instant,
}

impl Task {
    /// Create a task for the given source locator.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            submitted_at: Instant::now(),
        }
    }
}

struct Job {
    task: Task,
    reply: oneshot::Sender<Result<Bytes, ThumbnailError>>,
}

/// Awaitable result of a submitted task.
///
/// Dropping the handle discards the result but does not cancel a task that a
/// worker has already started.
#[derive(Debug)]
pub struct TaskHandle {
    rx: oneshot::Receiver<Result<Bytes, ThumbnailError>>,
}

impl Future for TaskHandle {
    type Output = Result<Bytes, ThumbnailError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // A dropped reply means the worker pool went away mid-task
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.unwrap_or(Err(ThumbnailError::ShuttingDown)))
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// Sizing and limits for the worker pool.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Number of workers (at least 1)
    pub workers: usize,

    /// Maximum number of queued, not yet started tasks (at least 1)
    pub queue_capacity: usize,

    /// Deadline for frame extraction (None = wait indefinitely)
    pub extract_timeout: Option<Duration>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            workers: default_worker_count(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            extract_timeout: Some(DEFAULT_EXTRACT_TIMEOUT),
        }
    }
}

impl DispatcherConfig {
    /// Set the number of workers.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the queue capacity.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set or disable the extraction deadline.
    pub fn with_extract_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.extract_timeout = timeout;
        self
    }
}

/// Point-in-time view of the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DispatcherStats {
    /// Number of workers
    pub workers: usize,

    /// Tasks currently being generated
    pub active: usize,

    /// Tasks waiting for a worker
    pub queued: usize,

    /// Maximum number of waiting tasks
    pub queue_capacity: usize,
}

// =============================================================================
// Pipeline
// =============================================================================

/// The work a worker performs for one task.
struct Pipeline {
    source: Arc<dyn FrameSource>,
    compositor: Compositor,
    extract_timeout: Option<Duration>,
}

impl Pipeline {
    async fn run(self: Arc<Self>, key: String) -> Result<Bytes, ThumbnailError> {
        let extraction = self.source.extract_frame(&key);
        let frame = match self.extract_timeout {
            Some(limit) => tokio::time::timeout(limit, extraction).await.map_err(|_| {
                ThumbnailError::upstream(format!(
                    "frame extraction timed out after {}s",
                    limit.as_secs_f64()
                ))
            })??,
            None => extraction.await?,
        };

        // Resize and encode are CPU bound
        let compositor = self.compositor.clone();
        tokio::task::spawn_blocking(move || compositor.compose(frame))
            .await
            .map_err(|e| ThumbnailError::transform(format!("compositing task failed: {}", e)))?
    }
}

// =============================================================================
// Dispatcher
// =============================================================================

/// Fixed-size worker pool with a bounded FIFO queue.
///
/// # Example
///
/// ```ignore
/// use video_thumbnailer::thumbnail::{Compositor, Dispatcher, DispatcherConfig, Task};
///
/// let dispatcher = Dispatcher::start(source, Compositor::default(), DispatcherConfig::default());
/// let jpeg = dispatcher.submit(Task::new("https://example.com/a.mp4"))?.await?;
/// dispatcher.shutdown().await;
/// ```
pub struct Dispatcher {
    /// Queue entry point; `None` once shut down
    sender: Mutex<Option<mpsc::Sender<Job>>>,

    /// Worker tasks, joined on shutdown
    workers: tokio::sync::Mutex<Vec<JoinHandle<()>>>,

    /// Tasks currently inside a worker
    active: Arc<AtomicUsize>,

    worker_count: usize,
    queue_capacity: usize,
}

impl Dispatcher {
    /// Start the worker pool.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(
        source: Arc<dyn FrameSource>,
        compositor: Compositor,
        config: DispatcherConfig,
    ) -> Self {
        let worker_count = config.workers.max(1);
        let queue_capacity = config.queue_capacity.max(1);

        let (sender, receiver) = mpsc::channel(queue_capacity);
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let active = Arc::new(AtomicUsize::new(0));
        let pipeline = Arc::new(Pipeline {
            source,
            compositor,
            extract_timeout: config.extract_timeout,
        });

        let workers = (0..worker_count)
            .map(|id| {
                tokio::spawn(worker_loop(
                    id,
                    Arc::clone(&receiver),
                    Arc::clone(&pipeline),
                    Arc::clone(&active),
                ))
            })
            .collect();

        info!(
            workers = worker_count,
            queue_capacity = queue_capacity,
            "Dispatcher started"
        );

        Self {
            sender: Mutex::new(Some(sender)),
            workers: tokio::sync::Mutex::new(workers),
            active,
            worker_count,
            queue_capacity,
        }
    }

    /// Queue a task without waiting for a worker.
    ///
    /// # Errors
    ///
    /// - [`ThumbnailError::QueueFull`] when the queue is at capacity
    /// - [`ThumbnailError::ShuttingDown`] after [`Dispatcher::shutdown`]
    pub fn submit(&self, task: Task) -> Result<TaskHandle, ThumbnailError> {
        let (reply, rx) = oneshot::channel();

        let guard = self.sender.lock().unwrap_or_else(|e| e.into_inner());
        let sender = guard.as_ref().ok_or(ThumbnailError::ShuttingDown)?;

        match sender.try_send(Job { task, reply }) {
            Ok(()) => Ok(TaskHandle { rx }),
            Err(TrySendError::Full(job)) => {
                warn!(
                    key = %job.task.key,
                    capacity = self.queue_capacity,
                    "Dispatcher queue full, rejecting task"
                );
                Err(ThumbnailError::QueueFull {
                    capacity: self.queue_capacity,
                })
            }
            Err(TrySendError::Closed(_)) => Err(ThumbnailError::ShuttingDown),
        }
    }

    /// Current pool utilisation.
    pub fn stats(&self) -> DispatcherStats {
        let queued = self
            .sender
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|s| s.max_capacity() - s.capacity())
            .unwrap_or(0);

        DispatcherStats {
            workers: self.worker_count,
            active: self.active.load(Ordering::SeqCst),
            queued,
            queue_capacity: self.queue_capacity,
        }
    }

    /// Whether the dispatcher still accepts tasks.
    pub fn is_running(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Stop accepting tasks, finish everything already queued, and wait for
    /// every worker to exit.
    ///
    /// Calling this more than once is harmless.
    pub async fn shutdown(&self) {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        drop(sender);

        let handles = std::mem::take(&mut *self.workers.lock().await);
        if handles.is_empty() {
            return;
        }

        info!(workers = handles.len(), "Draining dispatcher");
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Worker exited abnormally");
            }
        }
        info!("Dispatcher stopped");
    }
}

async fn worker_loop(
    id: usize,
    receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<Job>>>,
    pipeline: Arc<Pipeline>,
    active: Arc<AtomicUsize>,
) {
    loop {
        // The lock is released before the task runs so other workers can dequeue
        let job = {
            let mut receiver = receiver.lock().await;
            receiver.recv().await
        };
        let Some(Job { task, reply }) = job else {
            break;
        };

        let waited = task.submitted_at.elapsed();
        active.fetch_add(1, Ordering::SeqCst);
        let started = Instant::now();

        // A panic inside the task must not take the worker down with it
        let result = tokio::spawn(Arc::clone(&pipeline).run(task.key.clone()))
            .await
            .unwrap_or_else(|e| {
                Err(ThumbnailError::transform(format!(
                    "generation task failed: {}",
                    e
                )))
            });

        active.fetch_sub(1, Ordering::SeqCst);

        match &result {
            Ok(data) => debug!(
                worker = id,
                key = %task.key,
                bytes = data.len(),
                queued_ms = waited.as_millis() as u64,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Thumbnail generated"
            ),
            Err(e) => warn!(
                worker = id,
                key = %task.key,
                error = %e,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Thumbnail generation failed"
            ),
        }

        // The caller may have gone away; the result is simply dropped
        let _ = reply.send(result);
    }

    debug!(worker = id, "Worker stopped");
}

// =============================================================================
// Tests
// =============================================================================
