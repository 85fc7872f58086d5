//! Per-test scheduler loop for async test bodies.
//!
//! Every async test gets a fresh single-threaded tokio runtime. While the body runs
//! the loop keeps three health checks:
//! - a single poll of the body or of a spawned task taking longer than the threshold
//!   is a [`MockError::SlowCallback`];
//! - tasks spawned through the [`LoopHandle`] and never joined are a
//!   [`MockError::LeakedTask`] (they are aborted);
//! - awaitables created on the loop thread and never awaited are a
//!   [`MockError::UnawaitedCoroutine`].

use crate::domain::errors::{FailureCollector, MockError, MockResult};
use crate::domain::ports::AwaitableObserver;
use crate::domain::value::{Value, observe_awaitables};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tokio::runtime::{Builder, Runtime};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, warn};

pub const DEFAULT_SLOW_CALLBACK_THRESHOLD_MS: u64 = 100;

#[derive(Debug, Clone, Copy)]
pub struct LoopConfig {
    pub slow_callback_threshold: Duration,
    /// Report slow callbacks with a warning instead of failing the test.
    pub slow_callback_is_not_fatal: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            slow_callback_threshold: Duration::from_millis(DEFAULT_SLOW_CALLBACK_THRESHOLD_MS),
            slow_callback_is_not_fatal: false,
        }
    }
}

/// Tracks awaitables created on the loop thread until they are awaited.
#[derive(Default)]
pub struct LoopTracker {
    pending: Mutex<BTreeMap<u64, String>>,
}

impl LoopTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Labels of awaitables that were created and never awaited, in creation order.
    pub fn unawaited(&self) -> Vec<String> {
        self.pending.lock().values().cloned().collect()
    }
}

impl AwaitableObserver for LoopTracker {
    fn created(&self, id: u64, label: &str) {
        self.pending.lock().insert(id, label.to_string());
    }

    fn awaited(&self, id: u64) {
        self.pending.lock().remove(&id);
    }
}

/// Times every poll of the futures it wraps.
#[derive(Clone)]
struct Watchdog {
    threshold: Duration,
    slow: Arc<Mutex<Vec<MockError>>>,
}

impl Watchdog {
    fn observe(&self, task: &str, elapsed: Duration) {
        if elapsed > self.threshold {
            debug!(task, elapsed_ms = elapsed.as_millis() as u64, "slow poll");
            self.slow.lock().push(MockError::SlowCallback {
                task: task.to_string(),
                elapsed_ms: elapsed.as_millis(),
                threshold_ms: self.threshold.as_millis(),
            });
        }
    }
}

struct Timed<F> {
    label: String,
    inner: Pin<Box<F>>,
    watchdog: Watchdog,
}

impl<F: Future> Future for Timed<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<F::Output> {
        let this = self.get_mut();
        let started = Instant::now();
        let polled = this.inner.as_mut().poll(cx);
        this.watchdog.observe(&this.label, started.elapsed());
        polled
    }
}

struct TaskEntry {
    label: String,
    joined: bool,
    abort: AbortHandle,
}

#[derive(Default)]
struct TaskTable {
    next_id: AtomicU64,
    entries: Mutex<BTreeMap<u64, TaskEntry>>,
}

/// Spawns tasks onto the loop. Handed to the async test body.
#[derive(Clone)]
pub struct LoopHandle {
    runtime: tokio::runtime::Handle,
    tasks: Arc<TaskTable>,
    watchdog: Watchdog,
}

impl LoopHandle {
    /// Starts `future` as a task of the loop. It must be joined before the test ends.
    pub fn spawn<F>(&self, label: impl Into<String>, future: F) -> TaskHandle
    where
        F: Future<Output = MockResult<Value>> + Send + 'static,
    {
        let label = label.into();
        let id = self.tasks.next_id.fetch_add(1, Ordering::Relaxed);
        let timed = Timed {
            label: label.clone(),
            inner: Box::pin(future),
            watchdog: self.watchdog.clone(),
        };
        let join = self.runtime.spawn(timed);
        self.tasks.entries.lock().insert(
            id,
            TaskEntry {
                label: label.clone(),
                joined: false,
                abort: join.abort_handle(),
            },
        );
        debug!(task = %label, id, "task spawned");
        TaskHandle {
            id,
            label,
            join,
            tasks: self.tasks.clone(),
        }
    }
}

/// A spawned task. Joining it yields its result.
pub struct TaskHandle {
    id: u64,
    label: String,
    join: JoinHandle<MockResult<Value>>,
    tasks: Arc<TaskTable>,
}

impl TaskHandle {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub async fn join(self) -> MockResult<Value> {
        if let Some(entry) = self.tasks.entries.lock().get_mut(&self.id) {
            entry.joined = true;
        }
        match self.join.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => Err(MockError::Panicked(format!("task {} panicked", self.label))),
            Err(_) => Err(MockError::raised("CancelledError", format!("task {} was cancelled", self.label))),
        }
    }
}

/// Fresh loop running one async test body.
pub struct AsyncTestLoop {
    config: LoopConfig,
    runtime: Runtime,
}

impl AsyncTestLoop {
    pub fn new(config: LoopConfig) -> MockResult<Self> {
        let runtime = Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(|e| MockError::InvalidUsage(format!("failed to start the test loop: {e}")))?;
        Ok(Self { config, runtime })
    }

    /// Runs `body` to completion, then applies the health checks. The body's own
    /// failure is reported together with them.
    pub fn run<F, Fut>(self, body: F) -> MockResult<()>
    where
        F: FnOnce(LoopHandle) -> Fut,
        Fut: Future<Output = MockResult<()>>,
    {
        let tracker = Arc::new(LoopTracker::new());
        let watchdog = Watchdog {
            threshold: self.config.slow_callback_threshold,
            slow: Arc::new(Mutex::new(Vec::new())),
        };
        let handle = LoopHandle {
            runtime: self.runtime.handle().clone(),
            tasks: Arc::new(TaskTable::default()),
            watchdog: watchdog.clone(),
        };
        let tasks = handle.tasks.clone();

        let outcome = {
            let _observing = observe_awaitables(tracker.clone());
            let timed = Timed {
                label: "test body".to_string(),
                inner: Box::pin(body(handle)),
                watchdog: watchdog.clone(),
            };
            self.runtime.block_on(timed)
        };

        let mut failures = FailureCollector::new();
        failures.catch(outcome);

        let leaked: Vec<String> = {
            let entries = tasks.entries.lock();
            entries
                .values()
                .filter(|t| !t.joined)
                .map(|t| {
                    t.abort.abort();
                    t.label.clone()
                })
                .collect()
        };
        if !leaked.is_empty() {
            failures.push(MockError::LeakedTask { tasks: leaked });
        }

        for slow in std::mem::take(&mut *watchdog.slow.lock()) {
            if self.config.slow_callback_is_not_fatal {
                warn!(error = %slow, "slow callback");
            } else {
                failures.push(slow);
            }
        }

        let unawaited = tracker.unawaited();
        if !unawaited.is_empty() {
            failures.push(MockError::UnawaitedCoroutine { coroutines: unawaited });
        }
        drop(self.runtime);
        failures.into_result()
    }
}
