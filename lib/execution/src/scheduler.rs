use async_trait::async_trait;
use futures::FutureExt;
use rdf_federation_common::{FederationError, FederationResult, QueryId, QueryInfo};
use std::collections::VecDeque;
use std::fmt::{Debug, Formatter};
use std::panic::AssertUnwindSafe;
use std::pin::pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// A unit of work that is executed by a [ControlledWorkerScheduler].
///
/// A task is either run exactly once or cancelled. Both consume the task, so the owning operator
/// always receives exactly one outcome per scheduled task.
#[async_trait]
pub trait Task: Send {
    /// The query this task belongs to.
    fn query(&self) -> &Arc<QueryInfo>;

    /// Executes the task.
    async fn run(self: Box<Self>);

    /// Called instead of [Task::run] if the task is removed before it has been started.
    fn cancel(self: Box<Self>);
}

/// A scheduler that executes tasks in FIFO order on a fixed number of workers.
///
/// The number of workers bounds the number of concurrently running tasks across all queries.
/// Operators use a [TaskProducer] to submit their tasks, allowing the scheduler to distinguish
/// between "no more work will arrive" and "all submitted work is done".
pub struct ControlledWorkerScheduler {
    state: Arc<SchedulerState>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

struct SchedulerState {
    name: String,
    queue: Mutex<VecDeque<Box<dyn Task>>>,
    notify: Notify,
    active: AtomicUsize,
    open_producers: AtomicUsize,
    shut_down: AtomicBool,
}

impl ControlledWorkerScheduler {
    /// Creates a new scheduler and spawns `worker_threads` workers on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// If `worker_threads` is zero or there is no current tokio runtime.
    pub fn try_new(name: impl Into<String>, worker_threads: usize) -> FederationResult<Self> {
        let name = name.into();
        if worker_threads == 0 {
            return Err(FederationError::Configuration(format!(
                "The scheduler {name} needs at least one worker"
            )));
        }
        let handle = Handle::try_current().map_err(|_| {
            FederationError::Configuration(format!(
                "The scheduler {name} must be created within a tokio runtime"
            ))
        })?;

        let state = Arc::new(SchedulerState {
            name,
            queue: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            active: AtomicUsize::new(0),
            open_producers: AtomicUsize::new(0),
            shut_down: AtomicBool::new(false),
        });
        let workers = (0..worker_threads)
            .map(|_| handle.spawn(run_worker(Arc::clone(&state))))
            .collect();

        debug!(
            "Started scheduler {} with {worker_threads} workers.",
            state.name
        );
        Ok(Self {
            state,
            workers: Mutex::new(workers),
        })
    }

    pub fn name(&self) -> &str {
        &self.state.name
    }

    /// Enqueues `task`. A task of an aborted query is cancelled immediately.
    pub fn schedule(&self, task: Box<dyn Task>) {
        self.state.schedule(task);
    }

    /// Creates a producer through which an operator of `query` submits its tasks.
    pub fn producer(&self, query: Arc<QueryInfo>) -> TaskProducer {
        self.state.open_producers.fetch_add(1, Ordering::AcqRel);
        TaskProducer {
            state: Arc::clone(&self.state),
            query,
            submitted: 0,
            finished: false,
        }
    }

    /// Removes all queued tasks of `query` and cancels them. Running tasks are not interrupted.
    ///
    /// Returns the number of cancelled tasks.
    pub fn abort(&self, query: QueryId) -> usize {
        let cancelled = {
            let mut queue = self.state.lock_queue();
            let (cancelled, kept): (VecDeque<_>, VecDeque<_>) =
                queue.drain(..).partition(|task| task.query().id() == query);
            *queue = kept;
            cancelled
        };

        let count = cancelled.len();
        for task in cancelled {
            task.cancel();
        }
        if count > 0 {
            debug!(
                "Cancelled {count} queued tasks of query {query} in scheduler {}.",
                self.state.name
            );
        }
        count
    }

    /// The number of tasks waiting for a worker.
    pub fn queued(&self) -> usize {
        self.state.lock_queue().len()
    }

    /// The number of tasks that are currently running.
    pub fn active(&self) -> usize {
        self.state.active.load(Ordering::Acquire)
    }

    /// The number of producers that may still submit tasks.
    pub fn open_producers(&self) -> usize {
        self.state.open_producers.load(Ordering::Acquire)
    }

    /// Returns `true` if all submitted tasks are done.
    pub fn is_idle(&self) -> bool {
        self.queued() == 0 && self.active() == 0
    }

    pub fn is_shut_down(&self) -> bool {
        self.state.shut_down.load(Ordering::Acquire)
    }

    /// Stops all workers and cancels the queued tasks. Tasks scheduled afterward are cancelled
    /// immediately.
    pub fn shutdown(&self) {
        if self.state.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }

        let cancelled = std::mem::take(&mut *self.state.lock_queue());
        for task in cancelled {
            task.cancel();
        }

        self.state.notify.notify_waiters();
        let workers = std::mem::take(
            &mut *self
                .workers
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for worker in workers {
            worker.abort();
        }
        debug!("Scheduler {} has been shut down.", self.state.name);
    }
}

impl Debug for ControlledWorkerScheduler {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlledWorkerScheduler")
            .field("name", &self.state.name)
            .field("queued", &self.queued())
            .field("active", &self.active())
            .field("open_producers", &self.open_producers())
            .field("shut_down", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}

impl Drop for ControlledWorkerScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl SchedulerState {
    fn lock_queue(&self) -> MutexGuard<'_, VecDeque<Box<dyn Task>>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn schedule(&self, task: Box<dyn Task>) {
        if self.shut_down.load(Ordering::Acquire) || task.query().is_aborted() {
            debug!(
                "Cancelling task of query {} before it has been queued.",
                task.query().id()
            );
            task.cancel();
            return;
        }

        self.lock_queue().push_back(task);
        self.notify.notify_one();
    }

    fn pop(&self) -> Option<Box<dyn Task>> {
        self.lock_queue().pop_front()
    }

    async fn execute(&self, task: Box<dyn Task>) {
        let query = task.query().id();
        if task.query().is_aborted() {
            task.cancel();
            return;
        }

        let _active = ActiveTask::start(&self.active);
        let result = AssertUnwindSafe(task.run()).catch_unwind().await;

        if result.is_err() {
            error!(
                "A task of query {query} panicked in scheduler {}. The worker continues.",
                self.name
            );
        }
    }
}

/// Counts a running task until it is dropped, including when its worker is aborted mid-task.
struct ActiveTask<'a> {
    active: &'a AtomicUsize,
}

impl<'a> ActiveTask<'a> {
    fn start(active: &'a AtomicUsize) -> Self {
        active.fetch_add(1, Ordering::AcqRel);
        Self { active }
    }
}

impl Drop for ActiveTask<'_> {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
    }
}

async fn run_worker(state: Arc<SchedulerState>) {
    loop {
        let mut notified = pin!(state.notify.notified());
        notified.as_mut().enable();

        if state.shut_down.load(Ordering::Acquire) {
            return;
        }

        match state.pop() {
            Some(task) => state.execute(task).await,
            None => notified.await,
        }
    }
}

/// A handle through which an operator submits tasks to a [ControlledWorkerScheduler].
///
/// Dropping the producer implicitly informs the scheduler that no more tasks will arrive.
pub struct TaskProducer {
    state: Arc<SchedulerState>,
    query: Arc<QueryInfo>,
    submitted: usize,
    finished: bool,
}

impl TaskProducer {
    pub fn query(&self) -> &Arc<QueryInfo> {
        &self.query
    }

    /// Submits `task` to the scheduler.
    pub fn schedule(&mut self, task: Box<dyn Task>) {
        if self.finished {
            warn!(
                "Producer of query {} submitted a task after finishing.",
                self.query.id()
            );
        }
        self.submitted += 1;
        self.state.schedule(task);
    }

    /// The number of tasks submitted through this producer.
    pub fn submitted(&self) -> usize {
        self.submitted
    }

    /// Declares that this producer will not submit any more tasks.
    pub fn inform_finish(&mut self) {
        if !self.finished {
            self.finished = true;
            self.state.open_producers.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

impl Drop for TaskProducer {
    fn drop(&mut self) {
        self.inform_finish();
    }
}
