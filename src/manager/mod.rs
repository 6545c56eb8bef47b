pub(crate) mod builder;

use std::{
    fmt,
    future::Future,
    panic::AssertUnwindSafe,
    process::Output,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, OnceLock,
    },
};

use futures::FutureExt;
use tokio::{
    process::Command,
    sync::{oneshot, Semaphore},
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use crate::{
    catch::{self, Catch, TaskFn},
    deadline::Clock,
    error::{CommandError, ManagerError},
    macros::{debug, log_warn},
    manager::builder::TaskManagerBuilder,
    offload,
    scope::{CancelReason, CancelScope},
    task::{runner, Task, TaskOptions, TaskStatus},
};

/// The cancellation boundary shared by every task of a manager, and the bookkeeping
/// needed to await them all.
struct Boundary {
    scope: CancelScope,
    tracker: TaskTracker,
}

pub(crate) struct ManagerInner {
    concurrent_limit: Option<usize>,
    permits: Option<Arc<Semaphore>>,
    clock: Arc<dyn Clock>,
    boundary: OnceLock<Boundary>,
    closed: AtomicBool,
    /// Fired once the boundary is torn down and every child has finished.
    shutdown: CancellationToken,
}

impl Drop for ManagerInner {
    fn drop(&mut self) {
        let Some(boundary) = self.boundary.get() else {
            return;
        };
        if !self.closed.load(Ordering::SeqCst) && boundary.scope.cancel(CancelReason::Requested)
        {
            log_warn!("task manager dropped without being closed, cancelling its tasks");
        }
    }
}

/// Owns a group of tasks sharing one cancellation boundary.
///
/// Any task that ends in anything but `Success` cancels the boundary, and with it every
/// sibling still running. Closing the manager waits for all of its tasks, so none of them
/// outlives it. Cloning a `TaskManager` clones the handle.
///
/// ```rust
/// use task_manager::{TaskManager, TaskOptions};
///
/// # #[tokio::main]
/// # async fn main() -> anyhow::Result<()> {
/// let manager = TaskManager::new();
/// let task = manager
///     .scope(|tm| async move {
///         Ok::<_, anyhow::Error>(tm.start_task(|| async { Ok::<_, String>(1) }, TaskOptions::new()).await?)
///     })
///     .await?;
/// assert_eq!(task.ok(), Some(&1));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct TaskManager {
    inner: Arc<ManagerInner>,
}

impl fmt::Debug for TaskManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskManager")
            .field("concurrent_limit", &self.inner.concurrent_limit)
            .field("cancelled", &self.cancelled())
            .field("closed", &self.closed())
            .finish()
    }
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskManager {
    pub fn new() -> Self {
        TaskManagerBuilder::new().build()
    }

    pub fn builder() -> TaskManagerBuilder {
        TaskManagerBuilder::new()
    }

    pub fn concurrent_limit(&self) -> Option<usize> {
        self.inner.concurrent_limit
    }

    /// Creates the cancellation boundary. A manager can only be opened once.
    pub fn open(&self) -> Result<(), ManagerError> {
        let boundary = Boundary {
            scope: CancelScope::new(),
            tracker: TaskTracker::new(),
        };
        self.inner
            .boundary
            .set(boundary)
            .map_err(|_| ManagerError::AlreadyOpen)?;
        debug!("task manager opened");
        Ok(())
    }

    /// Stops accepting tasks and waits for every task to finish, then fires the shutdown
    /// signal. Safe to call several times or concurrently; a no-op if never opened.
    pub async fn close(&self) {
        let Some(boundary) = self.inner.boundary.get() else {
            return;
        };
        self.inner.closed.store(true, Ordering::SeqCst);
        boundary.tracker.close();
        boundary.tracker.wait().await;
        if !self.inner.shutdown.is_cancelled() {
            debug!(cancelled = self.cancelled(), "task manager closed");
            self.inner.shutdown.cancel();
        }
    }

    /// Cancels the boundary, and so every running task. Idempotent.
    pub fn cancel(&self) {
        if let Some(boundary) = self.inner.boundary.get() {
            if boundary.scope.cancel(CancelReason::Requested) {
                debug!("task manager cancelled");
            }
        }
    }

    pub fn cancelled(&self) -> bool {
        self.inner
            .boundary
            .get()
            .is_some_and(|boundary| boundary.scope.is_cancelled())
    }

    pub fn closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Waits until the manager has been closed. Returns immediately if it was never opened.
    pub async fn wait(&self) {
        if self.inner.boundary.get().is_none() {
            return;
        }
        self.inner.shutdown.cancelled().await;
    }

    /// Cancels the manager and waits until it has been closed.
    pub async fn kill(&self) {
        self.cancel();
        self.wait().await;
    }

    /// Runs `f` with this manager open.
    ///
    /// When `f` returns an error or panics the manager is cancelled first. The manager is
    /// always closed before this returns, so no task spawned in `f` outlives the call.
    /// Panics are resumed after closing.
    pub async fn scope<F, Fut, R, E>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(TaskManager) -> Fut,
        Fut: Future<Output = Result<R, E>>,
        E: From<ManagerError>,
    {
        self.open()?;
        let manager = self.clone();
        let outcome = AssertUnwindSafe(async move { f(manager).await })
            .catch_unwind()
            .await;
        if !matches!(outcome, Ok(Ok(_))) {
            self.cancel();
        }
        self.close().await;
        match outcome {
            Ok(result) => result,
            Err(payload) => std::panic::resume_unwind(payload),
        }
    }

    /// Schedules a task built with [`Task::new`] and returns without waiting for it to run.
    ///
    /// A task whose deadline already passed is not scheduled: it is returned in `Timeout`
    /// and the manager is cancelled.
    pub fn submit<T, E>(&self, task: Task<T, E>) -> Result<Task<T, E>, ManagerError>
    where
        T: Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        self.schedule(task, None)
    }

    /// Schedules a task and waits until it is running (or already finished).
    pub async fn start<T, E>(&self, task: Task<T, E>) -> Result<Task<T, E>, ManagerError>
    where
        T: Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        let (started_tx, started_rx) = oneshot::channel();
        let task = self.schedule(task, Some(started_tx))?;
        if started_rx.await.is_err() {
            task.abandon();
        }
        Ok(task)
    }

    pub fn submit_task<F, Fut, T, E>(
        &self,
        func: F,
        options: TaskOptions,
    ) -> Result<Task<T, E>, ManagerError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        self.submit(self.task(catch::returning(func), options, false))
    }

    pub async fn start_task<F, Fut, T, E>(
        &self,
        func: F,
        options: TaskOptions,
    ) -> Result<Task<T, E>, ManagerError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        self.start(self.task(catch::returning(func), options, false))
            .await
    }

    /// Like [`TaskManager::submit_task`] for a function returning `anyhow::Result`: errors
    /// accepted by `catch` end the task in `Failure`, any other error in `Exception`.
    pub fn submit_task_catching<F, Fut, T>(
        &self,
        func: F,
        catch: Catch,
        options: TaskOptions,
    ) -> Result<Task<T, anyhow::Error>, ManagerError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
        T: Send + Sync + 'static,
    {
        self.submit(self.task(catch::catching(func, catch), options, false))
    }

    pub async fn start_task_catching<F, Fut, T>(
        &self,
        func: F,
        catch: Catch,
        options: TaskOptions,
    ) -> Result<Task<T, anyhow::Error>, ManagerError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
        T: Send + Sync + 'static,
    {
        self.start(self.task(catch::catching(func, catch), options, false))
            .await
    }

    /// Runs a blocking closure on the blocking thread pool.
    ///
    /// Once the closure is running it cannot be interrupted: cancellation only takes effect
    /// if it arrives before the closure starts. For the same reason options carrying a
    /// deadline or timeout are rejected.
    pub fn submit_task_in_thread<F, T, E>(
        &self,
        func: F,
        options: TaskOptions,
    ) -> Result<Task<T, E>, ManagerError>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        T: Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        Self::reject_deadline(&options)?;
        self.submit(self.task(offload::in_thread(func), options, true))
    }

    pub async fn start_task_in_thread<F, T, E>(
        &self,
        func: F,
        options: TaskOptions,
    ) -> Result<Task<T, E>, ManagerError>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        T: Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        Self::reject_deadline(&options)?;
        self.start(self.task(offload::in_thread(func), options, true))
            .await
    }

    pub fn submit_task_in_thread_catching<F, T>(
        &self,
        func: F,
        catch: Catch,
        options: TaskOptions,
    ) -> Result<Task<T, anyhow::Error>, ManagerError>
    where
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
        T: Send + Sync + 'static,
    {
        Self::reject_deadline(&options)?;
        self.submit(self.task(offload::in_thread_catching(func, catch), options, true))
    }

    pub async fn start_task_in_thread_catching<F, T>(
        &self,
        func: F,
        catch: Catch,
        options: TaskOptions,
    ) -> Result<Task<T, anyhow::Error>, ManagerError>
    where
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
        T: Send + Sync + 'static,
    {
        Self::reject_deadline(&options)?;
        self.start(self.task(offload::in_thread_catching(func, catch), options, true))
            .await
    }

    /// Runs `command` as a child process and collects its output.
    ///
    /// A zero exit status is a `Success`; a spawn error or non-zero exit is a `Failure`.
    /// Cancellation, including the task's own deadline, kills the child.
    pub fn submit_task_in_process(
        &self,
        command: Command,
        options: TaskOptions,
    ) -> Result<Task<Output, CommandError>, ManagerError> {
        self.submit(self.task(offload::in_process(command), options, false))
    }

    pub async fn start_task_in_process(
        &self,
        command: Command,
        options: TaskOptions,
    ) -> Result<Task<Output, CommandError>, ManagerError> {
        self.start(self.task(offload::in_process(command), options, false))
            .await
    }

    fn task<T, E>(&self, func: TaskFn<T, E>, options: TaskOptions, shielded: bool) -> Task<T, E>
    where
        T: Send + 'static,
        E: Send + 'static,
    {
        Task::from_fn(func, options, Arc::clone(&self.inner.clock), shielded)
    }

    fn reject_deadline(options: &TaskOptions) -> Result<(), ManagerError> {
        if options.has_deadline() {
            return Err(ManagerError::DeadlineNotSupported);
        }
        Ok(())
    }

    fn boundary(&self) -> Result<&Boundary, ManagerError> {
        let boundary = self.inner.boundary.get().ok_or(ManagerError::NotStarted)?;
        if self.closed() {
            return Err(ManagerError::Closed);
        }
        Ok(boundary)
    }

    fn schedule<T, E>(
        &self,
        task: Task<T, E>,
        started: Option<oneshot::Sender<()>>,
    ) -> Result<Task<T, E>, ManagerError>
    where
        T: Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        let boundary = self.boundary()?;
        let status = task.status();
        if status != TaskStatus::Created {
            return Err(ManagerError::TaskAlreadyScheduled(status));
        }
        if task.is_expired() {
            task.expire(&boundary.scope);
            return Ok(task);
        }
        let scope = task
            .prepare(&boundary.scope)
            .map_err(ManagerError::TaskAlreadyScheduled)?;
        debug!(task = ?task.name(), "task scheduled");
        boundary.tracker.spawn(runner::run(
            task.clone(),
            scope,
            self.inner.permits.clone(),
            started,
        ));
        Ok(task)
    }
}
