pub(crate) mod runner;

use std::{
    fmt,
    future::Future,
    sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError},
    time::{Duration, SystemTime},
};

use tokio_util::sync::CancellationToken;

use crate::{
    catch::{self, TaskFn},
    deadline::{Clock, Deadline, SystemClock},
    error::TaskError,
    macros::debug,
    manager::TaskManager,
    scope::{CancelReason, CancelScope},
};

/// Lifecycle of a [`Task`].
///
/// `Created`, `Starting` and `Pending` are transient; every other status is terminal and
/// never changes once reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    /// Constructed, not scheduled yet.
    Created,
    /// Handed to a manager, not confirmed running yet.
    Starting,
    /// Running.
    Pending,
    /// The function returned `Ok`.
    Success,
    /// The function returned `Err`.
    Failure,
    /// Cancelled by someone else, before or during the run.
    Cancelled,
    /// Cancelled because the task's own deadline elapsed.
    Timeout,
    /// The function raised instead of returning a result.
    Exception,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Created | Self::Starting | Self::Pending)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Timeout)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Starting => write!(f, "starting"),
            Self::Pending => write!(f, "pending"),
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Timeout => write!(f, "timeout"),
            Self::Exception => write!(f, "exception"),
        }
    }
}

/// Per-task settings: a name and an optional deadline.
///
/// When both a timeout and an absolute deadline are set, the earlier one applies.
#[derive(Debug, Clone, Default)]
pub struct TaskOptions {
    name: Option<String>,
    timeout: Option<Duration>,
    deadline: Option<SystemTime>,
}

impl TaskOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Deadline relative to the moment the task is created.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_deadline(mut self, deadline: SystemTime) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub(crate) fn has_deadline(&self) -> bool {
        self.timeout.is_some() || self.deadline.is_some()
    }
}

struct TaskState<T, E> {
    status: TaskStatus,
    func: Option<TaskFn<T, E>>,
    /// The task's own boundary, nested in the parent's. Present once scheduled.
    scope: Option<CancelScope>,
    /// The owning manager's boundary, used only to escalate failures.
    parent: Option<CancelScope>,
}

pub(crate) struct TaskInner<T, E> {
    name: Option<String>,
    deadline: Option<Deadline>,
    clock: Arc<dyn Clock>,
    /// Blocking bodies cannot be interrupted once running.
    shielded: bool,
    state: Mutex<TaskState<T, E>>,
    result: OnceLock<Result<T, E>>,
    exception: OnceLock<anyhow::Error>,
    /// One-shot completion latch.
    finished: CancellationToken,
    ephemeral: Mutex<Option<TaskManager>>,
}

/// Handle to one supervised unit of fallible async work.
///
/// Cloning a `Task` clones the handle; every clone observes the same task.
pub struct Task<T, E> {
    inner: Arc<TaskInner<T, E>>,
}

impl<T, E> Clone for Task<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, E> fmt::Debug for Task<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.inner.name)
            .field("status", &self.status())
            .field("deadline", &self.inner.deadline)
            .finish_non_exhaustive()
    }
}

impl<T, E> Task<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Creates a task in `Created` status. Nothing runs until it is handed to a
    /// [`TaskManager`] through [`TaskManager::submit`] or [`TaskManager::start`].
    ///
    /// The deadline is computed here and always checked against the system clock, even
    /// when the task is later handed to a manager built with
    /// [`with_clock`](crate::TaskManagerBuilder::with_clock). Use
    /// [`TaskManager::submit_task`] and friends to follow the manager's clock.
    pub fn new<F, Fut>(func: F, options: TaskOptions) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self::from_fn(catch::returning(func), options, Arc::new(SystemClock), false)
    }

    pub(crate) fn from_fn(
        func: TaskFn<T, E>,
        options: TaskOptions,
        clock: Arc<dyn Clock>,
        shielded: bool,
    ) -> Self {
        let deadline = Deadline::create(options.timeout, options.deadline, &*clock);
        Self {
            inner: Arc::new(TaskInner {
                name: options.name,
                deadline,
                clock,
                shielded,
                state: Mutex::new(TaskState {
                    status: TaskStatus::Created,
                    func: Some(func),
                    scope: None,
                    parent: None,
                }),
                result: OnceLock::new(),
                exception: OnceLock::new(),
                finished: CancellationToken::new(),
                ephemeral: Mutex::new(None),
            }),
        }
    }
}

impl<T, E> Task<T, E> {
    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    pub fn deadline(&self) -> Option<Deadline> {
        self.inner.deadline
    }

    pub fn status(&self) -> TaskStatus {
        self.inner.lock_state().status
    }

    /// True once the task reached a terminal status.
    pub fn done(&self) -> bool {
        self.status().is_terminal()
    }

    /// True if the task ended `Cancelled` or `Timeout`.
    pub fn cancelled(&self) -> bool {
        self.status().is_cancelled()
    }

    /// The returned result, present only in `Success` and `Failure`.
    pub fn result(&self) -> Option<&Result<T, E>> {
        if !self.done() {
            return None;
        }
        self.inner.result.get()
    }

    pub fn ok(&self) -> Option<&T> {
        self.result().and_then(|result| result.as_ref().ok())
    }

    pub fn err(&self) -> Option<&E> {
        self.result().and_then(|result| result.as_ref().err())
    }

    /// The raised error, present only in `Exception`.
    pub fn exception(&self) -> Option<&anyhow::Error> {
        if !self.done() {
            return None;
        }
        self.inner.exception.get()
    }

    /// Requests cancellation.
    ///
    /// A task that never ran becomes `Cancelled` immediately, and a finished task keeps its
    /// status; both return `Some(status)`. A scheduled task has its boundary cancelled and
    /// returns `None`: [`Task::wait`] yields the status it settles on.
    pub fn cancel(&self) -> Option<TaskStatus> {
        let mut state = self.inner.lock_state();
        match state.status {
            TaskStatus::Created => {
                state.status = TaskStatus::Cancelled;
                state.func = None;
                drop(state);
                self.inner.finished.cancel();
                Some(TaskStatus::Cancelled)
            }
            status if status.is_terminal() => Some(status),
            _ => {
                if let Some(scope) = &state.scope {
                    scope.cancel(CancelReason::Requested);
                }
                None
            }
        }
    }

    /// Waits until the task reaches a terminal status and returns it.
    pub async fn wait(&self) -> Result<TaskStatus, TaskError> {
        {
            let state = self.inner.lock_state();
            if state.status.is_terminal() {
                return Ok(state.status);
            }
            if state.scope.is_none() {
                return Err(TaskError::NotStarted);
            }
        }
        self.inner.finished.cancelled().await;
        Ok(self.status())
    }

    /// Cancels the task and waits for its terminal status.
    pub async fn kill(&self) -> Result<TaskStatus, TaskError> {
        if self.status() == TaskStatus::Created {
            return Err(TaskError::NotStarted);
        }
        match self.cancel() {
            Some(status) => Ok(status),
            None => self.wait().await,
        }
    }

    /// Like [`Task::wait`], but first closes the private manager of a task started through
    /// [`start_task`](crate::start_task), ending its scope.
    pub async fn join(&self) -> Result<TaskStatus, TaskError> {
        let ephemeral = self
            .inner
            .ephemeral
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(manager) = ephemeral {
            manager.close().await;
        }
        self.wait().await
    }

    pub(crate) fn attach_manager(&self, manager: TaskManager) {
        *self
            .inner
            .ephemeral
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(manager);
    }

    pub(crate) fn is_expired(&self) -> bool {
        self.inner
            .deadline
            .is_some_and(|deadline| deadline.is_expired(&*self.inner.clock))
    }

    /// Moves a `Created` task to `Starting` under `parent`, returning its own nested boundary.
    pub(crate) fn prepare(&self, parent: &CancelScope) -> Result<CancelScope, TaskStatus> {
        let mut state = self.inner.lock_state();
        if state.status != TaskStatus::Created {
            return Err(state.status);
        }
        let scope = parent.child();
        state.status = TaskStatus::Starting;
        state.scope = Some(scope.clone());
        state.parent = Some(parent.clone());
        Ok(scope)
    }

    /// Settles a `Created` task whose deadline passed before it could be scheduled.
    pub(crate) fn expire(&self, parent: &CancelScope) {
        {
            let mut state = self.inner.lock_state();
            state.func = None;
            state.parent = Some(parent.clone());
        }
        debug!(task = ?self.name(), "deadline expired before the task was scheduled");
        self.inner.complete(TaskStatus::Timeout);
    }

    /// Settles a task whose runner went away before confirming it started.
    pub(crate) fn abandon(&self) {
        if self.status() != TaskStatus::Starting {
            return;
        }
        let _ = self
            .inner
            .exception
            .set(anyhow::anyhow!("task was dropped before it started"));
        self.inner.complete(TaskStatus::Exception);
    }
}

impl<T, E> TaskInner<T, E> {
    fn lock_state(&self) -> MutexGuard<'_, TaskState<T, E>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records the terminal status, escalates anything but success to the parent boundary,
    /// then fires the completion latch. The first terminal status wins.
    fn complete(&self, status: TaskStatus) -> TaskStatus {
        let (status, parent) = {
            let mut state = self.lock_state();
            if !state.status.is_terminal() {
                state.status = status;
            }
            state.func = None;
            (state.status, state.parent.clone())
        };
        if !status.is_success() {
            if let Some(parent) = parent {
                if parent.cancel(CancelReason::Requested) {
                    debug!(task = ?self.name, %status, "task did not succeed, cancelling its siblings");
                }
            }
        }
        self.finished.cancel();
        status
    }
}
