use std::sync::{atomic::AtomicBool, Arc, OnceLock};

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::{
    deadline::{Clock, SystemClock},
    manager::{ManagerInner, TaskManager},
};

/// Builds a [`TaskManager`] with configurable parameters.
pub struct TaskManagerBuilder {
    concurrent_limit: Option<usize>,
    clock: Arc<dyn Clock>,
}

impl TaskManagerBuilder {
    /// Creates a new builder: no concurrency limit, system clock.
    pub fn new() -> Self {
        Self {
            concurrent_limit: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Caps how many tasks run at once. Tasks beyond the cap wait in `Starting` until a
    /// running task finishes. A limit of zero is treated as one.
    pub fn with_concurrent_limit(mut self, limit: usize) -> Self {
        self.concurrent_limit = Some(limit.max(1));
        self
    }

    /// Sets the clock deadlines are computed and checked against.
    pub fn with_clock(mut self, clock: impl Clock) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Constructs the `TaskManager`. It still has to be opened before use.
    pub fn build(self) -> TaskManager {
        TaskManager {
            inner: Arc::new(ManagerInner {
                concurrent_limit: self.concurrent_limit,
                permits: self
                    .concurrent_limit
                    .map(|limit| Arc::new(Semaphore::new(limit))),
                clock: self.clock,
                boundary: OnceLock::new(),
                closed: AtomicBool::new(false),
                shutdown: CancellationToken::new(),
            }),
        }
    }
}

impl Default for TaskManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
