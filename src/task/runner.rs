//! Drives one scheduled task from `Starting` to a terminal status.

use std::{panic::AssertUnwindSafe, sync::Arc};

use futures::FutureExt;
use tokio::sync::{oneshot, Semaphore};

use crate::{
    catch::{panic_error, Completion},
    macros::debug,
    scope::{CancelReason, CancelScope},
    task::{Task, TaskStatus},
};

enum Outcome<T, E> {
    Completed(Completion<T, E>),
    /// The task's boundary was cancelled before the body finished.
    Interrupted,
}

/// Runs `task` inside its own boundary `scope`.
///
/// `started` fires once the task is `Pending`. `permits` bounds how many tasks of the same
/// manager run at once; a task waiting for a permit stays `Starting`.
pub(crate) async fn run<T, E>(
    task: Task<T, E>,
    scope: CancelScope,
    permits: Option<Arc<Semaphore>>,
    mut started: Option<oneshot::Sender<()>>,
) -> TaskStatus
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    let outcome = execute(&task, &scope, permits, &mut started).await;
    let status = settle(&task, &scope, outcome);
    debug!(task = ?task.name(), %status, "task finished");
    // Must outlive `settle`, see `TaskManager::start`.
    drop(started);
    status
}

async fn execute<T, E>(
    task: &Task<T, E>,
    scope: &CancelScope,
    permits: Option<Arc<Semaphore>>,
    started: &mut Option<oneshot::Sender<()>>,
) -> Outcome<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    let _permit = match permits {
        Some(permits) => tokio::select! {
            biased;
            _ = scope.cancelled() => return Outcome::Interrupted,
            permit = permits.acquire_owned() => permit.ok(),
        },
        None => None,
    };

    let func = {
        let mut state = task.inner.lock_state();
        // Under the state lock, serialized with `Task::cancel`.
        if scope.is_cancelled() {
            return Outcome::Interrupted;
        }
        if state.status == TaskStatus::Starting {
            state.status = TaskStatus::Pending;
        }
        state.func.take()
    };
    if let Some(started) = started.take() {
        let _ = started.send(());
    }
    let Some(func) = func else {
        return Outcome::Interrupted;
    };
    debug!(task = ?task.name(), "task started");

    let body = AssertUnwindSafe(async move { func().await })
        .catch_unwind()
        .map(|result| match result {
            Ok(completion) => completion,
            Err(payload) => Completion::Raised(panic_error(payload)),
        });

    if task.inner.shielded {
        return Outcome::Completed(body.await);
    }

    let timeout = task
        .inner
        .deadline
        .map(|deadline| deadline.to_timeout(&*task.inner.clock));
    let expiry = async move {
        match timeout {
            Some(timeout) => tokio::time::sleep(timeout).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        biased;
        _ = scope.cancelled() => Outcome::Interrupted,
        _ = expiry => {
            scope.cancel(CancelReason::DeadlineElapsed);
            Outcome::Interrupted
        }
        completion = body => Outcome::Completed(completion),
    }
}

fn settle<T, E>(task: &Task<T, E>, scope: &CancelScope, outcome: Outcome<T, E>) -> TaskStatus {
    let inner = &task.inner;
    let status = match outcome {
        Outcome::Completed(Completion::Returned(result)) => {
            let status = if result.is_ok() {
                TaskStatus::Success
            } else {
                TaskStatus::Failure
            };
            let _ = inner.result.set(result);
            status
        }
        Outcome::Completed(Completion::Raised(error)) => {
            let _ = inner.exception.set(error);
            TaskStatus::Exception
        }
        Outcome::Interrupted => {
            // The deadline may have passed without its timer being the one to fire.
            if scope.reason() == Some(CancelReason::DeadlineElapsed) || task.is_expired() {
                TaskStatus::Timeout
            } else {
                TaskStatus::Cancelled
            }
        }
    };
    inner.complete(status)
}
