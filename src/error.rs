use std::process::Output;

use thiserror::Error;

use crate::task::TaskStatus;

/// Misuse of a [`Task`](crate::Task) handle.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// The task was never handed to a manager, so there is nothing to wait on.
    #[error("Task is not started")]
    NotStarted,
}

/// Misuse of a [`TaskManager`](crate::TaskManager).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ManagerError {
    #[error("Task manager is not started yet")]
    NotStarted,
    #[error("Task manager is closed")]
    Closed,
    #[error("Task manager is already open")]
    AlreadyOpen,
    /// Only tasks still in `Created` can be scheduled.
    #[error("Task cannot be scheduled from status {0}")]
    TaskAlreadyScheduled(TaskStatus),
    /// Blocking closures cannot be interrupted, so thread tasks take no deadline.
    #[error("Thread tasks do not support a deadline or timeout")]
    DeadlineNotSupported,
}

/// Failure of a task offloaded to a child process.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to run process: {0}")]
    Io(#[from] std::io::Error),
    #[error("process exited with {}", .0.status)]
    Exit(Output),
}

impl CommandError {
    /// Captured output of a process that ran but exited unsuccessfully.
    pub fn output(&self) -> Option<&Output> {
        match self {
            Self::Exit(output) => Some(output),
            Self::Io(_) => None,
        }
    }
}
