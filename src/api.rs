//! Free functions for one-off tasks.
//!
//! `start_task` and friends open a private single-task [`TaskManager`] and hand its lifetime
//! to the returned task: [`Task::join`] closes it.

use std::{future::Future, process::Output};

use futures::future::join_all;
use tokio::process::Command;

use crate::{
    error::{CommandError, ManagerError, TaskError},
    manager::TaskManager,
    task::{Task, TaskOptions, TaskStatus},
};

pub fn create_task_manager() -> TaskManager {
    TaskManager::new()
}

/// Waits for every task concurrently and returns their terminal statuses in order.
pub async fn wait_for<'a, T, E, I>(tasks: I) -> Result<Vec<TaskStatus>, TaskError>
where
    I: IntoIterator<Item = &'a Task<T, E>>,
    T: 'a,
    E: 'a,
{
    join_all(tasks.into_iter().map(|task| task.wait()))
        .await
        .into_iter()
        .collect()
}

/// Starts `func` in its own private manager.
///
/// ```rust
/// use task_manager::{start_task, TaskOptions, TaskStatus};
///
/// # #[tokio::main]
/// # async fn main() -> anyhow::Result<()> {
/// let task = start_task(|| async { Err::<(), _>("BOOM") }, TaskOptions::new()).await?;
/// assert_eq!(task.join().await?, TaskStatus::Failure);
/// assert_eq!(task.err(), Some(&"BOOM"));
/// # Ok(())
/// # }
/// ```
pub async fn start_task<F, Fut, T, E>(
    func: F,
    options: TaskOptions,
) -> Result<Task<T, E>, ManagerError>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    let manager = open_ephemeral()?;
    let task = manager.start_task(func, options).await?;
    task.attach_manager(manager);
    Ok(task)
}

pub async fn start_task_in_thread<F, T, E>(
    func: F,
    options: TaskOptions,
) -> Result<Task<T, E>, ManagerError>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    let manager = open_ephemeral()?;
    let task = manager.start_task_in_thread(func, options).await?;
    task.attach_manager(manager);
    Ok(task)
}

pub async fn start_task_in_process(
    command: Command,
    options: TaskOptions,
) -> Result<Task<Output, CommandError>, ManagerError> {
    let manager = open_ephemeral()?;
    let task = manager.start_task_in_process(command, options).await?;
    task.attach_manager(manager);
    Ok(task)
}

fn open_ephemeral() -> Result<TaskManager, ManagerError> {
    let manager = TaskManager::new();
    manager.open()?;
    Ok(manager)
}
