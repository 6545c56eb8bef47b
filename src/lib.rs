//! # task-manager
//!
//! `task-manager` brings structured concurrency to Tokio.
//! Tasks run inside a [`TaskManager`] that owns one cancellation boundary; closing the
//! manager waits for every task it spawned, so nothing is left running in the background.
//!
//! ## Quick example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use task_manager::{TaskManager, TaskOptions};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let (slow, failing) = TaskManager::new()
//!         .scope(|tm| async move {
//!             let slow = tm
//!                 .start_task(
//!                     || async {
//!                         tokio::time::sleep(Duration::from_secs(10)).await;
//!                         Ok::<_, String>(1)
//!                     },
//!                     TaskOptions::new().with_name("slow"),
//!                 )
//!                 .await?;
//!             let failing = tm
//!                 .start_task(|| async { Err::<i32, _>("BOOM".to_string()) }, TaskOptions::new())
//!                 .await?;
//!             Ok::<_, anyhow::Error>((slow, failing))
//!         })
//!         .await?;
//!
//!     // The failure cancelled its sibling instead of waiting ten seconds.
//!     assert!(slow.cancelled());
//!     assert_eq!(failing.err().map(String::as_str), Some("BOOM"));
//!     Ok(())
//! }
//! ```
//!
//! ## What you get
//!
//! * **Scoped lifetimes** – leaving [`TaskManager::scope`] always waits for every child task.
//! * **Fail-fast** – a task ending in anything but `Success` cancels all of its siblings.
//! * **Deadlines** – per-task timeouts or absolute deadlines, reported as `Timeout`.
//! * **Offloading** – blocking closures on the blocking pool, commands in child processes.
//!
//! ## API overview
//!
//! | Task method          | Purpose                                                        |
//! | -------------------- | -------------------------------------------------------------- |
//! | `status()`           | Current [`TaskStatus`]                                         |
//! | `result()`           | Returned `Result`, once `Success` or `Failure`                 |
//! | `ok()` / `err()`     | Success / error payload, if any                                |
//! | `exception()`        | Error raised by the task, once `Exception`                     |
//! | `cancel()`           | Request cancellation                                           |
//! | `wait().await`       | Wait for a terminal status                                     |
//! | `kill().await`       | Cancel, then wait                                              |
//! | `join().await`       | Close the task's private manager, then wait                    |
//!
//! ## Logging
//!
//! Enable the `with_tracing` feature to emit lifecycle events through `tracing`.

pub use api::{
    create_task_manager, start_task, start_task_in_process, start_task_in_thread, wait_for,
};
pub use catch::Catch;
pub use deadline::{
    create_deadline, deadline_is_expired, deadline_to_timeout, Clock, Deadline, SystemClock,
};
pub use error::{CommandError, ManagerError, TaskError};
pub use manager::{builder::TaskManagerBuilder, TaskManager};
pub use task::{Task, TaskOptions, TaskStatus};

mod api;
mod catch;
mod deadline;
mod error;
mod macros;
mod manager;
mod offload;
mod scope;
mod task;
