//! Task bodies that leave the cooperative scheduler.
//!
//! Thread bodies run a blocking closure on Tokio's blocking pool. Process bodies run a child
//! process and collect its output; the child is killed if the task is cancelled.

use std::process::Output;

use futures::FutureExt;
use tokio::{process::Command, task::JoinError};

use crate::{
    catch::{panic_error, Catch, Completion, TaskFn},
    error::CommandError,
};

pub(crate) fn in_thread<F, T, E>(func: F) -> TaskFn<T, E>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    Box::new(move || {
        async move {
            match tokio::task::spawn_blocking(func).await {
                Ok(result) => Completion::Returned(result),
                Err(error) => Completion::Raised(join_error(error)),
            }
        }
        .boxed()
    })
}

pub(crate) fn in_thread_catching<F, T>(func: F, catch: Catch) -> TaskFn<T, anyhow::Error>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    Box::new(move || {
        async move {
            match tokio::task::spawn_blocking(func).await {
                Ok(result) => catch.classify(result),
                Err(error) => Completion::Raised(join_error(error)),
            }
        }
        .boxed()
    })
}

pub(crate) fn in_process(mut command: Command) -> TaskFn<Output, CommandError> {
    command.kill_on_drop(true);
    Box::new(move || {
        async move {
            let result = match command.output().await {
                Ok(output) if output.status.success() => Ok(output),
                Ok(output) => Err(CommandError::Exit(output)),
                Err(error) => Err(CommandError::Io(error)),
            };
            Completion::Returned(result)
        }
        .boxed()
    })
}

fn join_error(error: JoinError) -> anyhow::Error {
    match error.try_into_panic() {
        Ok(payload) => panic_error(payload),
        Err(error) => anyhow::Error::new(error),
    }
}
