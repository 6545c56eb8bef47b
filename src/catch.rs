//! Turning raised errors into task failures.
//!
//! A task built with a [`Catch`] runs a function returning `anyhow::Result<T>`. Errors the
//! predicate accepts become the task's `Err` result (`Failure`); anything else is treated as
//! raised and lands in `Exception`.

use std::{any::Any, fmt, future::Future, sync::Arc};

use futures::{future::BoxFuture, FutureExt};

/// What a task body produced when it did not get cancelled.
pub(crate) enum Completion<T, E> {
    /// The function handed back a result.
    Returned(Result<T, E>),
    /// The function raised: it panicked, or returned an error no predicate accepted.
    Raised(anyhow::Error),
}

pub(crate) type TaskBody<T, E> = BoxFuture<'static, Completion<T, E>>;
pub(crate) type TaskFn<T, E> = Box<dyn FnOnce() -> TaskBody<T, E> + Send>;

/// A typed predicate selecting which errors a task treats as ordinary failures.
///
/// ```rust
/// use task_manager::Catch;
///
/// let catch = Catch::error::<std::io::Error>().or(Catch::error::<std::fmt::Error>());
/// assert!(catch.matches(&anyhow::Error::new(std::fmt::Error)));
/// assert!(!catch.matches(&anyhow::anyhow!("something else")));
/// ```
#[derive(Clone)]
pub struct Catch(Arc<dyn Fn(&anyhow::Error) -> bool + Send + Sync>);

impl Catch {
    pub fn new<P>(predicate: P) -> Self
    where
        P: Fn(&anyhow::Error) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(predicate))
    }

    /// Accepts every error.
    pub fn all() -> Self {
        Self::new(|_| true)
    }

    /// Accepts errors whose underlying type is `E`.
    pub fn error<E>() -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::new(|error| error.is::<E>())
    }

    /// Accepts what either predicate accepts.
    pub fn or(self, other: Catch) -> Self {
        Self::new(move |error| self.matches(error) || other.matches(error))
    }

    pub fn matches(&self, error: &anyhow::Error) -> bool {
        (self.0)(error)
    }

    pub(crate) fn classify<T>(&self, result: anyhow::Result<T>) -> Completion<T, anyhow::Error> {
        match result {
            Ok(value) => Completion::Returned(Ok(value)),
            Err(error) if self.matches(&error) => Completion::Returned(Err(error)),
            Err(error) => Completion::Raised(error),
        }
    }
}

impl fmt::Debug for Catch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Catch").finish_non_exhaustive()
    }
}

pub(crate) fn returning<F, Fut, T, E>(func: F) -> TaskFn<T, E>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    Box::new(move || func().map(Completion::Returned).boxed())
}

pub(crate) fn catching<F, Fut, T>(func: F, catch: Catch) -> TaskFn<T, anyhow::Error>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    T: Send + 'static,
{
    Box::new(move || func().map(move |result| catch.classify(result)).boxed())
}

/// Converts a panic payload into the error stored on an `Exception` task.
pub(crate) fn panic_error(payload: Box<dyn Any + Send>) -> anyhow::Error {
    let message = payload
        .downcast_ref::<&str>()
        .map(|message| message.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    anyhow::anyhow!("task panicked: {message}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmatched_errors_are_raised() {
        let catch = Catch::error::<std::io::Error>();
        let raised = catch.classify::<()>(Err(anyhow::anyhow!("boom")));
        assert!(matches!(raised, Completion::Raised(_)));

        let caught = catch.classify::<()>(Err(std::io::Error::other("disk").into()));
        assert!(matches!(caught, Completion::Returned(Err(_))));
    }

    #[test]
    fn panic_payloads_keep_their_message() {
        let error = panic_error(Box::new("kaboom"));
        assert_eq!(error.to_string(), "task panicked: kaboom");

        let error = panic_error(Box::new(String::from("owned")));
        assert_eq!(error.to_string(), "task panicked: owned");
    }

    #[test]
    fn values_pass_through() {
        let completion = Catch::all().classify(Ok(7));
        assert!(matches!(completion, Completion::Returned(Ok(7))));
    }
}
