use std::time::Duration;

use futures::future::BoxFuture;

pub type StubResult = Result<i32, String>;

// Default stub delay: two milliseconds.
#[allow(unused)]
pub const DELAY: Duration = Duration::from_millis(2);

/// Sleeps for `delay`, then returns `Err(err)` if given, else `Ok(ok)`.
#[allow(unused)]
pub async fn task_stub(delay: Duration, ok: i32, err: Option<&'static str>) -> StubResult {
    tokio::time::sleep(delay).await;
    match err {
        Some(err) => Err(err.to_string()),
        None => Ok(ok),
    }
}

/// Sleeps for `delay`, then panics with `message`.
#[allow(unused)]
pub async fn panicking_stub(delay: Duration, message: &'static str) -> StubResult {
    tokio::time::sleep(delay).await;
    panic!("{message}")
}

#[allow(unused)]
pub fn ok_after(delay: Duration, ok: i32) -> impl FnOnce() -> BoxFuture<'static, StubResult> {
    move || Box::pin(task_stub(delay, ok, None))
}

#[allow(unused)]
pub fn err_after(
    delay: Duration,
    err: &'static str,
) -> impl FnOnce() -> BoxFuture<'static, StubResult> {
    move || Box::pin(task_stub(delay, 0, Some(err)))
}

#[allow(unused)]
pub fn panic_after(
    delay: Duration,
    message: &'static str,
) -> impl FnOnce() -> BoxFuture<'static, StubResult> {
    move || Box::pin(panicking_stub(delay, message))
}
