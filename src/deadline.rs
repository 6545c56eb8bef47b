//! Absolute deadlines against an injectable wall clock.
//!
//! A deadline is computed once, from an optional relative timeout and an optional
//! absolute point in time, and never changes afterwards. Every check takes the clock
//! explicitly so tests can freeze or move time without touching the system clock.

use std::time::{Duration, SystemTime};

/// Source of "now".
///
/// Any `Fn() -> SystemTime` closure is a clock, which keeps tests short:
///
/// ```rust
/// use std::time::{Duration, SystemTime, UNIX_EPOCH};
/// use task_manager::{deadline_is_expired, Deadline};
///
/// let deadline = Deadline::at(UNIX_EPOCH + Duration::from_secs(1));
/// assert!(deadline_is_expired(&deadline, &|| UNIX_EPOCH + Duration::from_secs(1)));
/// ```
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> SystemTime;
}

/// The real wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

impl<F> Clock for F
where
    F: Fn() -> SystemTime + Send + Sync + 'static,
{
    fn now(&self) -> SystemTime {
        self()
    }
}

/// An absolute point in time after which a task is cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Deadline(SystemTime);

impl Deadline {
    pub const fn at(instant: SystemTime) -> Self {
        Self(instant)
    }

    pub const fn instant(&self) -> SystemTime {
        self.0
    }

    /// Combines a relative timeout and an absolute deadline into one deadline.
    ///
    /// Returns `None` when neither is given. When both are given the earlier of
    /// `now + timeout` and `at` wins. A timeout too large to represent counts as absent.
    pub fn create<C: Clock + ?Sized>(
        timeout: Option<Duration>,
        at: Option<SystemTime>,
        clock: &C,
    ) -> Option<Self> {
        let relative = timeout.and_then(|timeout| clock.now().checked_add(timeout));
        let instant = match (relative, at) {
            (Some(relative), Some(at)) => Some(relative.min(at)),
            (relative, at) => relative.or(at),
        };
        instant.map(Self)
    }

    /// True once `clock` has reached the deadline.
    pub fn is_expired<C: Clock + ?Sized>(&self, clock: &C) -> bool {
        self.0 <= clock.now()
    }

    /// Time left before the deadline, saturating at zero once it has passed.
    pub fn to_timeout<C: Clock + ?Sized>(&self, clock: &C) -> Duration {
        self.0
            .duration_since(clock.now())
            .unwrap_or(Duration::ZERO)
    }
}

impl From<SystemTime> for Deadline {
    fn from(instant: SystemTime) -> Self {
        Self(instant)
    }
}

/// See [`Deadline::create`].
pub fn create_deadline<C: Clock + ?Sized>(
    timeout: Option<Duration>,
    at: Option<SystemTime>,
    clock: &C,
) -> Option<Deadline> {
    Deadline::create(timeout, at, clock)
}

/// See [`Deadline::is_expired`].
pub fn deadline_is_expired<C: Clock + ?Sized>(deadline: &Deadline, clock: &C) -> bool {
    deadline.is_expired(clock)
}

/// See [`Deadline::to_timeout`].
pub fn deadline_to_timeout<C: Clock + ?Sized>(deadline: &Deadline, clock: &C) -> Duration {
    deadline.to_timeout(clock)
}
