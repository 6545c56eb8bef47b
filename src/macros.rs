//! Logging shims: forward to `tracing` when the `with_tracing` feature is on,
//! compile to nothing otherwise.

macro_rules! debug {
    ($($arg:tt)+) => {{
        #[cfg(feature = "with_tracing")]
        tracing::debug!($($arg)+);
    }};
}

macro_rules! log_warn {
    ($($arg:tt)+) => {{
        #[cfg(feature = "with_tracing")]
        tracing::warn!($($arg)+);
    }};
}

pub(crate) use debug;
pub(crate) use log_warn;
