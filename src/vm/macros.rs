/// Lifecycle trace for managed threads, compiled in only with the
/// `thread-debug` feature.
macro_rules! thread_trace {
    ($($arg:tt)*) => {
        #[cfg(feature = "thread-debug")]
        tracing::trace!($($arg)*);
    };
}
