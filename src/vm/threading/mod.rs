//! Managed threads for the .NET virtual machine.
//!
//! This module backs `System.Threading.Thread`: starting a thread from a
//! delegate, `Join` with an optional timeout, `Sleep`, `Yield` and
//! `CurrentThread`.
//!
//! # Architecture
//!
//! - [`timed`]: [`TimedThread`], one per spawned OS thread. The OS thread is
//!   detached; termination is published through a private mutex/condvar pair so
//!   joins can carry a deadline.
//! - [`registry`]: [`ThreadRegistry`], the identity → handle table used by
//!   operations addressed by thread id.
//! - [`manager`]: [`ThreadManager`], the runtime-facing surface described by
//!   [`ThreadManagerOps`]. Failures are logged and reported as `false`/`None`.
//!
//! # Timeouts
//!
//! Managed `Join` timeouts arrive as milliseconds where `0` means *wait
//! forever*. [`JoinTimeout::from_millis`] is the only place that convention is
//! decoded; [`JoinTimeout::Poll`] is the explicit "check without waiting".
//!
//! # Example
//!
//! ```ignore
//! let manager = ThreadManager::new(main_thread, resolver);
//! let id = manager.start(thread_object, &delegate).expect("start failed");
//! if !manager.join(id, 500) {
//!     // still running, still registered: join again later
//! }
//! manager.shutdown();
//! ```
use crate::{utils::time::deadline_after, value::ObjectRef};
use std::{
    thread::ThreadId,
    time::{Duration, Instant},
};

pub mod config;
mod manager;
pub mod registry;
pub mod timed;

pub use config::ThreadConfig;
pub use manager::*;
pub use registry::ThreadRegistry;
pub use timed::{JoinOutcome, ThreadExit, TimedThread};

/// How long a join may wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinTimeout {
    /// Block until the thread exits.
    Infinite,
    /// Check once and return immediately.
    Poll,
    After(Duration),
}

impl JoinTimeout {
    /// Managed timeout value meaning "wait forever".
    pub const INFINITE_MILLIS: i32 = 0;

    /// Decode a managed `Join(int)` timeout: `0` waits forever, negative values
    /// only poll, anything else waits that many milliseconds.
    pub fn from_millis(millis: i32) -> Self {
        match millis {
            Self::INFINITE_MILLIS => JoinTimeout::Infinite,
            m if m < 0 => JoinTimeout::Poll,
            m => JoinTimeout::After(Duration::from_millis(m as u64)),
        }
    }

    /// Absolute deadline for a join starting at `now`; `None` means no deadline.
    pub fn deadline(self, now: Instant) -> Option<Instant> {
        match self {
            JoinTimeout::Infinite => None,
            JoinTimeout::Poll => Some(now),
            JoinTimeout::After(timeout) => {
                deadline_after(now, timeout.as_millis().try_into().unwrap_or(u64::MAX))
            }
        }
    }
}

pub trait ThreadManagerOps {
    /// Start `owner`'s thread running the method resolved from `delegate`.
    /// Returns `None` if nothing could be started.
    fn start(&self, owner: ObjectRef, delegate: &ObjectRef) -> Option<ThreadId>;
    /// Sleep the calling thread; returns the milliseconds left if interrupted.
    fn sleep(&self, millis: i32) -> i32;
    fn yield_now(&self);
    /// The managed object for the calling thread.
    fn current_thread(&self) -> ObjectRef;
    /// Join thread `id`; `timeout_ms == 0` waits forever.
    fn join(&self, id: ThreadId, timeout_ms: i32) -> bool;
    fn interrupt(&self, id: ThreadId) -> bool;
    fn thread_count(&self) -> usize;
    /// Join every outstanding thread. Called once at runtime teardown.
    fn shutdown(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_means_forever() {
        assert_eq!(JoinTimeout::from_millis(0), JoinTimeout::Infinite);
        assert_eq!(JoinTimeout::Infinite.deadline(Instant::now()), None);
    }

    #[test]
    fn test_negative_polls() {
        let now = Instant::now();
        assert_eq!(JoinTimeout::from_millis(-1), JoinTimeout::Poll);
        assert_eq!(JoinTimeout::Poll.deadline(now), Some(now));
    }

    #[test]
    fn test_positive_is_relative_to_now() {
        let now = Instant::now();
        let timeout = JoinTimeout::from_millis(250);
        assert_eq!(timeout, JoinTimeout::After(Duration::from_millis(250)));
        assert_eq!(timeout.deadline(now), Some(now + Duration::from_millis(250)));
    }
}
