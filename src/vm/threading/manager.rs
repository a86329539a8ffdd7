use crate::{
    error::ThreadError,
    utils::time::{deadline_after, millis_until},
    value::ObjectRef,
    vm::threading::{
        JoinOutcome, JoinTimeout, ThreadConfig, ThreadManagerOps, ThreadRegistry, TimedThread,
    },
};
use std::{
    thread::{self, ThreadId},
    time::Instant,
};
use tracing::{debug, warn};

/// Value a managed start routine hands back when it finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ExitStatus(pub isize);

pub type StartFn = Box<dyn FnOnce() -> ExitStatus + Send + 'static>;

/// Finds the native entry point behind a managed `ThreadStart` delegate.
pub trait StartResolver: Send + Sync {
    fn resolve_start(&self, delegate: &ObjectRef) -> Option<StartFn>;
}

impl<F> StartResolver for F
where
    F: Fn(&ObjectRef) -> Option<StartFn> + Send + Sync,
{
    fn resolve_start(&self, delegate: &ObjectRef) -> Option<StartFn> {
        self(delegate)
    }
}

/// Runtime-facing thread operations on top of [`TimedThread`] and
/// [`ThreadRegistry`].
///
/// Created once per runtime with the object that stands for the process's
/// initial thread, which never gets a handle of its own.
/// [`shutdown`](ThreadManagerOps::shutdown) drains the registry at teardown.
pub struct ThreadManager {
    threads: ThreadRegistry<ExitStatus>,
    main_thread: ObjectRef,
    resolver: Box<dyn StartResolver>,
    config: ThreadConfig,
}

impl ThreadManager {
    pub fn new(main_thread: ObjectRef, resolver: impl StartResolver + 'static) -> Self {
        Self::with_config(main_thread, resolver, ThreadConfig::default())
    }

    pub fn with_config(
        main_thread: ObjectRef,
        resolver: impl StartResolver + 'static,
        config: ThreadConfig,
    ) -> Self {
        Self {
            threads: ThreadRegistry::new(),
            main_thread,
            resolver: Box::new(resolver),
            config,
        }
    }

    pub fn main_thread(&self) -> &ObjectRef {
        &self.main_thread
    }

    pub fn config(&self) -> &ThreadConfig {
        &self.config
    }

    pub fn try_start(&self, owner: ObjectRef, delegate: &ObjectRef) -> Result<ThreadId, ThreadError> {
        thread_trace!("Trying to start a new thread for {:?}", owner);

        let start = self
            .resolver
            .resolve_start(delegate)
            .ok_or(ThreadError::StartNotResolved)?;
        let thread = TimedThread::spawn(owner, &self.config, start)?;
        Ok(self.threads.register(thread))
    }

    /// Join thread `id`, removing it from the registry once it has exited.
    ///
    /// A timed-out thread stays registered and can be joined again.
    pub fn try_join(
        &self,
        id: ThreadId,
        timeout: JoinTimeout,
    ) -> Result<JoinOutcome<ExitStatus>, ThreadError> {
        if id == thread::current().id() {
            return Err(ThreadError::SelfJoin(id));
        }

        let thread = self
            .threads
            .lookup(id)
            .ok_or(ThreadError::UnknownThread(id))?;

        thread_trace!("Joining with thread {:?}, timeout {:?}", id, timeout);
        let outcome = thread.join(timeout.deadline(Instant::now()));
        if outcome.is_exited() {
            self.threads.remove(id);
        }
        Ok(outcome)
    }
}

impl ThreadManagerOps for ThreadManager {
    fn start(&self, owner: ObjectRef, delegate: &ObjectRef) -> Option<ThreadId> {
        match self.try_start(owner, delegate) {
            Ok(id) => Some(id),
            Err(e) => {
                warn!("{}", e);
                None
            }
        }
    }

    /// Interruptible sleep. Non-positive durations only yield.
    fn sleep(&self, millis: i32) -> i32 {
        if millis <= 0 {
            thread::yield_now();
            return 0;
        }

        let start = Instant::now();
        let Some(deadline) = deadline_after(start, millis as u64) else {
            return 0;
        };
        let current = TimedThread::<ExitStatus>::current();
        thread_trace!("Sleeping for {} ms", millis);

        loop {
            let now = Instant::now();
            if current.as_ref().is_some_and(|t| t.take_interrupt()) {
                let remaining = millis_until(deadline, now);
                thread_trace!("Returning {} ms early", remaining);
                return remaining;
            }
            if now >= deadline {
                thread_trace!("Slept");
                return 0;
            }
            thread::park_timeout(deadline - now);
        }
    }

    fn yield_now(&self) {
        thread::yield_now();
    }

    fn current_thread(&self) -> ObjectRef {
        match TimedThread::<ExitStatus>::current() {
            Some(thread) => thread.owner().clone(),
            // Not one of ours, so it must be the initial thread.
            None => self.main_thread.clone(),
        }
    }

    fn join(&self, id: ThreadId, timeout_ms: i32) -> bool {
        match self.try_join(id, JoinTimeout::from_millis(timeout_ms)) {
            Ok(JoinOutcome::Exited(_)) => true,
            Ok(JoinOutcome::TimedOut) => {
                debug!("Join with thread {:?} timed out after {} ms", id, timeout_ms);
                false
            }
            Err(e) => {
                warn!("{}", e);
                false
            }
        }
    }

    fn interrupt(&self, id: ThreadId) -> bool {
        match self.threads.lookup(id) {
            Some(thread) => {
                thread.interrupt();
                true
            }
            None => {
                warn!("{}", ThreadError::UnknownThread(id));
                false
            }
        }
    }

    fn thread_count(&self) -> usize {
        self.threads.len()
    }

    fn shutdown(&self) {
        thread_trace!("Joining each running thread...");
        let drained = self.threads.shutdown();
        debug!("Drained {} managed thread(s)", drained);
    }
}
