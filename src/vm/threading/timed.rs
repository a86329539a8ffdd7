//! Joinable-with-timeout managed threads.
//!
//! `std::thread::JoinHandle::join` can only block without bound, so the OS
//! thread is detached as soon as it is created and termination is tracked in
//! user space instead: the worker publishes its exit status under a private
//! mutex and signals a condition variable while still holding it. Joiners test
//! the durable exit state under the same mutex before every wait, so an exit
//! that happens before anyone starts waiting is never lost, and any number of
//! joiners (bounded or not) observe the same result.
use crate::{
    error::ThreadError,
    utils::sync::{Arc, AtomicBool, Condvar, Mutex, Ordering},
    value::ObjectRef,
    vm::threading::config::ThreadConfig,
};
use std::{
    any::Any,
    cell::RefCell,
    panic::{self, AssertUnwindSafe},
    sync::OnceLock,
    thread::{self, Thread, ThreadId},
    time::Instant,
};
use tracing::error;

thread_local! {
    /// Handle of the managed thread running on this OS thread. Only set on
    /// threads started by [`TimedThread::spawn`].
    static CURRENT_THREAD: RefCell<Option<Arc<dyn Any + Send + Sync>>> = const { RefCell::new(None) };
}

/// How a managed thread's start routine finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThreadExit<T> {
    Returned(T),
    /// The start routine panicked; carries the panic message.
    Panicked(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome<T> {
    Exited(ThreadExit<T>),
    TimedOut,
}

impl<T> JoinOutcome<T> {
    pub fn is_exited(&self) -> bool {
        matches!(self, JoinOutcome::Exited(_))
    }
}

/// Bookkeeping for one spawned worker.
#[derive(Debug)]
pub struct TimedThread<T> {
    /// Managed object this thread runs on behalf of
    owner: ObjectRef,
    /// OS thread, recorded before `spawn` returns
    thread: OnceLock<Thread>,
    /// `None` until the worker exits; written exactly once
    exit: Mutex<Option<ThreadExit<T>>>,
    exit_cond: Condvar,
    /// Set by `interrupt`, consumed by the next interruptible sleep
    interrupt_pending: AtomicBool,
}

impl<T: Clone + Send + 'static> TimedThread<T> {
    /// Start `start` on a new detached OS thread.
    ///
    /// If the OS refuses to create the thread, the error is returned and the
    /// handle is dropped with the unused closure.
    pub fn spawn<F>(owner: ObjectRef, config: &ThreadConfig, start: F) -> Result<Arc<Self>, ThreadError>
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let handle = Arc::new(Self {
            owner,
            thread: OnceLock::new(),
            exit: Mutex::new(None),
            exit_cond: Condvar::new(),
            interrupt_pending: AtomicBool::new(false),
        });

        let worker = handle.clone();
        let join_handle = config
            .builder()
            .spawn(move || worker.run(start))
            .map_err(|e| ThreadError::SpawnFailed(e.to_string()))?;

        let _ = handle.thread.set(join_handle.thread().clone());
        // Detach: the OS reclaims the thread on its own, joins go through `exit`.
        drop(join_handle);

        thread_trace!("Started thread {:?}", handle.id());
        Ok(handle)
    }

    fn run<F: FnOnce() -> T>(self: Arc<Self>, start: F) {
        let _ = self.thread.set(thread::current());
        CURRENT_THREAD.set(Some(self.clone() as Arc<dyn Any + Send + Sync>));

        let exit = match panic::catch_unwind(AssertUnwindSafe(start)) {
            Ok(status) => ThreadExit::Returned(status),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!("Managed thread {:?} panicked: {}", self.id(), message);
                ThreadExit::Panicked(message)
            }
        };

        self.signal_exit(exit);
        CURRENT_THREAD.set(None);
    }

    fn signal_exit(&self, exit: ThreadExit<T>) {
        let mut state = self.exit.lock();
        debug_assert!(state.is_none(), "managed thread exited twice");
        *state = Some(exit);
        self.exit_cond.notify_all();
    }

    /// Wait for the thread to exit, giving up at `deadline` if one is given.
    ///
    /// Repeatable: once the thread has exited every call returns the same
    /// status immediately.
    pub fn join(&self, deadline: Option<Instant>) -> JoinOutcome<T> {
        let mut state = self.exit.lock();
        loop {
            if let Some(exit) = state.as_ref() {
                return JoinOutcome::Exited(exit.clone());
            }

            match deadline {
                None => self.exit_cond.wait(&mut state),
                Some(deadline) => {
                    if self.exit_cond.wait_until(&mut state, deadline).timed_out()
                        && state.is_none()
                    {
                        return JoinOutcome::TimedOut;
                    }
                }
            }
        }
    }

    /// The handle of the calling thread, if this subsystem spawned it with the
    /// same status type.
    pub fn current() -> Option<Arc<Self>> {
        CURRENT_THREAD
            .with_borrow(|slot| slot.clone())
            .and_then(|any| any.downcast::<Self>().ok())
    }
}

impl<T> TimedThread<T> {
    pub fn owner(&self) -> &ObjectRef {
        &self.owner
    }

    pub fn thread(&self) -> &Thread {
        self.thread
            .get()
            .expect("OS thread is recorded before spawn returns")
    }

    pub fn id(&self) -> ThreadId {
        self.thread().id()
    }

    pub fn has_exited(&self) -> bool {
        self.exit.lock().is_some()
    }

    /// Ask the thread to cut its current (or next) interruptible sleep short.
    pub fn interrupt(&self) {
        self.interrupt_pending.store(true, Ordering::Release);
        self.thread().unpark();
    }

    /// Consume a pending interrupt request.
    pub fn take_interrupt(&self) -> bool {
        self.interrupt_pending.swap(false, Ordering::AcqRel)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "<non-string panic payload>".to_owned()
    }
}
