use crate::{
    utils::sync::{Arc, Mutex},
    vm::threading::timed::TimedThread,
};
use std::{collections::HashMap, thread::ThreadId};
use tracing::debug;

type ThreadTable<T> = HashMap<ThreadId, Arc<TimedThread<T>>>;

/// Table of live managed threads keyed by OS thread identity.
///
/// The table is created on the first registration and discarded by
/// [`shutdown`](Self::shutdown); a later registration creates a fresh one.
/// Every operation takes the single table lock, and no operation holds it
/// while waiting on a thread.
pub struct ThreadRegistry<T> {
    table: Mutex<Option<ThreadTable<T>>>,
}

impl<T: Clone + Send + 'static> ThreadRegistry<T> {
    pub fn new() -> Self {
        Self {
            table: Mutex::new(None),
        }
    }

    /// Index `thread` under its identity.
    ///
    /// Callers register each live identity once; registering it again before
    /// removal is a bug.
    pub fn register(&self, thread: Arc<TimedThread<T>>) -> ThreadId {
        let id = thread.id();
        let mut table = self.table.lock();
        let previous = table.get_or_insert_with(HashMap::new).insert(id, thread);
        debug_assert!(previous.is_none(), "thread {:?} registered twice", id);
        id
    }

    pub fn lookup(&self, id: ThreadId) -> Option<Arc<TimedThread<T>>> {
        self.table.lock().as_ref()?.get(&id).cloned()
    }

    /// Drop the entry for `id`. Only call this once the thread has been joined.
    ///
    /// Returns `None` if another joiner already removed it.
    pub fn remove(&self, id: ThreadId) -> Option<Arc<TimedThread<T>>> {
        let removed = self.table.lock().as_mut()?.remove(&id);
        if let Some(thread) = &removed {
            debug_assert!(thread.has_exited(), "removed thread {:?} before it exited", id);
        }
        removed
    }

    /// Get the number of currently registered threads.
    pub fn len(&self) -> usize {
        self.table.lock().as_ref().map_or(0, HashMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Join every registered thread without a deadline, then discard the
    /// table. Returns how many threads were drained.
    ///
    /// A thread that never exits blocks this forever. Threads registered while
    /// the drain is running are joined too, so the registry is empty on return.
    pub fn shutdown(&self) -> usize {
        let mut drained = 0;

        loop {
            let pending: Vec<_> = {
                let mut table = self.table.lock();
                let pending: Vec<_> = table
                    .iter()
                    .flat_map(|threads| threads.values().cloned())
                    .collect();
                if pending.is_empty() {
                    *table = None;
                    break;
                }
                pending
            };

            debug!("Joining {} running thread(s)", pending.len());
            for thread in &pending {
                thread.join(None);
            }

            let mut table = self.table.lock();
            if let Some(threads) = table.as_mut() {
                drained += pending
                    .iter()
                    .filter(|thread| threads.remove(&thread.id()).is_some())
                    .count();
            }
        }

        drained
    }
}

impl<T: Clone + Send + 'static> Default for ThreadRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        value::ObjectRef,
        vm::threading::{config::ThreadConfig, timed::JoinOutcome},
    };
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            mpsc,
        },
        thread,
        time::Duration,
    };

    fn spawn<F: FnOnce() -> u32 + Send + 'static>(start: F) -> Arc<TimedThread<u32>> {
        TimedThread::spawn(ObjectRef::new(()), &ThreadConfig::default(), start).unwrap()
    }

    #[test]
    fn test_thread_registration() {
        let registry = ThreadRegistry::new();
        assert!(registry.is_empty());

        let thread = spawn(|| 1);
        let id = registry.register(thread.clone());
        assert_eq!(id, thread.id());
        assert_eq!(registry.len(), 1);
        assert!(Arc::ptr_eq(&registry.lookup(id).unwrap(), &thread));

        assert!(thread.join(None).is_exited());
        assert!(registry.remove(id).is_some());
        assert!(registry.remove(id).is_none());
        assert!(registry.lookup(id).is_none());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_lookup_unknown_before_first_registration() {
        let registry = ThreadRegistry::<u32>::new();
        assert!(registry.lookup(thread::current().id()).is_none());
        assert!(registry.remove(thread::current().id()).is_none());
    }

    #[test]
    fn test_shutdown_joins_everything() {
        let registry = ThreadRegistry::new();
        let finished = Arc::new(AtomicUsize::new(0));

        let threads: Vec<_> = (0..4)
            .map(|i| {
                let finished = finished.clone();
                spawn(move || {
                    thread::sleep(Duration::from_millis(10 * i));
                    finished.fetch_add(1, Ordering::SeqCst);
                    i as u32
                })
            })
            .collect();
        for thread in &threads {
            registry.register(thread.clone());
        }

        assert_eq!(registry.shutdown(), 4);
        assert!(registry.is_empty());
        assert_eq!(finished.load(Ordering::SeqCst), 4);
        assert!(threads.iter().all(|t| t.has_exited()));
    }

    #[test]
    fn test_registry_reusable_after_shutdown() {
        let registry = ThreadRegistry::new();
        assert_eq!(registry.shutdown(), 0);

        let thread = spawn(|| 5);
        let id = registry.register(thread);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.shutdown(), 1);
        assert!(registry.lookup(id).is_none());
    }

    #[test]
    fn test_shutdown_drains_late_registrations() {
        let registry = Arc::new(ThreadRegistry::new());
        let (tx, rx) = mpsc::channel();

        // The first thread registers a second one while the drain waits on it.
        let inner_registry = registry.clone();
        let outer = spawn(move || {
            thread::sleep(Duration::from_millis(30));
            let late = spawn(|| {
                thread::sleep(Duration::from_millis(30));
                2
            });
            tx.send(late.clone()).unwrap();
            inner_registry.register(late);
            1
        });
        registry.register(outer);

        assert_eq!(registry.shutdown(), 2);
        assert!(registry.is_empty());
        let late = rx.recv().unwrap();
        assert!(late.has_exited());
        assert_eq!(
            late.join(None),
            JoinOutcome::Exited(crate::vm::threading::timed::ThreadExit::Returned(2))
        );
    }
}
