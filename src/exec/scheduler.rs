use crate::foundation::error::{TesseraError, TesseraResult};

/// Payload of a [`WorkPackage`], tagged by dispatch kind.
pub enum WorkPayload {
    /// Run an arbitrary callable on a worker thread.
    CustomFunction(Box<dyn FnOnce() + Send>),
}

/// A transient unit of dispatch: a payload plus a completion hook.
///
/// Packages are created per sub-region inside the executor's split primitive
/// and consumed by the scheduler exactly once. The completion hook runs after
/// the payload returns, and must run even when the payload skips its work;
/// callers count completions, not payloads.
pub struct WorkPackage {
    payload: WorkPayload,
    executed: Box<dyn FnOnce() + Send>,
}

impl WorkPackage {
    /// Build a custom-function package from a payload and a completion hook.
    pub fn custom_function(
        execute: impl FnOnce() + Send + 'static,
        executed: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            payload: WorkPayload::CustomFunction(Box::new(execute)),
            executed: Box::new(executed),
        }
    }

    /// Consume the package: run the payload, then the completion hook.
    pub fn run(self) {
        match self.payload {
            WorkPayload::CustomFunction(f) => f(),
        }
        (self.executed)();
    }
}

impl std::fmt::Debug for WorkPackage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match &self.payload {
            WorkPayload::CustomFunction(_) => "CustomFunction",
        };
        f.debug_struct("WorkPackage").field("payload", &kind).finish()
    }
}

/// Executes [`WorkPackage`]s on worker threads and reports pool capacity.
///
/// The executor discovers [`WorkScheduler::capacity`] once at construction
/// and uses it to size region splits. Completion is observed exclusively
/// through per-package hooks; [`WorkScheduler::drain`] is a flush hint, not a
/// completion barrier.
pub trait WorkScheduler: Send + Sync {
    /// Number of worker threads available for concurrent packages.
    fn capacity(&self) -> usize;

    /// Queue a package for execution. Ordering between queued packages is
    /// unspecified.
    fn submit(&self, work: WorkPackage);

    /// Hint that queued packages should be flushed to workers. Not required
    /// to block until the queue is empty.
    fn drain(&self) {}

    /// Whether accelerated compute devices are present.
    fn has_accelerated_devices(&self) -> bool {
        false
    }
}

/// Scheduler backed by a dedicated rayon thread pool.
#[derive(Debug)]
pub struct ThreadPoolScheduler {
    pool: rayon::ThreadPool,
}

impl ThreadPoolScheduler {
    /// Build a pool scheduler. `threads: None` uses rayon defaults.
    pub fn new(threads: Option<usize>) -> TesseraResult<Self> {
        if let Some(n) = threads
            && n == 0
        {
            return Err(TesseraError::validation(
                "scheduler 'threads' must be >= 1 when set",
            ));
        }
        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(n) = threads {
            builder = builder.num_threads(n);
        }
        let pool = builder
            .build()
            .map_err(|e| TesseraError::execution(format!("failed to build rayon thread pool: {e}")))?;
        Ok(Self { pool })
    }
}

impl WorkScheduler for ThreadPoolScheduler {
    fn capacity(&self) -> usize {
        self.pool.current_num_threads()
    }

    fn submit(&self, work: WorkPackage) {
        self.pool.spawn(move || work.run());
    }

    // drain() stays the default no-op: spawn hands packages straight to the
    // pool, and completion is observed through the per-package hooks.
}

/// Scheduler that runs every package synchronously on the submitting thread.
///
/// Capacity is 1. Useful in tests and in embeddings that cannot spawn
/// threads; with it, the executor's split primitive degenerates to a plain
/// sequential loop.
#[derive(Clone, Copy, Debug, Default)]
pub struct InlineScheduler;

impl WorkScheduler for InlineScheduler {
    fn capacity(&self) -> usize {
        1
    }

    fn submit(&self, work: WorkPackage) {
        work.run();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn package_runs_payload_before_completion_hook() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let payload_order = Arc::clone(&order);
        let hook_order = Arc::clone(&order);
        let pkg = WorkPackage::custom_function(
            move || payload_order.lock().unwrap().push("payload"),
            move || hook_order.lock().unwrap().push("executed"),
        );
        pkg.run();
        assert_eq!(*order.lock().unwrap(), vec!["payload", "executed"]);
    }

    #[test]
    fn inline_scheduler_runs_on_the_submitting_thread() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        InlineScheduler.submit(WorkPackage::custom_function(
            move || {
                seen.fetch_add(1, Ordering::SeqCst);
            },
            || {},
        ));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(InlineScheduler.capacity(), 1);
    }

    #[test]
    fn thread_pool_scheduler_rejects_zero_threads() {
        assert!(ThreadPoolScheduler::new(Some(0)).is_err());
    }

    #[test]
    fn thread_pool_scheduler_executes_submitted_packages() {
        let sched = ThreadPoolScheduler::new(Some(2)).unwrap();
        assert_eq!(sched.capacity(), 2);
        assert!(!sched.has_accelerated_devices());

        let (tx, rx) = mpsc::channel();
        for i in 0..4 {
            let tx = tx.clone();
            sched.submit(WorkPackage::custom_function(
                move || {
                    let _ = tx.send(i);
                },
                || {},
            ));
        }
        drop(tx);

        let mut got = Vec::new();
        for _ in 0..4 {
            got.push(rx.recv_timeout(Duration::from_secs(5)).unwrap());
        }
        got.sort_unstable();
        assert_eq!(got, vec![0, 1, 2, 3]);
    }
}
