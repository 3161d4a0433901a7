use std::{
    collections::HashMap,
    future::Future,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
};

use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::DeferredError;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A monotonically increasing identifier tying a deferred task to the
/// fulfilment message the scheduler eventually sends for it.
pub type Serial = u64;

/// The callback a [`Scheduler`] delivers a deferred task's outcome to.
///
/// Exactly one of `error`/`data` is called per serial; `end` is a reserved
/// extra marker for the (unimplemented) streaming variant of a deferred,
/// sent after a `data` call that isn't the final one.
pub trait Resolver: Send + Sync {
    /// The task registered under `serial` failed.
    fn error(&self, serial: Serial, err: DeferredError);

    /// The task registered under `serial` completed with `bytes`.
    fn data(&self, serial: Serial, bytes: Vec<u8>);

    /// Marks `serial` as having no further values (streaming deferreds).
    fn end(&self, serial: Serial) {
        let _ = serial;
    }
}

/// Schedules asynchronous work requested by a script and bridges its
/// outcome back through a [`Resolver`], tagged with a [`Serial`].
///
/// The script engine itself runs single-threaded and cooperative; it can't
/// await anything. A `Scheduler` lets the host accept a request, hand back
/// a serial immediately, and keep running the engine while a background
/// task does the actual work — an HTTP fetch, a plugin render, anything
/// that would otherwise block the single engine thread.
#[derive(Debug, Default)]
pub struct Scheduler {
    next_serial: AtomicU64,
    outstanding: Arc<Outstanding>,
    cancels: Arc<Mutex<HashMap<Serial, CancellationToken>>>,
}

impl Scheduler {
    /// Builds a scheduler with no outstanding work, starting serials at 1.
    pub fn new() -> Self {
        Self {
            next_serial: AtomicU64::new(1),
            outstanding: Arc::new(Outstanding::default()),
            cancels: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Registers `perform` to run in the background under a fresh,
    /// independent cancellation context. Returns the serial immediately;
    /// `resolver` is called with the outcome once `perform` completes.
    pub fn register<F, Fut>(&self, perform: F, resolver: Arc<dyn Resolver>) -> Serial
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Vec<u8>, DeferredError>> + Send + 'static,
    {
        self.register_with_context(CancellationToken::new(), perform, resolver)
    }

    /// As [`Scheduler::register`], but `perform` runs under a child of
    /// `ctx`, so cancelling or letting `ctx` expire cancels this task too.
    pub fn register_with_context<F, Fut>(
        &self,
        ctx: CancellationToken,
        perform: F,
        resolver: Arc<dyn Resolver>,
    ) -> Serial
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Vec<u8>, DeferredError>> + Send + 'static,
    {
        let serial = self.next_serial.fetch_add(1, Ordering::SeqCst);
        let token = ctx.child_token();

        self.cancels
            .lock()
            .expect("deferred cancel map poisoned")
            .insert(serial, token.clone());
        self.outstanding.increment();

        let outstanding = self.outstanding.clone();
        let cancels = self.cancels.clone();

        let task = async move {
            let outcome = perform(token).await;
            match outcome {
                Ok(bytes) => {
                    trace!(serial, "deferred resolved with data");
                    resolver.data(serial, bytes);
                }
                Err(err) => {
                    trace!(serial, %err, "deferred resolved with error");
                    resolver.error(serial, err);
                }
            }
            cancels.lock().expect("deferred cancel map poisoned").remove(&serial);
            outstanding.decrement();
        };

        tokio::spawn(task);
        serial
    }

    /// Requests cancellation of the task registered under `serial`, if it
    /// is still outstanding. Safe to call more than once, and safe to race
    /// against the task completing on its own — cancellation is advisory,
    /// the task may still produce a successful result.
    pub fn cancel(&self, serial: Serial) {
        let token = self
            .cancels
            .lock()
            .expect("deferred cancel map poisoned")
            .remove(&serial);
        if let Some(token) = token {
            token.cancel();
        }
    }

    /// Blocks until every currently outstanding deferred has produced its
    /// terminal outcome. The single join point a host uses before exiting.
    pub async fn wait(&self) {
        self.outstanding.wait().await;
    }
}

/// A `sync.WaitGroup`-style barrier: tracks an outstanding count and wakes
/// every waiter once it reaches zero.
#[derive(Debug, Default)]
struct Outstanding {
    count: AtomicU64,
    notify: tokio::sync::Notify,
}

impl Outstanding {
    fn increment(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    fn decrement(&self) {
        if self.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.notify.notify_waiters();
        }
    }

    async fn wait(&self) {
        loop {
            if self.count.load(Ordering::SeqCst) == 0 {
                return;
            }
            let notified = self.notify.notified();
            if self.count.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Mutex, time::Duration};

    use super::*;

    #[derive(Default)]
    struct RecordingResolver {
        data: Mutex<Vec<(Serial, Vec<u8>)>>,
        errors: Mutex<Vec<Serial>>,
    }

    impl Resolver for RecordingResolver {
        fn error(&self, serial: Serial, _err: DeferredError) {
            self.errors.lock().unwrap().push(serial);
        }

        fn data(&self, serial: Serial, bytes: Vec<u8>) {
            self.data.lock().unwrap().push((serial, bytes));
        }
    }

    #[test_log::test(tokio::test)]
    async fn register_delivers_data_on_success() {
        let scheduler = Scheduler::new();
        let resolver = Arc::new(RecordingResolver::default());

        let serial = scheduler.register(|_ctx| async { Ok(b"hello".to_vec()) }, resolver.clone());
        scheduler.wait().await;

        assert_eq!(resolver.data.lock().unwrap().as_slice(), &[(serial, b"hello".to_vec())]);
        assert!(resolver.errors.lock().unwrap().is_empty());
    }

    #[test_log::test(tokio::test)]
    async fn register_delivers_error_on_failure() {
        let scheduler = Scheduler::new();
        let resolver = Arc::new(RecordingResolver::default());

        let serial = scheduler.register(
            |_ctx| async { Err(DeferredError::custom(anyhow::anyhow!("boom"))) },
            resolver.clone(),
        );
        scheduler.wait().await;

        assert_eq!(resolver.errors.lock().unwrap().as_slice(), &[serial]);
        assert!(resolver.data.lock().unwrap().is_empty());
    }

    #[test_log::test(tokio::test)]
    async fn serials_are_monotonically_increasing() {
        let scheduler = Scheduler::new();
        let resolver = Arc::new(RecordingResolver::default());

        let a = scheduler.register(|_ctx| async { Ok(Vec::new()) }, resolver.clone());
        let b = scheduler.register(|_ctx| async { Ok(Vec::new()) }, resolver.clone());
        scheduler.wait().await;

        assert!(b > a);
    }

    #[test_log::test(tokio::test)]
    async fn cancel_before_completion_surfaces_as_error() {
        let scheduler = Scheduler::new();
        let resolver = Arc::new(RecordingResolver::default());
        let ctx = CancellationToken::new();

        let serial = scheduler.register_with_context(
            ctx.clone(),
            |token| async move {
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs(1)) => Ok(b"too slow".to_vec()),
                    _ = token.cancelled() => Err(DeferredError::Cancelled),
                }
            },
            resolver.clone(),
        );

        tokio::time::sleep(Duration::from_millis(20)).await;
        scheduler.cancel(serial);
        scheduler.wait().await;

        assert_eq!(resolver.errors.lock().unwrap().as_slice(), &[serial]);
        assert!(resolver.data.lock().unwrap().is_empty());
    }

    #[test_log::test(tokio::test)]
    async fn parent_context_expiry_cancels_child_tasks() {
        let scheduler = Scheduler::new();
        let resolver = Arc::new(RecordingResolver::default());
        let parent = CancellationToken::new();

        let serial = scheduler.register_with_context(
            parent.clone(),
            |token| async move {
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs(1)) => Ok(Vec::new()),
                    _ = token.cancelled() => Err(DeferredError::Cancelled),
                }
            },
            resolver.clone(),
        );

        parent.cancel();
        scheduler.wait().await;

        assert_eq!(resolver.errors.lock().unwrap().as_slice(), &[serial]);
    }

    #[test_log::test(tokio::test)]
    async fn cancel_is_idempotent_and_safe_after_completion() {
        let scheduler = Scheduler::new();
        let resolver = Arc::new(RecordingResolver::default());

        let serial = scheduler.register(|_ctx| async { Ok(Vec::new()) }, resolver.clone());
        scheduler.wait().await;

        // Completed tasks remove their own cancel entry; calling Cancel
        // again must not panic.
        scheduler.cancel(serial);
        scheduler.cancel(serial);
    }

    #[test_log::test(tokio::test)]
    async fn wait_returns_only_once_all_outstanding_settle() {
        let scheduler = Scheduler::new();
        let resolver = Arc::new(RecordingResolver::default());

        for _ in 0..8 {
            scheduler.register(
                |_ctx| async {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    Ok(Vec::new())
                },
                resolver.clone(),
            );
        }
        scheduler.wait().await;

        assert_eq!(resolver.data.lock().unwrap().len(), 8);
    }
}
