//! Deferred invocations for cross-thread slot delivery.
//!
//! When a slot callback is invoked from a thread other than the one owning
//! its [`EventLoop`](crate::event_loop::EventLoop), the call is wrapped in a
//! [`QueuedInvocation`] and posted to that loop. Blocking dispatch pairs the
//! invocation with a [`CompletionHandle`]; the caller parks on the matching
//! [`CompletionWaiter`] until the loop has produced the result.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::variant::Variant;

/// A type-erased invocation that is executed later on another thread.
pub struct QueuedInvocation {
    invoke: Box<dyn FnOnce() -> Variant + Send>,
    completion: Option<CompletionHandle>,
}

impl QueuedInvocation {
    /// Create a fire-and-forget invocation.
    pub fn new<F>(invoke: F) -> Self
    where
        F: FnOnce() -> Variant + Send + 'static,
    {
        Self {
            invoke: Box::new(invoke),
            completion: None,
        }
    }

    /// Create an invocation whose result is delivered to `completion`.
    pub fn with_completion<F>(invoke: F, completion: CompletionHandle) -> Self
    where
        F: FnOnce() -> Variant + Send + 'static,
    {
        Self {
            invoke: Box::new(invoke),
            completion: Some(completion),
        }
    }

    /// Whether a caller is waiting for the result.
    pub fn is_blocking(&self) -> bool {
        self.completion.is_some()
    }

    /// Execute the invocation and hand the result to the waiting caller.
    pub fn execute(self) {
        let result = (self.invoke)();
        if let Some(completion) = self.completion {
            completion.signal_done(result);
        }
    }
}

impl std::fmt::Debug for QueuedInvocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueuedInvocation")
            .field("blocking", &self.is_blocking())
            .finish_non_exhaustive()
    }
}

struct CompletionState {
    result: Mutex<Option<Variant>>,
    condvar: Condvar,
}

/// The sending half of a blocking invocation.
///
/// Dropping the handle without signalling (for example because the event loop
/// shut down with the invocation still queued) releases the waiter with
/// [`Variant::Invalid`].
pub struct CompletionHandle {
    inner: Arc<CompletionState>,
}

impl CompletionHandle {
    fn signal_done(self, value: Variant) {
        self.complete(value);
    }

    fn complete(&self, value: Variant) {
        let mut result = self.inner.result.lock();
        if result.is_none() {
            *result = Some(value);
            self.inner.condvar.notify_all();
        }
    }
}

impl Drop for CompletionHandle {
    fn drop(&mut self) {
        self.complete(Variant::Invalid);
    }
}

/// The receiving half of a blocking invocation.
pub struct CompletionWaiter {
    inner: Arc<CompletionState>,
}

impl CompletionWaiter {
    /// Block until the invocation has run and return its result.
    ///
    /// Waiting on the thread that is supposed to execute the invocation
    /// deadlocks.
    pub fn wait(self) -> Variant {
        let mut result = self.inner.result.lock();
        loop {
            if let Some(value) = result.take() {
                return value;
            }
            self.inner.condvar.wait(&mut result);
        }
    }

    /// Block for at most `timeout`. Returns `None` if the timeout elapsed.
    pub fn wait_timeout(self, timeout: Duration) -> Option<Variant> {
        let mut result = self.inner.result.lock();
        if result.is_none() {
            let _ = self.inner.condvar.wait_for(&mut result, timeout);
        }
        result.take()
    }
}

/// Create a completion handle/waiter pair for a blocking invocation.
pub fn completion_pair() -> (CompletionHandle, CompletionWaiter) {
    let state = Arc::new(CompletionState {
        result: Mutex::new(None),
        condvar: Condvar::new(),
    });

    (
        CompletionHandle {
            inner: state.clone(),
        },
        CompletionWaiter { inner: state },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_execute_fire_and_forget() {
        let executed = Arc::new(AtomicBool::new(false));

        let executed_clone = executed.clone();
        let invocation = QueuedInvocation::new(move || {
            executed_clone.store(true, Ordering::SeqCst);
            Variant::Invalid
        });
        assert!(!invocation.is_blocking());

        invocation.execute();
        assert!(executed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_completion_carries_result() {
        let (handle, waiter) = completion_pair();
        let invocation = QueuedInvocation::with_completion(|| Variant::Int(42), handle);
        assert!(invocation.is_blocking());

        let thread = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            invocation.execute();
        });

        assert_eq!(waiter.wait(), Variant::Int(42));
        thread.join().unwrap();
    }

    #[test]
    fn test_dropped_invocation_releases_waiter() {
        let (handle, waiter) = completion_pair();
        let invocation = QueuedInvocation::with_completion(|| Variant::Int(1), handle);

        let thread = std::thread::spawn(move || drop(invocation));

        assert_eq!(waiter.wait(), Variant::Invalid);
        thread.join().unwrap();
    }

    #[test]
    fn test_completion_timeout() {
        let (_handle, waiter) = completion_pair();

        let completed = waiter.wait_timeout(Duration::from_millis(10));
        assert!(completed.is_none());
    }
}
