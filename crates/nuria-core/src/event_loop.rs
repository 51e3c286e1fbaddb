//! Dedicated threads that execute queued invocations.
//!
//! An [`EventLoop`] owns one thread and a bounded queue of
//! [`QueuedInvocation`]s. Slot callbacks are bound to the loop through its
//! [`ContextHandle`]: a slot invoked from any other thread is posted to the
//! queue and runs on the loop thread, either fire-and-forget or with the
//! caller blocking for the result.
//!
//! # Example
//!
//! ```no_run
//! use nuria_core::event_loop::EventLoopBuilder;
//! use nuria_core::variant::Variant;
//!
//! let event_loop = EventLoopBuilder::new().name("io-context").build();
//! let context = event_loop.handle();
//!
//! let result = context.post_blocking(|| Variant::Int(6 * 7));
//! assert_eq!(result, Ok(Variant::Int(42)));
//!
//! event_loop.stop_and_join();
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded};
use parking_lot::Mutex;

use crate::error::EventLoopError;
use crate::invocation::{QueuedInvocation, completion_pair};
use crate::logging::targets;
use crate::variant::Variant;

/// Default capacity of the invocation queue.
const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// How often an idle loop re-checks whether it was stopped.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Configuration for an [`EventLoop`].
#[derive(Debug, Clone)]
pub struct EventLoopConfig {
    /// Name of the loop thread.
    pub name: String,
    /// Stack size of the loop thread in bytes. `None` uses the default.
    pub stack_size: Option<usize>,
    /// Capacity of the invocation queue.
    pub queue_capacity: usize,
}

impl Default for EventLoopConfig {
    fn default() -> Self {
        Self {
            name: "nuria-event-loop".to_string(),
            stack_size: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl EventLoopConfig {
    /// Create a configuration with the given thread name.
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Builder for [`EventLoop`]s.
#[derive(Debug, Default)]
pub struct EventLoopBuilder {
    config: EventLoopConfig,
}

impl EventLoopBuilder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the thread name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Set the stack size of the loop thread.
    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    /// Set the queue capacity.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    /// Build and start the loop.
    pub fn build(self) -> EventLoop {
        EventLoop::with_config(self.config)
    }
}

enum LoopMessage {
    Invoke(QueuedInvocation),
    Shutdown,
}

/// State shared between the loop thread and every [`ContextHandle`].
struct LoopShared {
    name: String,
    sender: Sender<LoopMessage>,
    thread_id: OnceLock<ThreadId>,
    /// Guards admission to the queue. Once this is `false` nothing new is
    /// enqueued, so the loop's final drain sees every accepted invocation.
    running: Mutex<bool>,
    pending: AtomicUsize,
    /// Blocking sends admitted but not yet in the queue.
    admitting: AtomicUsize,
}

/// A cloneable reference to an event loop, used as the execution context of
/// slot callbacks.
#[derive(Clone)]
pub struct ContextHandle {
    shared: Arc<LoopShared>,
}

static_assertions::assert_impl_all!(ContextHandle: Send, Sync);

impl ContextHandle {
    /// The name of the loop thread.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// The id of the loop thread.
    pub fn thread_id(&self) -> Option<ThreadId> {
        self.shared.thread_id.get().copied()
    }

    /// Whether the calling thread is the loop thread.
    pub fn is_current(&self) -> bool {
        self.thread_id() == Some(thread::current().id())
    }

    /// Whether the loop still accepts invocations.
    pub fn is_running(&self) -> bool {
        *self.shared.running.lock()
    }

    /// Number of invocations queued but not yet executed.
    pub fn pending_count(&self) -> usize {
        self.shared.pending.load(Ordering::Acquire)
    }

    /// Queue an invocation for execution on the loop thread.
    ///
    /// Fails with [`EventLoopError::QueueFull`] instead of waiting for room.
    pub fn post(&self, invocation: QueuedInvocation) -> Result<(), EventLoopError> {
        let running = self.shared.running.lock();
        if !*running {
            return Err(EventLoopError::Stopped);
        }

        self.shared.pending.fetch_add(1, Ordering::AcqRel);
        match self.shared.sender.try_send(LoopMessage::Invoke(invocation)) {
            Ok(()) => Ok(()),
            Err(err) => {
                self.shared.pending.fetch_sub(1, Ordering::AcqRel);
                match err {
                    TrySendError::Full(_) => Err(EventLoopError::QueueFull),
                    TrySendError::Disconnected(_) => Err(EventLoopError::Stopped),
                }
            }
        }
    }

    /// Run `task` on the loop thread and wait for its result.
    ///
    /// Waits for room when the queue is full. Called from the loop thread
    /// itself, the task runs immediately.
    pub fn post_blocking<F>(&self, task: F) -> Result<Variant, EventLoopError>
    where
        F: FnOnce() -> Variant + Send + 'static,
    {
        if self.is_current() {
            return Ok(task());
        }

        let (handle, waiter) = completion_pair();
        self.send_waiting(QueuedInvocation::with_completion(task, handle))?;
        Ok(waiter.wait())
    }

    /// Enqueue `invocation`, blocking while the queue is full.
    ///
    /// The admission lock is not held while sending. Sends admitted before a
    /// stop are counted in `admitting` and still reach the final drain.
    fn send_waiting(&self, invocation: QueuedInvocation) -> Result<(), EventLoopError> {
        {
            let running = self.shared.running.lock();
            if !*running {
                return Err(EventLoopError::Stopped);
            }
            self.shared.pending.fetch_add(1, Ordering::AcqRel);
            self.shared.admitting.fetch_add(1, Ordering::AcqRel);
        }

        let sent = self.shared.sender.send(LoopMessage::Invoke(invocation));
        self.shared.admitting.fetch_sub(1, Ordering::AcqRel);
        sent.map_err(|_| {
            self.shared.pending.fetch_sub(1, Ordering::AcqRel);
            EventLoopError::Stopped
        })
    }
}

impl PartialEq for ContextHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl Eq for ContextHandle {}

impl std::fmt::Debug for ContextHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextHandle")
            .field("name", &self.shared.name)
            .field("thread_id", &self.thread_id())
            .field("running", &self.is_running())
            .finish()
    }
}

/// A dedicated thread executing queued invocations in order.
///
/// Dropping the loop requests shutdown without waiting for it.
pub struct EventLoop {
    context: ContextHandle,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl EventLoop {
    /// Start a loop with the default configuration.
    pub fn new() -> Self {
        Self::with_config(EventLoopConfig::default())
    }

    /// Start a loop with a custom configuration.
    pub fn with_config(config: EventLoopConfig) -> Self {
        let (sender, receiver) = bounded(config.queue_capacity);
        let shared = Arc::new(LoopShared {
            name: config.name.clone(),
            sender,
            thread_id: OnceLock::new(),
            running: Mutex::new(true),
            pending: AtomicUsize::new(0),
            admitting: AtomicUsize::new(0),
        });

        let mut builder = thread::Builder::new().name(config.name);
        if let Some(stack_size) = config.stack_size {
            builder = builder.stack_size(stack_size);
        }

        let thread_shared = shared.clone();
        let thread = builder
            .spawn(move || run_loop(receiver, thread_shared))
            .expect("Failed to spawn event loop thread");
        let _ = shared.thread_id.set(thread.thread().id());

        tracing::debug!(target: targets::EVENT_LOOP, name = %shared.name, "event loop started");

        Self {
            context: ContextHandle { shared },
            thread: Mutex::new(Some(thread)),
        }
    }

    /// A handle to this loop.
    pub fn handle(&self) -> ContextHandle {
        self.context.clone()
    }

    /// Whether the loop still accepts invocations.
    pub fn is_running(&self) -> bool {
        self.context.is_running()
    }

    /// Number of invocations queued but not yet executed.
    pub fn pending_count(&self) -> usize {
        self.context.pending_count()
    }

    /// Stop accepting invocations. Already queued invocations still run.
    pub fn stop(&self) {
        let mut running = self.context.shared.running.lock();
        if *running {
            *running = false;
            let _ = self.context.shared.sender.try_send(LoopMessage::Shutdown);
            tracing::debug!(target: targets::EVENT_LOOP, name = %self.context.shared.name, "event loop stopping");
        }
    }

    /// Wait for the loop thread to exit.
    ///
    /// Returns `false` if the thread was already joined or panicked.
    pub fn join(&self) -> bool {
        let thread = self.thread.lock().take();
        match thread {
            Some(thread) => thread.join().is_ok(),
            None => false,
        }
    }

    /// Stop the loop and wait for it to exit.
    pub fn stop_and_join(&self) -> bool {
        self.stop();
        self.join()
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for EventLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_loop(receiver: Receiver<LoopMessage>, shared: Arc<LoopShared>) {
    loop {
        match receiver.recv_timeout(POLL_INTERVAL) {
            Ok(LoopMessage::Invoke(invocation)) => execute(invocation, &shared),
            Ok(LoopMessage::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                if !*shared.running.lock() {
                    break;
                }
            }
        }
    }

    *shared.running.lock() = false;
    loop {
        match receiver.try_recv() {
            Ok(LoopMessage::Invoke(invocation)) => execute(invocation, &shared),
            Ok(LoopMessage::Shutdown) => {}
            Err(_) if shared.admitting.load(Ordering::Acquire) == 0 => break,
            Err(_) => thread::yield_now(),
        }
    }
    while let Ok(message) = receiver.try_recv() {
        if let LoopMessage::Invoke(invocation) = message {
            execute(invocation, &shared);
        }
    }

    tracing::debug!(target: targets::EVENT_LOOP, name = %shared.name, "event loop exited");
}

fn execute(invocation: QueuedInvocation, shared: &LoopShared) {
    let _span = tracing::trace_span!(target: targets::EVENT_LOOP, "invoke", blocking = invocation.is_blocking()).entered();
    invocation.execute();
    shared.pending.fetch_sub(1, Ordering::AcqRel);
}
