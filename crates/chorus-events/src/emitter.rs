//! The event emitter: a named-event registry plus in-flight task tracking.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace, warn};
use uuid::Uuid;

use crate::error::EmitterError;
use crate::handler::{Handler, ListenerId};

/// Default per-event listener count above which registration warns.
pub const DEFAULT_MAX_LISTENERS: usize = 10;

/// Id for entries in the in-flight task set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct TaskId(Uuid);

impl TaskId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// A listener as stored in the registry.
struct Registration<T> {
    id: ListenerId,
    handler: Handler<T>,
}

struct Inner<T> {
    /// Event name -> ordered listener list. A present key always maps to
    /// a non-empty list.
    registry: Mutex<HashMap<String, Vec<Registration<T>>>>,
    /// Handles of deferred callbacks that have been scheduled but have
    /// not yet completed. Each task removes its own entry as its final
    /// step, success and panic alike.
    in_flight: Mutex<HashMap<TaskId, JoinHandle<()>>>,
    /// Runtime handle deferred callbacks are spawned on.
    handle: Handle,
    /// Per-event listener count above which registration warns.
    /// 0 disables the warning.
    max_listeners: AtomicUsize,
}

impl<T> Inner<T> {
    /// Best-effort removal used by `once` wrappers.
    ///
    /// Absence is not an error here: an explicit `off` may have raced
    /// ahead of the wrapper's first firing.
    fn deregister(weak: &Weak<Inner<T>>, event: &str, id: ListenerId) {
        let Some(inner) = weak.upgrade() else { return };
        let mut registry = inner.registry.lock().expect("lock poisoned");
        if let Some(listeners) = registry.get_mut(event) {
            if let Some(pos) = listeners.iter().position(|r| r.id == id) {
                listeners.remove(pos);
                if listeners.is_empty() {
                    registry.remove(event);
                }
            }
        }
    }
}

/// In-process event emitter.
///
/// Maps string event names to ordered lists of [`Handler`]s and invokes
/// them on [`emit`](Self::emit): immediate handlers inline, deferred
/// handlers as independent tasks on the runtime handle supplied at
/// construction. Scheduled tasks are tracked in an in-flight set until
/// they complete.
///
/// All methods take `&self`; internal state sits behind mutexes that are
/// never held while listener code runs, so listeners may freely call
/// [`on`](Self::on), [`off`](Self::off), [`once`](Self::once) or
/// [`emit`](Self::emit) re-entrantly. `emit` iterates a snapshot of the
/// listener list, so such calls only affect later emissions.
///
/// Cloning an emitter is cheap and shares the registry and the in-flight
/// set with the original.
pub struct EventEmitter<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for EventEmitter<T> {
    fn clone(&self) -> Self {
        // Clones share the registry and in-flight set.
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for EventEmitter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let events = self
            .inner
            .registry
            .lock()
            .map(|r| r.len())
            .unwrap_or_default();
        let in_flight = self
            .inner
            .in_flight
            .lock()
            .map(|t| t.len())
            .unwrap_or_default();
        f.debug_struct("EventEmitter")
            .field("events", &events)
            .field("in_flight", &in_flight)
            .finish_non_exhaustive()
    }
}

impl<T> EventEmitter<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create an emitter that schedules deferred callbacks on `handle`.
    #[must_use]
    pub fn new(handle: Handle) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry: Mutex::new(HashMap::new()),
                in_flight: Mutex::new(HashMap::new()),
                handle,
                max_listeners: AtomicUsize::new(DEFAULT_MAX_LISTENERS),
            }),
        }
    }

    /// Create an emitter bound to the ambient Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime context.
    #[must_use]
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    /// Register `handler` to run each time `event` is emitted.
    ///
    /// The handler is appended to the event's list (created on first
    /// registration); listeners run in registration order. There is no
    /// deduplication: registering the same closure again yields a second,
    /// independently firing entry. Returns the id used for removal.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn on(&self, event: impl Into<String>, handler: Handler<T>) -> ListenerId {
        let id = ListenerId::new();
        self.insert(event.into(), Registration { id, handler });
        id
    }

    /// Register `handler` to run only the first time `event` is emitted.
    ///
    /// Internally registers a wrapper via [`on`](Self::on) that
    /// deregisters itself before delegating to `handler`, so a listener
    /// list snapshotted by an in-progress `emit` still runs it, while
    /// later emissions do not. The wrapper carries an atomic guard:
    /// even when the same event is emitted concurrently from several
    /// threads, `handler` runs at most once.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn once(&self, event: impl Into<String>, handler: Handler<T>) -> ListenerId {
        let event = event.into();
        let id = ListenerId::new();
        let wrapped = self.once_wrapper(event.clone(), id, handler);
        self.insert(event, Registration {
            id,
            handler: wrapped,
        });
        id
    }

    /// Remove the first occurrence of `id` from `event`'s listener list.
    ///
    /// If the removal empties the list, the event key is deleted from
    /// the registry.
    ///
    /// # Errors
    ///
    /// [`EmitterError::UnknownEvent`] if `event` has no listeners,
    /// [`EmitterError::UnknownListener`] if `id` is not in its list.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn off(&self, event: &str, id: ListenerId) -> Result<(), EmitterError> {
        let mut registry = self.inner.registry.lock().expect("lock poisoned");
        let listeners = registry
            .get_mut(event)
            .ok_or_else(|| EmitterError::UnknownEvent {
                event: event.to_string(),
            })?;
        let pos = listeners.iter().position(|r| r.id == id).ok_or_else(|| {
            EmitterError::UnknownListener {
                event: event.to_string(),
                id,
            }
        })?;
        listeners.remove(pos);
        if listeners.is_empty() {
            registry.remove(event);
        }
        drop(registry);

        debug!(event = %event, listener = %id, "listener removed");
        Ok(())
    }

    /// Invoke every listener currently registered for `event`.
    ///
    /// An event with no listeners is a silent no-op. Otherwise a snapshot
    /// of the listener list is taken and iterated in registration order
    /// with the lock released, so listeners that mutate the registry
    /// affect only future emissions:
    ///
    /// - Immediate handlers run inline. A panic is caught, logged, and
    ///   never stops the remaining listeners in the pass.
    /// - Deferred handlers are spawned onto the emitter's runtime handle
    ///   and tracked in the in-flight set; `emit` returns without
    ///   awaiting them. Panics inside the task are caught and logged by
    ///   the task itself.
    ///
    /// `emit` never fails on behalf of a listener.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn emit(&self, event: &str, payload: T) {
        let snapshot: Vec<(ListenerId, Handler<T>)> = {
            let registry = self.inner.registry.lock().expect("lock poisoned");
            let Some(listeners) = registry.get(event) else {
                trace!(event = %event, "no listeners for event");
                return;
            };
            listeners
                .iter()
                .map(|r| (r.id, r.handler.clone()))
                .collect()
        };

        trace!(event = %event, listeners = snapshot.len(), "emitting event");

        for (id, handler) in snapshot {
            match handler {
                Handler::Immediate(f) => {
                    if let Err(panic) = catch_unwind(AssertUnwindSafe(|| f(&payload))) {
                        error!(
                            event = %event,
                            listener = %id,
                            panic = %panic_message(panic.as_ref()),
                            "listener panicked"
                        );
                    }
                },
                Handler::Deferred(f) => {
                    // The factory itself can panic before yielding a future.
                    match catch_unwind(AssertUnwindSafe(|| f(payload.clone()))) {
                        Ok(future) => self.spawn_in_flight(event, id, future),
                        Err(panic) => {
                            error!(
                                event = %event,
                                listener = %id,
                                panic = %panic_message(panic.as_ref()),
                                "listener panicked"
                            );
                        },
                    }
                },
            }
        }
    }

    /// Number of listeners registered for `event`.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn listener_count(&self, event: &str) -> usize {
        self.inner
            .registry
            .lock()
            .expect("lock poisoned")
            .get(event)
            .map_or(0, Vec::len)
    }

    /// Names of all events that currently have listeners.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn event_names(&self) -> Vec<String> {
        self.inner
            .registry
            .lock()
            .expect("lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// Whether no listeners are registered for any event.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.registry.lock().expect("lock poisoned").is_empty()
    }

    /// Remove all listeners for all events.
    ///
    /// Already scheduled deferred callbacks are unaffected and run to
    /// completion.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn clear(&self) {
        self.inner.registry.lock().expect("lock poisoned").clear();
        debug!("all listeners cleared");
    }

    /// Number of scheduled deferred callbacks that have not completed.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.lock().expect("lock poisoned").len()
    }

    /// Wait for every scheduled deferred callback to finish.
    ///
    /// Tasks scheduled while draining are awaited as well. No
    /// cancellation is performed; this only waits.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub async fn drain(&self) {
        loop {
            let next = {
                let mut in_flight = self.inner.in_flight.lock().expect("lock poisoned");
                let id = in_flight.keys().next().copied();
                id.and_then(|id| in_flight.remove(&id))
            };
            match next {
                Some(handle) => {
                    // Task panics are caught inside the task; a join
                    // error here can only be an external abort.
                    if let Err(err) = handle.await {
                        warn!(error = %err, "in-flight task failed to join");
                    }
                },
                None => break,
            }
        }
    }

    /// Set the per-event listener count above which registration warns.
    ///
    /// 0 disables the warning.
    pub fn set_max_listeners(&self, n: usize) {
        self.inner.max_listeners.store(n, Ordering::Relaxed);
    }

    /// Current leak-warning threshold.
    #[must_use]
    pub fn max_listeners(&self) -> usize {
        self.inner.max_listeners.load(Ordering::Relaxed)
    }

    fn insert(&self, event: String, registration: Registration<T>) {
        let id = registration.id;
        let max = self.inner.max_listeners.load(Ordering::Relaxed);

        let mut registry = self.inner.registry.lock().expect("lock poisoned");
        let listeners = registry.entry(event.clone()).or_default();
        listeners.push(registration);
        if max > 0 && listeners.len() > max {
            warn!(
                event = %event,
                listeners = listeners.len(),
                "possible listener leak; raise the threshold with set_max_listeners if intentional"
            );
        }
        drop(registry);

        debug!(event = %event, listener = %id, "listener registered");
    }

    /// Build the self-deregistering wrapper backing [`once`](Self::once).
    ///
    /// The wrapper holds a `Weak` back-reference (an `Arc` stored inside
    /// the registry would keep the emitter alive through its own map)
    /// and an atomic fired-guard that keeps the inner handler at most
    /// once under concurrent emission.
    fn once_wrapper(&self, event: String, id: ListenerId, handler: Handler<T>) -> Handler<T> {
        let weak = Arc::downgrade(&self.inner);
        let fired = Arc::new(AtomicBool::new(false));
        match handler {
            Handler::Immediate(f) => Handler::Immediate(Arc::new(move |payload: &T| {
                if fired.swap(true, Ordering::SeqCst) {
                    return;
                }
                Inner::deregister(&weak, &event, id);
                f(payload);
            })),
            Handler::Deferred(f) => Handler::Deferred(Arc::new(move |payload: T| {
                if fired.swap(true, Ordering::SeqCst) {
                    return futures::future::ready(()).boxed();
                }
                Inner::deregister(&weak, &event, id);
                f(payload)
            })),
        }
    }

    /// Spawn a deferred callback's future and track it until completion.
    fn spawn_in_flight(&self, event: &str, listener: ListenerId, future: BoxFuture<'static, ()>) {
        trace!(event = %event, listener = %listener, "scheduling listener task");

        let task_id = TaskId::new();
        let event = event.to_string();
        let weak = Arc::downgrade(&self.inner);
        let task = async move {
            if let Err(panic) = AssertUnwindSafe(future).catch_unwind().await {
                error!(
                    event = %event,
                    listener = %listener,
                    panic = %panic_message(panic.as_ref()),
                    "listener task panicked"
                );
            }
            // Completion unlinks the handle; the map entry lives exactly
            // as long as the task.
            if let Some(inner) = weak.upgrade() {
                inner
                    .in_flight
                    .lock()
                    .expect("lock poisoned")
                    .remove(&task_id);
            }
        };

        // Holding the lock across the spawn orders the insert before the
        // task's own removal.
        let mut in_flight = self.inner.in_flight.lock().expect("lock poisoned");
        let handle = self.inner.handle.spawn(task);
        in_flight.insert(task_id, handle);
    }
}

/// Render a panic payload for the error log.
///
/// Panics carry `&str` or `String` payloads in practice; anything else
/// is reported opaquely.
fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "opaque panic payload"
    }
}
