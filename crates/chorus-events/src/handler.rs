//! Callback handles and the immediate/deferred dispatch tag.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use uuid::Uuid;

/// Closure type for immediate (synchronous) callbacks.
pub type ImmediateFn<T> = dyn Fn(&T) + Send + Sync;

/// Closure type for deferred (asynchronous) callbacks.
///
/// Called with an owned payload and returns the future that will be
/// scheduled on the emitter's runtime handle.
pub type DeferredFn<T> = dyn Fn(T) -> BoxFuture<'static, ()> + Send + Sync;

/// Registration handle returned by [`EventEmitter::on`] and
/// [`EventEmitter::once`], accepted by [`EventEmitter::off`].
///
/// Closures have no identity in Rust, so this id stands in for the
/// callback itself during removal. Registering the same closure twice
/// yields two distinct ids that fire independently.
///
/// [`EventEmitter::on`]: crate::EventEmitter::on
/// [`EventEmitter::once`]: crate::EventEmitter::once
/// [`EventEmitter::off`]: crate::EventEmitter::off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(Uuid);

impl ListenerId {
    /// Create a new listener ID.
    #[must_use]
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A registered unit of behavior.
///
/// The variant is chosen at registration time and
/// [`EventEmitter::emit`](crate::EventEmitter::emit) branches on it:
/// `Immediate` handlers run inline on the emitting thread before `emit`
/// returns, `Deferred` handlers produce a future that is scheduled as an
/// independent task and may finish at any later point.
///
/// Handlers are `Arc`-backed, so cloning one (as `emit` does when it
/// snapshots a listener list) is a reference-count bump.
pub enum Handler<T> {
    /// Runs to completion inline during `emit`.
    Immediate(Arc<ImmediateFn<T>>),
    /// Produces a future scheduled as an independent task on the
    /// emitter's runtime handle.
    Deferred(Arc<DeferredFn<T>>),
}

impl<T> Handler<T> {
    /// Wrap a synchronous closure as an immediate handler.
    ///
    /// The closure is called with a shared reference to each emitted
    /// payload.
    pub fn immediate<F>(f: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        Self::Immediate(Arc::new(f))
    }

    /// Wrap an asynchronous closure as a deferred handler.
    ///
    /// The closure receives an owned clone of each emitted payload and
    /// returns the future to run; the emitter boxes it for storage.
    pub fn deferred<F, Fut>(f: F) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::Deferred(Arc::new(move |payload| f(payload).boxed()))
    }

    /// Whether this handler runs inline during `emit`.
    #[must_use]
    pub fn is_immediate(&self) -> bool {
        matches!(self, Self::Immediate(_))
    }

    /// Whether this handler is scheduled as a background task.
    #[must_use]
    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred(_))
    }
}

impl<T> Clone for Handler<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Immediate(f) => Self::Immediate(Arc::clone(f)),
            Self::Deferred(f) => Self::Deferred(Arc::clone(f)),
        }
    }
}

impl<T> fmt::Debug for Handler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Immediate(_) => f.write_str("Handler::Immediate"),
            Self::Deferred(_) => f.write_str("Handler::Deferred"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_constructor_tags() {
        let immediate: Handler<u32> = Handler::immediate(|_| {});
        assert!(immediate.is_immediate());
        assert!(!immediate.is_deferred());

        let deferred: Handler<u32> = Handler::deferred(|_| async {});
        assert!(deferred.is_deferred());
        assert!(!deferred.is_immediate());
    }

    #[test]
    fn test_clone_shares_closure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let handler: Handler<u32> = Handler::immediate(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let cloned = handler.clone();
        for h in [&handler, &cloned] {
            if let Handler::Immediate(f) = h {
                f(&0);
            }
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_deferred_passes_payload() {
        let seen = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&seen);
        let handler = Handler::deferred(move |value: usize| {
            let sink = Arc::clone(&sink);
            async move {
                sink.store(value, Ordering::SeqCst);
            }
        });

        if let Handler::Deferred(f) = &handler {
            futures::executor::block_on(f(7));
        }
        assert_eq!(seen.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn test_listener_ids_are_unique() {
        assert_ne!(ListenerId::new(), ListenerId::new());
    }

    #[test]
    fn test_debug_names_the_variant() {
        let immediate: Handler<u32> = Handler::immediate(|_| {});
        assert_eq!(format!("{immediate:?}"), "Handler::Immediate");

        let deferred: Handler<u32> = Handler::deferred(|_| async {});
        assert_eq!(format!("{deferred:?}"), "Handler::Deferred");
    }
}
