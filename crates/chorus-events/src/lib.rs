//! Chorus Events - in-process event emitter for the Chorus runtime.
//!
//! This crate provides:
//! - A registry mapping named events to ordered listener lists
//! - Immediate (synchronous) and deferred (asynchronous) callbacks
//! - In-flight tracking of scheduled callback tasks
//!
//! # Architecture
//!
//! Callbacks are registered against string event names and invoked in
//! registration order by [`EventEmitter::emit`]. A [`Handler`] is either
//! *immediate* — run inline before `emit` returns — or *deferred* —
//! scheduled as an independent task on the runtime handle the emitter
//! was constructed with. `emit` iterates a snapshot of the listener
//! list, so listeners may register or remove listeners (including
//! themselves) without affecting the current pass.
//!
//! Listener failures never reach the `emit` caller: panics are caught at
//! the emitter boundary, logged, and suppressed, and the remaining
//! listeners in the pass still run.
//!
//! # Example
//!
//! ```rust
//! use chorus_events::{EventEmitter, Handler};
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let emitter: EventEmitter<u64> = EventEmitter::current();
//!
//! let seen = Arc::new(AtomicUsize::new(0));
//! let counter = Arc::clone(&seen);
//! emitter.on("ready", Handler::immediate(move |_value: &u64| {
//!     counter.fetch_add(1, Ordering::SeqCst);
//! }));
//!
//! emitter.emit("ready", 42);
//! assert_eq!(seen.load(Ordering::SeqCst), 1);
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod emitter;
mod error;
mod handler;

pub use emitter::{DEFAULT_MAX_LISTENERS, EventEmitter};
pub use error::EmitterError;
pub use handler::{DeferredFn, Handler, ImmediateFn, ListenerId};
