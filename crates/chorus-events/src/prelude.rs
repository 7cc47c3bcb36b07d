//! Prelude module - commonly used types for convenient import.
//!
//! Use `use chorus_events::prelude::*;` to import all essential types.
//!
//! # Example
//!
//! ```rust
//! use chorus_events::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let emitter: EventEmitter<String> = EventEmitter::current();
//!
//! let id = emitter.on("line", Handler::immediate(|line: &String| {
//!     println!("{line}");
//! }));
//!
//! emitter.emit("line", "hello".to_string());
//! emitter.off("line", id).unwrap();
//! # }
//! ```

// Emitter
pub use crate::{DEFAULT_MAX_LISTENERS, EventEmitter};

// Handlers
pub use crate::{DeferredFn, Handler, ImmediateFn, ListenerId};

// Errors
pub use crate::EmitterError;
