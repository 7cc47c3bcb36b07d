//! Error types for emitter operations.

use thiserror::Error;

use crate::handler::ListenerId;

/// Errors returned by [`EventEmitter::off`](crate::EventEmitter::off).
///
/// Deregistration lookups are the only fallible operations: registration
/// cannot fail, and callback failures during `emit` are logged rather
/// than surfaced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmitterError {
    /// No listeners are registered under the event name.
    #[error("no such event: {event}")]
    UnknownEvent {
        /// The event name that had no registry entry.
        event: String,
    },

    /// The listener id is not present in the event's list.
    #[error("listener {id} is not registered for event: {event}")]
    UnknownListener {
        /// The event whose listener list was searched.
        event: String,
        /// The id that was not found.
        id: ListenerId,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_event_display() {
        let err = EmitterError::UnknownEvent {
            event: "ready".to_string(),
        };
        assert_eq!(err.to_string(), "no such event: ready");
    }

    #[test]
    fn test_unknown_listener_display() {
        let id = ListenerId::new();
        let err = EmitterError::UnknownListener {
            event: "ready".to_string(),
            id,
        };
        let rendered = err.to_string();
        assert!(rendered.contains("ready"));
        assert!(rendered.contains(&id.to_string()));
    }
}
