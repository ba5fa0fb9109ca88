//! Handler trait for classified watch events.

use super::error::HandlerError;
use super::event::Event;

/// Receives classified events for a registered path.
///
/// Handlers run synchronously on the watcher's single event loop, so a slow
/// handler delays delivery for every other watched path. Events for one path
/// arrive in the order the backend reported them.
pub trait EventHandler: Send + Sync {
    /// Handle one event. Errors are reported by the event loop and do not
    /// affect the watcher's own state.
    fn handle(&self, event: &Event) -> Result<(), HandlerError>;
}

impl<F> EventHandler for F
where
    F: Fn(&Event) -> Result<(), HandlerError> + Send + Sync,
{
    fn handle(&self, event: &Event) -> Result<(), HandlerError> {
        self(event)
    }
}
