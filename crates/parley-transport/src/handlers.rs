//! Handler registry.
//!
//! Maps event actions to ordered handler lists, plus the connection-state and
//! error handler lists. Dispatch snapshots the list and calls handlers outside
//! the lock, so a handler may register or remove handlers, or call back into
//! the transport. A panicking handler is logged and skipped; the remaining
//! handlers still run.

use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use parley_core::{ConnectionState, Envelope, TransportError};
use tracing::warn;

/// Handler for inbound `event` frames.
pub type MessageHandler = Arc<dyn Fn(&Envelope) + Send + Sync>;
/// Handler for connection-state transitions.
pub type StateHandler = Arc<dyn Fn(ConnectionState) + Send + Sync>;
/// Handler for transport errors.
pub type ErrorHandler = Arc<dyn Fn(&TransportError) + Send + Sync>;

/// Registration handle returned by the `on_*` methods.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handler-{}", self.0)
    }
}

/// Registered handlers, keyed by kind.
#[derive(Default)]
pub struct HandlerRegistry {
    next_id: AtomicU64,
    message: RwLock<HashMap<String, Vec<(HandlerId, MessageHandler)>>>,
    state: RwLock<Vec<(HandlerId, StateHandler)>>,
    error: RwLock<Vec<(HandlerId, ErrorHandler)>>,
}

impl HandlerRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&self) -> HandlerId {
        HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Register a handler for events with `action`.
    pub fn on_message(&self, action: &str, handler: MessageHandler) -> HandlerId {
        let id = self.allocate();
        self.message
            .write()
            .entry(action.to_owned())
            .or_default()
            .push((id, handler));
        id
    }

    /// Register a connection-state handler.
    pub fn on_connection_change(&self, handler: StateHandler) -> HandlerId {
        let id = self.allocate();
        self.state.write().push((id, handler));
        id
    }

    /// Register an error handler.
    pub fn on_error(&self, handler: ErrorHandler) -> HandlerId {
        let id = self.allocate();
        self.error.write().push((id, handler));
        id
    }

    /// Unregister a handler of any kind. Returns whether it was registered.
    pub fn remove(&self, id: HandlerId) -> bool {
        {
            let mut message = self.message.write();
            let mut found = false;
            for handlers in message.values_mut() {
                if let Some(pos) = handlers.iter().position(|(h, _)| *h == id) {
                    let _ = handlers.remove(pos);
                    found = true;
                    break;
                }
            }
            if found {
                message.retain(|_, list| !list.is_empty());
                return true;
            }
        }
        remove_from(&self.state, id) || remove_from(&self.error, id)
    }

    /// Number of handlers registered for `action`.
    pub fn message_handler_count(&self, action: &str) -> usize {
        self.message.read().get(action).map_or(0, Vec::len)
    }

    /// Invoke every handler registered for `action`, in registration order.
    /// Returns how many ran without panicking.
    pub fn dispatch_message(&self, action: &str, envelope: &Envelope) -> usize {
        let handlers = self.message.read().get(action).cloned().unwrap_or_default();
        let mut completed = 0;
        for (id, handler) in &handlers {
            if isolate(*id, action, || handler(envelope)) {
                completed += 1;
            }
        }
        completed
    }

    /// Notify every state handler.
    pub fn dispatch_state(&self, state: ConnectionState) {
        let handlers = self.state.read().clone();
        for (id, handler) in &handlers {
            let _ = isolate(*id, "connection_change", || handler(state));
        }
    }

    /// Notify every error handler.
    pub fn dispatch_error(&self, error: &TransportError) {
        let handlers = self.error.read().clone();
        for (id, handler) in &handlers {
            let _ = isolate(*id, "error", || handler(error));
        }
    }
}

fn remove_from<T>(list: &RwLock<Vec<(HandlerId, T)>>, id: HandlerId) -> bool {
    let mut list = list.write();
    let before = list.len();
    list.retain(|(h, _)| *h != id);
    list.len() != before
}

/// Run `f`, logging instead of propagating a panic. Returns whether it completed.
fn isolate(id: HandlerId, action: &str, f: impl FnOnce()) -> bool {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(()) => true,
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_owned())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_owned());
            warn!(handler = %id, action, reason = %reason, "handler panicked, continuing dispatch");
            false
        }
    }
}
