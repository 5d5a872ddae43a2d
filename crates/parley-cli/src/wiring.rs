//! Routes chat events from the transport into a message window.

use std::sync::Arc;

use parley_cache::MessageWindow;
use parley_core::{Envelope, EventAction, Message, MessageId, MessagePatch};
use parley_transport::{HandlerId, Transport};
use serde::Deserialize;
use tracing::warn;

/// `data` of a `chat.message.deleted` event, and the part of any message
/// payload needed to match it by ID.
#[derive(Debug, Deserialize)]
pub(crate) struct MessageRef {
    pub(crate) id: MessageId,
}

/// `data` of a `chat.message.updated` event.
#[derive(Debug, Deserialize)]
struct MessageUpdate {
    id: MessageId,
    #[serde(flatten)]
    patch: MessagePatch,
}

/// What one event did to the window.
#[derive(Debug, PartialEq)]
pub(crate) enum Applied {
    Added(Message),
    Duplicate(MessageId),
    Updated(MessageId),
    Removed(Message),
    /// Update or delete for a message outside the window.
    Missing(MessageId),
    Ignored,
}

pub(crate) type AppliedSink = Arc<dyn Fn(&Applied) + Send + Sync>;

/// Actions routed into the window.
const WINDOW_ACTIONS: [EventAction; 3] = [
    EventAction::MessageSent,
    EventAction::MessageUpdated,
    EventAction::MessageDeleted,
];

pub(crate) fn apply_event(
    window: &MessageWindow,
    envelope: &Envelope,
) -> Result<Applied, serde_json::Error> {
    let applied = match envelope.event_action() {
        Some(EventAction::MessageSent) => {
            let message: Message = envelope.data_as()?;
            let id = message.id.clone();
            if window.add_message(message.clone()) {
                Applied::Added(message)
            } else {
                Applied::Duplicate(id)
            }
        }
        Some(EventAction::MessageUpdated) => {
            let update: MessageUpdate = envelope.data_as()?;
            if window.update_message(&update.id, update.patch) {
                Applied::Updated(update.id)
            } else {
                Applied::Missing(update.id)
            }
        }
        Some(EventAction::MessageDeleted) => {
            let target: MessageRef = envelope.data_as()?;
            match window.remove_message(&target.id) {
                Some(message) => Applied::Removed(message),
                None => Applied::Missing(target.id),
            }
        }
        _ => Applied::Ignored,
    };
    Ok(applied)
}

/// Register handlers that keep `window` in step with the conversation.
pub(crate) fn bind_window(
    transport: &Transport,
    window: &Arc<MessageWindow>,
    sink: &AppliedSink,
) -> Vec<HandlerId> {
    WINDOW_ACTIONS
        .iter()
        .map(|action| {
            let window = window.clone();
            let sink = sink.clone();
            transport.on_message(action.as_str(), move |envelope: &Envelope| {
                match apply_event(&window, envelope) {
                    Ok(applied) => sink(&applied),
                    Err(e) => warn!(
                        action = envelope.action.as_deref().unwrap_or_default(),
                        error = %e,
                        "undecodable event payload"
                    ),
                }
            })
        })
        .collect()
}

/// One printable line for a message.
pub(crate) fn format_message(message: &Message) -> String {
    format!(
        "[{}] {}: {}",
        message.timestamp.format("%H:%M:%S"),
        message.sender.name,
        message.content
    )
}
