//! Wire frame types.
//!
//! Every frame on the socket is one JSON [`Envelope`]. `event` frames carry an
//! `action` naming the domain event; `command` frames are client → server;
//! `ping`/`pong` are keepalive; `error` carries a server-reported failure.

use chrono::{SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

/// Frame type discriminator (`type` on the wire).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeType {
    /// Client asks to receive a set of events.
    Subscribe,
    /// Client stops receiving a set of events.
    Unsubscribe,
    /// Client → server command.
    Command,
    /// Server → client domain event.
    Event,
    /// Keepalive probe.
    Ping,
    /// Keepalive acknowledgement.
    Pong,
    /// Server-reported failure.
    Error,
}

/// Domain event and command names carried in `action`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventAction {
    /// A chat message was posted.
    #[serde(rename = "chat.message.sent")]
    MessageSent,
    /// A chat message was edited or changed status.
    #[serde(rename = "chat.message.updated")]
    MessageUpdated,
    /// A chat message was deleted.
    #[serde(rename = "chat.message.deleted")]
    MessageDeleted,
    /// A participant started typing.
    #[serde(rename = "typing.start")]
    TypingStart,
    /// A participant stopped typing.
    #[serde(rename = "typing.stop")]
    TypingStop,
    /// A participant joined the conversation.
    #[serde(rename = "user.joined")]
    UserJoined,
    /// A participant left the conversation.
    #[serde(rename = "user.left")]
    UserLeft,
    /// Command: post a chat message.
    #[serde(rename = "chat.message.send")]
    SendMessage,
}

impl EventAction {
    /// Wire name of this action.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MessageSent => "chat.message.sent",
            Self::MessageUpdated => "chat.message.updated",
            Self::MessageDeleted => "chat.message.deleted",
            Self::TypingStart => "typing.start",
            Self::TypingStop => "typing.stop",
            Self::UserJoined => "user.joined",
            Self::UserLeft => "user.left",
            Self::SendMessage => "chat.message.send",
        }
    }

    /// Look up an action by its wire name.
    pub fn from_wire(name: &str) -> Option<Self> {
        ALL_EVENT_ACTIONS.iter().copied().find(|a| a.as_str() == name)
    }
}

impl std::fmt::Display for EventAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All action variants, for exhaustive testing.
pub const ALL_EVENT_ACTIONS: &[EventAction] = &[
    EventAction::MessageSent,
    EventAction::MessageUpdated,
    EventAction::MessageDeleted,
    EventAction::TypingStart,
    EventAction::TypingStop,
    EventAction::UserJoined,
    EventAction::UserLeft,
    EventAction::SendMessage,
];

/// Events requested by the automatic `subscribe` issued on connect.
pub const SUBSCRIBED_EVENTS: &[EventAction] = &[
    EventAction::MessageSent,
    EventAction::MessageUpdated,
    EventAction::MessageDeleted,
    EventAction::TypingStart,
    EventAction::TypingStop,
    EventAction::UserJoined,
    EventAction::UserLeft,
];

/// One wire frame.
///
/// ```json
/// { "id": "…", "type": "event", "action": "chat.message.sent",
///   "tenantId": "t1", "data": {…}, "timestamp": "2025-…" }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Frame ID (set on outbound frames).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Frame type.
    #[serde(rename = "type")]
    pub kind: EnvelopeType,
    /// Domain event or command name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// Tenant scope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    /// Project scope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// Acting user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Server-reported failure text (`error` frames).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// RFC 3339 timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl Envelope {
    /// Bare frame of the given type.
    pub fn new(kind: EnvelopeType) -> Self {
        Self {
            id: None,
            kind,
            action: None,
            tenant_id: None,
            project_id: None,
            user_id: None,
            data: None,
            error: None,
            timestamp: None,
        }
    }

    /// `subscribe` frame listing `events` under `data.events`.
    pub fn subscribe(events: &[EventAction]) -> Self {
        Self {
            data: Some(events_payload(events)),
            ..Self::new(EnvelopeType::Subscribe)
        }
    }

    /// `unsubscribe` frame listing `events` under `data.events`.
    pub fn unsubscribe(events: &[EventAction]) -> Self {
        Self {
            data: Some(events_payload(events)),
            ..Self::new(EnvelopeType::Unsubscribe)
        }
    }

    /// `command` frame.
    pub fn command(action: EventAction, data: Value) -> Self {
        Self {
            action: Some(action.as_str().to_owned()),
            data: Some(data),
            ..Self::new(EnvelopeType::Command)
        }
    }

    /// `event` frame (server side; used by tests and fixtures).
    pub fn event(action: impl Into<String>, data: Value) -> Self {
        Self {
            action: Some(action.into()),
            data: Some(data),
            ..Self::new(EnvelopeType::Event)
        }
    }

    /// Keepalive probe.
    pub fn ping() -> Self {
        Self::new(EnvelopeType::Ping)
    }

    /// Scope the frame to a tenant, project, and user.
    #[must_use]
    pub fn with_identity(
        mut self,
        tenant_id: Option<&str>,
        project_id: Option<&str>,
        user_id: Option<&str>,
    ) -> Self {
        self.tenant_id = tenant_id.map(str::to_owned);
        self.project_id = project_id.map(str::to_owned);
        self.user_id = user_id.map(str::to_owned);
        self
    }

    /// Fill in a UUID v7 `id` and the current `timestamp` if absent.
    #[must_use]
    pub fn stamped(mut self) -> Self {
        if self.id.is_none() {
            self.id = Some(Uuid::now_v7().to_string());
        }
        if self.timestamp.is_none() {
            self.timestamp = Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true));
        }
        self
    }

    /// The `action` parsed as a known [`EventAction`].
    pub fn event_action(&self) -> Option<EventAction> {
        self.action.as_deref().and_then(EventAction::from_wire)
    }

    /// Deserialize the `data` payload. A missing payload deserializes from `null`.
    pub fn data_as<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_value(self.data.clone().unwrap_or(Value::Null))
    }
}

fn events_payload(events: &[EventAction]) -> Value {
    let names: Vec<&str> = events.iter().map(|e| e.as_str()).collect();
    json!({ "events": names })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::Message;

    #[test]
    fn action_wire_names_round_trip() {
        for action in ALL_EVENT_ACTIONS {
            let json = serde_json::to_string(action).unwrap();
            assert_eq!(json, format!("\"{}\"", action.as_str()));
            assert_eq!(EventAction::from_wire(action.as_str()), Some(*action));
        }
        assert_eq!(EventAction::from_wire("nope"), None);
    }

    #[test]
    fn subscribed_events_exclude_commands() {
        assert!(!SUBSCRIBED_EVENTS.contains(&EventAction::SendMessage));
        assert!(SUBSCRIBED_EVENTS.contains(&EventAction::MessageSent));
        assert!(SUBSCRIBED_EVENTS.contains(&EventAction::UserLeft));
    }

    #[test]
    fn subscribe_frame_lists_events() {
        let env = Envelope::subscribe(&[EventAction::TypingStart, EventAction::TypingStop]);
        let value = serde_json::to_value(&env).unwrap();
        assert_eq!(value["type"], "subscribe");
        assert_eq!(value["data"]["events"], json!(["typing.start", "typing.stop"]));
        assert!(value.get("action").is_none());
    }

    #[test]
    fn identity_fields_are_camel_case() {
        let env = Envelope::ping().with_identity(Some("t1"), Some("p1"), None);
        let value = serde_json::to_value(&env).unwrap();
        assert_eq!(value["tenantId"], "t1");
        assert_eq!(value["projectId"], "p1");
        assert!(value.get("userId").is_none());
    }

    #[test]
    fn stamped_keeps_existing_values() {
        let mut env = Envelope::ping();
        env.id = Some("fixed".into());
        let env = env.stamped();
        assert_eq!(env.id.as_deref(), Some("fixed"));
        assert!(env.timestamp.is_some());
    }

    #[test]
    fn data_as_decodes_message() {
        let env = Envelope::event(
            "chat.message.sent",
            json!({
                "id": "m9",
                "type": "text",
                "content": "yo",
                "sender": {"id": "u2", "name": "Bob"},
                "timestamp": "2025-01-01T00:00:00Z"
            }),
        );
        assert_eq!(env.event_action(), Some(EventAction::MessageSent));
        let msg: Message = env.data_as().unwrap();
        assert_eq!(msg.id.as_str(), "m9");
    }

    #[test]
    fn data_as_missing_payload_is_error_for_structs() {
        let env = Envelope::new(EnvelopeType::Event);
        assert!(env.data_as::<Message>().is_err());
    }
}
