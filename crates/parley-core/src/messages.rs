//! Chat message model.
//!
//! A [`Message`] is identified by its [`MessageId`]. Messages are created by
//! the orchestrator (local sends) or decoded from inbound events, and are only
//! mutated afterwards through a [`MessagePatch`] (typically a status change).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{MessageId, ParticipantId};

/// Content kind of a message. Unknown kinds from newer servers decode as
/// [`MessageKind::Other`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Plain or markdown text.
    #[default]
    Text,
    /// Image attachment.
    Image,
    /// Generic file attachment.
    File,
    /// Audio clip.
    Audio,
    /// Video clip.
    Video,
    /// System notice (joins, leaves, moderation).
    System,
    /// Any kind this client does not know about.
    #[serde(other)]
    Other,
}

/// Delivery status of a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    /// Handed to the transport, not yet acknowledged.
    Sending,
    /// Acknowledged by the server.
    Sent,
    /// Delivered to at least one recipient.
    Delivered,
    /// Read by at least one recipient.
    Read,
    /// Could not be sent.
    Failed,
}

/// Author of a message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sender {
    /// Participant identity.
    pub id: ParticipantId,
    /// Display name.
    pub name: String,
    /// Avatar URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl Sender {
    /// Create a sender without an avatar.
    pub fn new(id: impl Into<ParticipantId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            avatar: None,
        }
    }
}

/// A single chat message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Stable identity.
    pub id: MessageId,
    /// Content kind.
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
    /// Message body.
    pub content: String,
    /// Author.
    pub sender: Sender,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
    /// Delivery status (absent for messages from other participants).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<MessageStatus>,
    /// Whether the local user authored this message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_own: Option<bool>,
    /// Free-form metadata attached by the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl Message {
    /// Create a message with the given ID, authored now.
    pub fn new(id: impl Into<MessageId>, sender: Sender, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: MessageKind::Text,
            content: content.into(),
            sender,
            timestamp: Utc::now(),
            status: None,
            is_own: None,
            metadata: None,
        }
    }

    /// Create a locally authored text message with a fresh ID in the
    /// [`MessageStatus::Sending`] state.
    pub fn outgoing(sender: Sender, content: impl Into<String>) -> Self {
        Self {
            status: Some(MessageStatus::Sending),
            is_own: Some(true),
            ..Self::new(MessageId::generate(), sender, content)
        }
    }

    /// Merge the fields present in `patch` into this message.
    ///
    /// The ID is never changed.
    pub fn apply(&mut self, patch: MessagePatch) {
        if let Some(kind) = patch.kind {
            self.kind = kind;
        }
        if let Some(content) = patch.content {
            self.content = content;
        }
        if let Some(sender) = patch.sender {
            self.sender = sender;
        }
        if let Some(timestamp) = patch.timestamp {
            self.timestamp = timestamp;
        }
        if let Some(status) = patch.status {
            self.status = Some(status);
        }
        if let Some(is_own) = patch.is_own {
            self.is_own = Some(is_own);
        }
        if let Some(metadata) = patch.metadata {
            self.metadata = Some(metadata);
        }
    }
}

/// Partial update for a [`Message`]. Absent fields are left untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MessagePatch {
    /// New content kind.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<MessageKind>,
    /// New body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// New author details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<Sender>,
    /// New timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// New delivery status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<MessageStatus>,
    /// New ownership flag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_own: Option<bool>,
    /// Replacement metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl MessagePatch {
    /// Patch that only changes the delivery status.
    pub fn status(status: MessageStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}
