//! # parley-core
//!
//! Foundation types shared by every Parley crate:
//!
//! - **Branded IDs**: [`MessageId`] and [`ParticipantId`] as newtypes for type safety
//! - **Messages**: [`Message`] with its [`Sender`], [`MessageStatus`], and [`MessagePatch`]
//! - **Envelopes**: the [`Envelope`] wire frame and the [`EventAction`] set
//! - **Codec**: newline-delimited JSON [`codec::encode`] / [`codec::decode`]
//! - **Connection state**: [`ConnectionState`]
//! - **Backoff**: [`Backoff`] reconnect delay policy
//! - **Errors**: [`TransportError`], [`ProtocolError`], [`SendError`]

#![deny(unsafe_code)]

pub mod backoff;
pub mod codec;
pub mod envelope;
pub mod errors;
pub mod ids;
pub mod logging;
pub mod messages;
pub mod state;

pub use backoff::Backoff;
pub use codec::DecodedFrame;
pub use envelope::{Envelope, EnvelopeType, EventAction, SUBSCRIBED_EVENTS};
pub use errors::{ProtocolError, SendError, TransportError};
pub use ids::{MessageId, ParticipantId};
pub use messages::{Message, MessageKind, MessagePatch, MessageStatus, Sender};
pub use state::ConnectionState;
