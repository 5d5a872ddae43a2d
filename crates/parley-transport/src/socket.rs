//! Socket primitive seam.
//!
//! The transport drives any socket that can be opened by a [`Connector`]:
//! a [`SocketSink`] for writes and a stream of [`SocketEvent`]s for reads.
//! [`crate::ws::TungsteniteConnector`] is the production implementation;
//! tests substitute scripted connectors.

use async_trait::async_trait;
use futures::stream::BoxStream;
use parley_core::TransportError;
use url::Url;

/// WebSocket close code for a normal closure.
pub const NORMAL_CLOSURE: u16 = 1000;
/// Close code reported when the peer vanished without a close frame.
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// One inbound socket occurrence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SocketEvent {
    /// A text message. May hold several newline-delimited envelopes.
    Message(String),
    /// The peer closed the socket.
    Closed {
        /// WebSocket close code.
        code: u16,
        /// Close reason.
        reason: String,
    },
    /// Read failure. The socket is unusable afterwards.
    Error(String),
    /// Frame that could not be read as text. The socket stays usable.
    Malformed(String),
}

/// Write half of an open socket.
#[async_trait]
pub trait SocketSink: Send {
    /// Send one text message.
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Start the closing handshake.
    async fn close(&mut self, code: u16, reason: &str) -> Result<(), TransportError>;
}

/// An open socket split into its two halves.
pub struct SocketPair {
    /// Write half.
    pub sink: Box<dyn SocketSink>,
    /// Read half. Ending without a [`SocketEvent::Closed`] counts as an abnormal closure.
    pub events: BoxStream<'static, SocketEvent>,
}

/// Opens sockets.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a socket to `url`, resolving once it is ready for traffic.
    async fn open(&self, url: &Url) -> Result<SocketPair, TransportError>;
}
