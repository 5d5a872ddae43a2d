//! Error taxonomy shared by the transport and its consumers.
//!
//! - [`ProtocolError`]: one malformed line in an inbound frame. Reported and
//!   skipped, never tears down the connection.
//! - [`TransportError`]: everything delivered to `on_error` handlers. Auth
//!   failures are fatal to the current connect attempt; socket failures feed
//!   the reconnect policy.
//! - [`SendError`]: the only error returned synchronously from the transport's
//!   public API.

use thiserror::Error;

/// A single inbound line that could not be decoded into an envelope.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("malformed frame at line {line}: {reason}")]
pub struct ProtocolError {
    /// 1-based line number within the socket message, or 0 when the whole
    /// message was unreadable.
    pub line: usize,
    /// Human-readable cause.
    pub reason: String,
}

impl ProtocolError {
    /// Create a protocol error for `line`.
    pub fn new(line: usize, reason: impl Into<String>) -> Self {
        Self {
            line,
            reason: reason.into(),
        }
    }
}

/// Failures reported through the transport's error handlers.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TransportError {
    /// No token, or the token provider failed.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Socket-level failure (open, read, or write).
    #[error("socket error: {0}")]
    Socket(String),

    /// The server closed the socket with a non-normal code.
    #[error("connection closed abnormally (code {code}): {reason}")]
    AbnormalClose {
        /// WebSocket close code.
        code: u16,
        /// Close reason sent by the peer.
        reason: String,
    },

    /// Every scheduled reconnect failed.
    #[error("reconnect attempts exhausted after {attempts} tries")]
    ReconnectExhausted {
        /// Number of attempts made.
        attempts: u32,
    },

    /// An inbound line could not be decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The server sent an `error` frame.
    #[error("server error: {0}")]
    Server(String),
}

impl TransportError {
    /// Fatal errors end the current connection attempt without reconnecting.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Auth(_))
    }

    /// Retryable errors are handled by the reconnect policy.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Socket(_) | Self::AbnormalClose { .. })
    }

    /// Short classification string for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Auth(_) => "auth",
            Self::Socket(_) => "socket",
            Self::AbnormalClose { .. } => "abnormal_close",
            Self::ReconnectExhausted { .. } => "reconnect_exhausted",
            Self::Protocol(_) => "protocol",
            Self::Server(_) => "server",
        }
    }
}

/// Failure to hand a frame to the socket.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SendError {
    /// The transport is not in the `Connected` state.
    #[error("not connected")]
    NotConnected,

    /// The frame could not be serialized.
    #[error("failed to encode frame: {0}")]
    Encode(String),

    /// The connection's writer stopped between the state check and the send.
    #[error("connection writer closed")]
    ChannelClosed,

    /// The outbound queue is at capacity.
    #[error("outbound queue full")]
    QueueFull,
}
