//! # parley-transport
//!
//! One logical realtime connection that survives socket loss.
//!
//! [`Transport`] owns a single WebSocket at a time and moves through
//! [`ConnectionState`](parley_core::ConnectionState)s: it authenticates each
//! attempt through a [`TokenProvider`], subscribes on connect, pings on an
//! interval, and reconnects with exponential backoff after abnormal closes.
//! Inbound events fan out to handlers registered by action name.
//!
//! The socket itself sits behind the [`Connector`] seam;
//! [`TungsteniteConnector`] is the production implementation.

#![deny(unsafe_code)]

pub mod auth;
pub mod config;
pub mod handlers;
mod session;
pub mod socket;
pub mod transport;
pub mod ws;

pub use auth::{StaticToken, TokenError, TokenProvider};
pub use config::{Identity, TransportConfig};
pub use handlers::{HandlerId, HandlerRegistry};
pub use socket::{Connector, SocketEvent, SocketPair, SocketSink};
pub use transport::Transport;
pub use ws::TungsteniteConnector;
