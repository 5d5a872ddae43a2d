//! `tokio-tungstenite` socket implementation.

use async_trait::async_trait;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use parley_core::TransportError;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace};
use url::Url;

use crate::socket::{Connector, SocketEvent, SocketPair, SocketSink};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Close code reported when a close frame carried no status.
const NO_STATUS_RECEIVED: u16 = 1005;

/// Opens plain WebSocket connections.
#[derive(Clone, Copy, Debug, Default)]
pub struct TungsteniteConnector;

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn open(&self, url: &Url) -> Result<SocketPair, TransportError> {
        let (ws, response) = connect_async(url.as_str())
            .await
            .map_err(|e| TransportError::Socket(format!("connect {}: {e}", redact(url))))?;
        debug!(status = %response.status(), host = ?url.host_str(), "websocket handshake complete");

        let (sink, stream) = ws.split();
        let events = stream
            .filter_map(|item| async move {
                match item {
                    Ok(message) => map_message(message),
                    Err(e) => Some(SocketEvent::Error(e.to_string())),
                }
            })
            .boxed();

        Ok(SocketPair {
            sink: Box::new(WsSink { inner: sink }),
            events,
        })
    }
}

fn map_message(message: Message) -> Option<SocketEvent> {
    match message {
        Message::Text(text) => Some(SocketEvent::Message(text.as_str().to_owned())),
        Message::Binary(bytes) => match String::from_utf8(bytes.to_vec()) {
            Ok(text) => Some(SocketEvent::Message(text)),
            Err(_) => Some(SocketEvent::Malformed("non-UTF-8 binary frame".into())),
        },
        Message::Close(frame) => Some(match frame {
            Some(frame) => SocketEvent::Closed {
                code: u16::from(frame.code),
                reason: frame.reason.as_str().to_owned(),
            },
            None => SocketEvent::Closed {
                code: NO_STATUS_RECEIVED,
                reason: String::new(),
            },
        }),
        // control frames are answered by tungstenite itself
        Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {
            trace!("websocket control frame");
            None
        }
    }
}

/// Strip the query string (which carries the token) for logs and errors.
fn redact(url: &Url) -> String {
    let mut shown = url.clone();
    shown.set_query(None);
    shown.to_string()
}

struct WsSink {
    inner: SplitSink<WsStream, Message>,
}

#[async_trait]
impl SocketSink for WsSink {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.inner
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| TransportError::Socket(e.to_string()))
    }

    async fn close(&mut self, code: u16, reason: &str) -> Result<(), TransportError> {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: reason.to_owned().into(),
        };
        self.inner
            .send(Message::Close(Some(frame)))
            .await
            .map_err(|e| TransportError::Socket(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_and_close_frames_map() {
        assert_eq!(
            map_message(Message::Text("hi".into())),
            Some(SocketEvent::Message("hi".into()))
        );
        assert_eq!(
            map_message(Message::Close(Some(CloseFrame {
                code: CloseCode::Normal,
                reason: "bye".into(),
            }))),
            Some(SocketEvent::Closed {
                code: 1000,
                reason: "bye".into()
            })
        );
        assert_eq!(
            map_message(Message::Close(None)),
            Some(SocketEvent::Closed {
                code: 1005,
                reason: String::new()
            })
        );
    }

    #[test]
    fn control_frames_are_dropped() {
        assert_eq!(map_message(Message::Ping(Vec::new().into())), None);
        assert_eq!(map_message(Message::Pong(Vec::new().into())), None);
    }

    #[test]
    fn binary_utf8_is_text() {
        assert_eq!(
            map_message(Message::Binary(b"{}".to_vec().into())),
            Some(SocketEvent::Message("{}".into()))
        );
    }

    #[test]
    fn binary_non_utf8_is_malformed_not_fatal() {
        assert_eq!(
            map_message(Message::Binary(vec![0xff, 0xfe].into())),
            Some(SocketEvent::Malformed("non-UTF-8 binary frame".into()))
        );
    }

    #[test]
    fn redact_drops_token() {
        let url = Url::parse("ws://chat.example.com/ws?token=secret").unwrap();
        assert_eq!(redact(&url), "ws://chat.example.com/ws");
    }
}
