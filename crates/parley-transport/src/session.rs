//! One live connection.
//!
//! Owns the socket halves for as long as the transport stays `Connected`:
//! drains the outbound queue, sends keepalive pings, and feeds inbound text
//! to the dispatcher. Returns when the socket closes or fails, or when the
//! connection cycle is cancelled.

use futures::StreamExt;
use parley_core::{Envelope, TransportError, codec};
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::socket::{ABNORMAL_CLOSURE, NORMAL_CLOSURE, SocketEvent, SocketPair};
use crate::transport::Inner;

/// Why a session ended.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum SessionEnd {
    /// The cycle was cancelled (client disconnect). The socket has been closed.
    Cancelled,
    /// The peer closed the socket, or the read stream ended.
    Closed {
        /// Close code.
        code: u16,
        /// Close reason.
        reason: String,
    },
    /// Reading or writing failed.
    Failed(TransportError),
}

pub(crate) async fn run_session(
    inner: &Inner,
    pair: SocketPair,
    mut outbound: mpsc::Receiver<String>,
    cancel: &CancellationToken,
) -> SessionEnd {
    let SocketPair {
        mut sink,
        mut events,
    } = pair;
    let period = inner.config.keepalive_interval;
    let mut keepalive = time::interval_at(Instant::now() + period, period);
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                if let Err(e) = sink.close(NORMAL_CLOSURE, "client disconnect").await {
                    debug!(error = %e, "close handshake failed");
                }
                return SessionEnd::Cancelled;
            }
            Some(frame) = outbound.recv() => {
                if let Err(e) = sink.send_text(frame).await {
                    return SessionEnd::Failed(e);
                }
            }
            _ = keepalive.tick() => {
                match codec::encode(&inner.stamp(Envelope::ping())) {
                    Ok(frame) => {
                        trace!("keepalive ping");
                        if let Err(e) = sink.send_text(frame).await {
                            return SessionEnd::Failed(e);
                        }
                    }
                    Err(e) => warn!(error = %e, "failed to encode keepalive ping"),
                }
            }
            event = events.next() => match event {
                Some(SocketEvent::Message(text)) => inner.handle_frame(&text),
                Some(SocketEvent::Closed { code, reason }) => {
                    return SessionEnd::Closed { code, reason };
                }
                Some(SocketEvent::Malformed(reason)) => inner.report_malformed(reason),
                Some(SocketEvent::Error(e)) => {
                    return SessionEnd::Failed(TransportError::Socket(e));
                }
                None => {
                    return SessionEnd::Closed {
                        code: ABNORMAL_CLOSURE,
                        reason: "stream ended without close frame".into(),
                    };
                }
            },
        }
    }
}
