//! Transport state machine.
//!
//! ```text
//! Disconnected --connect()--> Connecting --open--> Connected
//! Connecting   --auth or open failure (first attempt)--> Error
//! Connected    --close 1000--> Disconnected
//! Connected    --other close / socket error--> Reconnecting | Disconnected (attempts spent)
//! Reconnecting --backoff elapsed--> Connecting
//! any          --disconnect()--> Disconnected
//! ```
//!
//! Each `connect()` from an idle state starts a connection cycle: a new
//! generation number, a new cancellation token, and one background task
//! that owns the socket, the keepalive timer and the reconnect timer.
//! `disconnect()` bumps the generation and cancels the token, which tears
//! all of them down together. Every state change made by the background task
//! is checked against its generation, so a superseded cycle can never move
//! the state.
//!
//! State handlers receive changes in the order they happened, even when
//! `connect()` and `disconnect()` race on different threads.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use parley_core::{
    Backoff, ConnectionState, Envelope, EnvelopeType, EventAction, Message, ProtocolError,
    SendError, TransportError, codec,
};
use serde_json::json;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::auth::{self, TokenProvider};
use crate::config::TransportConfig;
use crate::handlers::{HandlerId, HandlerRegistry};
use crate::session::{SessionEnd, run_session};
use crate::socket::{Connector, NORMAL_CLOSURE, SocketPair};
use crate::ws::TungsteniteConnector;

struct Shared {
    state: ConnectionState,
    generation: u64,
    backoff: Backoff,
    /// Present only while `Connected`.
    outbound: Option<mpsc::Sender<String>>,
    cancel: CancellationToken,
    /// State changes not yet delivered to handlers, oldest first.
    undelivered: VecDeque<ConnectionState>,
    /// Some thread is draining `undelivered`.
    delivering: bool,
}

pub(crate) struct Inner {
    pub(crate) config: TransportConfig,
    connector: Arc<dyn Connector>,
    tokens: Arc<dyn TokenProvider>,
    handlers: HandlerRegistry,
    shared: Mutex<Shared>,
    state_tx: watch::Sender<ConnectionState>,
}

impl Inner {
    /// Record a state change while holding the lock. Returns whether it changed.
    fn set_state(&self, shared: &mut Shared, to: ConnectionState) -> bool {
        if shared.state == to {
            return false;
        }
        debug!(
            from = %shared.state,
            to = %to,
            generation = shared.generation,
            "connection state changed"
        );
        shared.state = to;
        shared.undelivered.push_back(to);
        let _ = self.state_tx.send_replace(to);
        true
    }

    /// Deliver queued state changes to handlers in the order they were made.
    ///
    /// Only one caller drains at a time; the others return at once and leave
    /// their changes to it. Call without holding `shared`.
    fn deliver_states(&self) {
        {
            let mut shared = self.shared.lock();
            if shared.delivering || shared.undelivered.is_empty() {
                return;
            }
            shared.delivering = true;
        }
        loop {
            let next = {
                let mut shared = self.shared.lock();
                let next = shared.undelivered.pop_front();
                if next.is_none() {
                    shared.delivering = false;
                }
                next
            };
            match next {
                Some(state) => self.handlers.dispatch_state(state),
                None => return,
            }
        }
    }

    /// Apply `update` and move to `to` if `generation` is still current.
    /// Returns `false` for a stale generation.
    fn transition(
        &self,
        generation: u64,
        to: ConnectionState,
        update: impl FnOnce(&mut Shared),
    ) -> bool {
        {
            let mut shared = self.shared.lock();
            if shared.generation != generation {
                trace!(
                    generation,
                    current = shared.generation,
                    "ignoring stale transition"
                );
                return false;
            }
            update(&mut *shared);
            let _ = self.set_state(&mut shared, to);
        }
        self.deliver_states();
        true
    }

    /// Start a new connection cycle unless one is already connecting or connected.
    fn begin_cycle(&self) -> Option<(u64, CancellationToken)> {
        let (generation, cancel) = {
            let mut shared = self.shared.lock();
            if shared.state.is_active() {
                debug!(state = %shared.state, "connect ignored, already active");
                return None;
            }
            shared.cancel.cancel();
            shared.generation += 1;
            shared.cancel = CancellationToken::new();
            shared.backoff.reset();
            shared.outbound = None;
            let _ = self.set_state(&mut shared, ConnectionState::Connecting);
            (shared.generation, shared.cancel.clone())
        };
        self.deliver_states();
        Some((generation, cancel))
    }

    fn disconnect(&self) {
        let changed = {
            let mut shared = self.shared.lock();
            shared.generation += 1;
            shared.cancel.cancel();
            shared.outbound = None;
            self.set_state(&mut shared, ConnectionState::Disconnected)
        };
        if changed {
            info!("disconnected by client");
        }
        self.deliver_states();
    }

    /// Resolve a token and open a socket to the authorized URL.
    async fn open(&self) -> Result<SocketPair, TransportError> {
        let token = auth::resolve_token(self.tokens.as_ref()).await?;
        let url = auth::authorize_url(&self.config.url, &token);
        self.connector.open(&url).await
    }

    /// Background task for one connection cycle.
    async fn drive(
        self: Arc<Self>,
        generation: u64,
        cancel: CancellationToken,
        ready: oneshot::Sender<()>,
    ) {
        let mut ready = Some(ready);
        let mut reconnecting = false;

        loop {
            let opened = tokio::select! {
                biased;
                () = cancel.cancelled() => return,
                opened = self.open() => opened,
            };

            let end = match opened {
                Ok(pair) => {
                    let (tx, rx) = mpsc::channel(self.config.send_queue_capacity);
                    if !self.enter_connected(generation, tx) {
                        let mut sink = pair.sink;
                        let _ = sink.close(NORMAL_CLOSURE, "superseded").await;
                        return;
                    }
                    if let Some(ready) = ready.take() {
                        let _ = ready.send(());
                    }
                    run_session(&self, pair, rx, &cancel).await
                }
                // auth is fatal on every attempt; socket failures only on the first
                Err(err) if err.is_fatal() || !reconnecting => {
                    if self.transition(generation, ConnectionState::Error, |s| s.outbound = None) {
                        self.emit_error(&err);
                    }
                    return;
                }
                Err(err) => SessionEnd::Failed(err),
            };

            match end {
                SessionEnd::Cancelled => return,
                SessionEnd::Closed {
                    code: NORMAL_CLOSURE,
                    reason,
                } => {
                    info!(generation, reason = %reason, "server closed connection normally");
                    let _ = self.transition(generation, ConnectionState::Disconnected, |s| {
                        s.outbound = None;
                    });
                    return;
                }
                SessionEnd::Closed { code, reason } => {
                    self.emit_error(&TransportError::AbnormalClose { code, reason });
                }
                SessionEnd::Failed(err) => self.emit_error(&err),
            }

            let Some(delay) = self.schedule_reconnect(generation) else {
                return;
            };
            tokio::select! {
                biased;
                () = cancel.cancelled() => return,
                () = tokio::time::sleep(delay) => {}
            }
            if !self.transition(generation, ConnectionState::Connecting, |_| {}) {
                return;
            }
            reconnecting = true;
        }
    }

    fn enter_connected(&self, generation: u64, outbound: mpsc::Sender<String>) -> bool {
        let current = self.transition(generation, ConnectionState::Connected, |s| {
            s.backoff.reset();
            s.outbound = Some(outbound);
        });
        if !current {
            debug!(generation, "stale connection attempt, discarding socket");
            return false;
        }
        info!(generation, url = %self.config.url, "connected");
        if let Err(e) = self.send(Envelope::subscribe(&self.config.events)) {
            warn!(error = %e, "failed to queue subscribe");
        }
        true
    }

    /// Consume one backoff step and enter `Reconnecting`, or settle at
    /// `Disconnected` once the attempts are spent.
    fn schedule_reconnect(&self, generation: u64) -> Option<Duration> {
        let (delay, attempts) = {
            let mut shared = self.shared.lock();
            if shared.generation != generation {
                return None;
            }
            shared.outbound = None;
            let delay = shared.backoff.next_delay();
            let to = if delay.is_some() {
                ConnectionState::Reconnecting
            } else {
                ConnectionState::Disconnected
            };
            let _ = self.set_state(&mut shared, to);
            (delay, shared.backoff.attempts())
        };
        self.deliver_states();

        match delay {
            Some(delay) => {
                info!(
                    generation,
                    attempt = attempts,
                    max_attempts = self.config.max_reconnect_attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "scheduling reconnect"
                );
                Some(delay)
            }
            None => {
                self.emit_error(&TransportError::ReconnectExhausted { attempts });
                None
            }
        }
    }

    /// Fill in identity, frame ID, and timestamp on an outbound frame.
    pub(crate) fn stamp(&self, mut envelope: Envelope) -> Envelope {
        let identity = &self.config.identity;
        if envelope.tenant_id.is_none() {
            envelope.tenant_id.clone_from(&identity.tenant_id);
        }
        if envelope.project_id.is_none() {
            envelope.project_id.clone_from(&identity.project_id);
        }
        if envelope.user_id.is_none() {
            envelope.user_id.clone_from(&identity.user_id);
        }
        envelope.stamped()
    }

    fn send(&self, envelope: Envelope) -> Result<(), SendError> {
        let sender = {
            let shared = self.shared.lock();
            if shared.state != ConnectionState::Connected {
                return Err(SendError::NotConnected);
            }
            shared.outbound.clone().ok_or(SendError::NotConnected)?
        };
        let frame = codec::encode(&self.stamp(envelope))?;
        sender.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => SendError::QueueFull,
            TrySendError::Closed(_) => SendError::ChannelClosed,
        })
    }

    /// Decode one socket message and route each envelope.
    pub(crate) fn handle_frame(&self, text: &str) {
        let frame = codec::decode(text);
        for e in frame.errors {
            self.emit_error(&TransportError::Protocol(e));
        }
        for envelope in frame.envelopes {
            match envelope.kind {
                EnvelopeType::Event => {
                    if let Some(action) = envelope.action.as_deref() {
                        let ran = self.handlers.dispatch_message(action, &envelope);
                        trace!(action, handlers = ran, "event dispatched");
                    }
                }
                EnvelopeType::Pong => trace!("keepalive acknowledged"),
                EnvelopeType::Ping => {
                    if let Err(e) = self.send(Envelope::new(EnvelopeType::Pong)) {
                        debug!(error = %e, "could not answer server ping");
                    }
                }
                EnvelopeType::Error => {
                    let message = envelope
                        .error
                        .unwrap_or_else(|| "unspecified server error".to_owned());
                    self.emit_error(&TransportError::Server(message));
                }
                other => debug!(kind = ?other, "ignoring inbound frame"),
            }
        }
    }

    /// Report an unreadable socket message. The session carries on.
    pub(crate) fn report_malformed(&self, reason: String) {
        self.emit_error(&TransportError::Protocol(ProtocolError::new(0, reason)));
    }

    fn emit_error(&self, err: &TransportError) {
        match err {
            TransportError::Auth(_) => error!(kind = err.kind(), error = %err, "transport error"),
            TransportError::Protocol(p) => {
                warn!(line = p.line, reason = %p.reason, "malformed inbound line");
            }
            _ => warn!(kind = err.kind(), error = %err, "transport error"),
        }
        self.handlers.dispatch_error(err);
    }
}

/// Shuts the connection down when the last [`Transport`] handle is dropped.
struct OwnerGuard(Arc<Inner>);

impl Drop for OwnerGuard {
    fn drop(&mut self) {
        self.0.disconnect();
    }
}

/// Handle to one logical realtime connection.
///
/// Cheap to clone; all clones drive the same connection. Dropping the last
/// clone disconnects.
#[derive(Clone)]
pub struct Transport {
    inner: Arc<Inner>,
    _owner: Arc<OwnerGuard>,
}

impl Transport {
    /// Build a disconnected transport over an arbitrary socket implementation.
    pub fn new(
        config: TransportConfig,
        connector: Arc<dyn Connector>,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let backoff = config.backoff();
        let inner = Arc::new(Inner {
            config,
            connector,
            tokens,
            handlers: HandlerRegistry::new(),
            shared: Mutex::new(Shared {
                state: ConnectionState::Disconnected,
                generation: 0,
                backoff,
                outbound: None,
                cancel: CancellationToken::new(),
                undelivered: VecDeque::new(),
                delivering: false,
            }),
            state_tx,
        });
        Self {
            _owner: Arc::new(OwnerGuard(inner.clone())),
            inner,
        }
    }

    /// Build a disconnected transport over `tokio-tungstenite`.
    pub fn tungstenite(config: TransportConfig, tokens: Arc<dyn TokenProvider>) -> Self {
        Self::new(config, Arc::new(TungsteniteConnector), tokens)
    }

    /// Configuration this transport was built with.
    pub fn config(&self) -> &TransportConfig {
        &self.inner.config
    }

    /// Start connecting. No-op while `Connecting` or `Connected`.
    ///
    /// Resolves once the first attempt of the new cycle has either reached
    /// `Connected` or failed into `Error`, or when the cycle is cancelled by
    /// [`Self::disconnect`]. Failures are reported through the error handlers
    /// and the connection state, not returned.
    pub async fn connect(&self) {
        let Some((generation, cancel)) = self.inner.begin_cycle() else {
            return;
        };
        let (ready_tx, ready_rx) = oneshot::channel();
        let driver = self.inner.clone().drive(generation, cancel, ready_tx);
        drop(tokio::spawn(driver));
        let _ = ready_rx.await;
    }

    /// Close the socket, cancel keepalive and reconnect timers, and settle at
    /// `Disconnected`. Safe to call repeatedly and from any state.
    pub fn disconnect(&self) {
        self.inner.disconnect();
    }

    /// Queue a frame for the socket. Fails unless `Connected`.
    ///
    /// Identity, frame ID, and timestamp are filled in if absent.
    pub fn send(&self, envelope: Envelope) -> Result<(), SendError> {
        self.inner.send(envelope)
    }

    /// Send a `chat.message.send` command carrying `message`.
    pub fn send_message(&self, message: &Message) -> Result<(), SendError> {
        let data = serde_json::to_value(message).map_err(|e| SendError::Encode(e.to_string()))?;
        self.send(Envelope::command(EventAction::SendMessage, data))
    }

    /// Send `typing.start` or `typing.stop`.
    pub fn send_typing_indicator(&self, typing: bool) -> Result<(), SendError> {
        let action = if typing {
            EventAction::TypingStart
        } else {
            EventAction::TypingStop
        };
        self.send(Envelope::command(action, json!({ "isTyping": typing })))
    }

    /// Request the configured event set. Sent automatically on every connect.
    pub fn subscribe(&self) -> Result<(), SendError> {
        self.send(Envelope::subscribe(&self.inner.config.events))
    }

    /// Stop receiving the configured event set.
    pub fn unsubscribe(&self) -> Result<(), SendError> {
        self.send(Envelope::unsubscribe(&self.inner.config.events))
    }

    /// Run `handler` for every inbound event with `action`.
    pub fn on_message<F>(&self, action: &str, handler: F) -> HandlerId
    where
        F: Fn(&Envelope) + Send + Sync + 'static,
    {
        self.inner.handlers.on_message(action, Arc::new(handler))
    }

    /// Run `handler` on every state transition.
    pub fn on_connection_change<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(ConnectionState) + Send + Sync + 'static,
    {
        self.inner.handlers.on_connection_change(Arc::new(handler))
    }

    /// Run `handler` for every transport error.
    pub fn on_error<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&TransportError) + Send + Sync + 'static,
    {
        self.inner.handlers.on_error(Arc::new(handler))
    }

    /// Unregister a handler. Returns whether it was registered.
    pub fn remove_handler(&self, id: HandlerId) -> bool {
        self.inner.handlers.remove(id)
    }

    /// Whether the state is `Connected`.
    pub fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Connected
    }

    /// Current state.
    pub fn connection_state(&self) -> ConnectionState {
        self.inner.shared.lock().state
    }

    /// Receiver that observes every state change.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// Reconnect attempts consumed since the last successful connect.
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.shared.lock().backoff.attempts()
    }

    /// Delay the next reconnect would wait, or `None` once attempts are spent.
    pub fn next_reconnect_delay(&self) -> Option<Duration> {
        self.inner.shared.lock().backoff.peek()
    }
}
