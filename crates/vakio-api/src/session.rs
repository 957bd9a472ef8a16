//! MQTT broker session with a background receive loop.
//!
//! One [`MqttSession`] owns one broker connection. Inbound publishes and
//! connection-established events are delivered to the callbacks registered
//! in [`SessionHandlers`]; both run on the receive-loop task, never on the
//! caller's task.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use vakio_api::{MqttSession, SessionHandlers, TransportConfig};
//!
//! let handlers = SessionHandlers {
//!     on_message: Arc::new(|topic, payload| println!("{topic}: {payload:?}")),
//!     on_connect: Arc::new(|| println!("connected")),
//! };
//! let topics = vec!["vakio/speed".to_string()];
//! let session = MqttSession::new(TransportConfig::new("broker.lan", 1883), topics, handlers);
//!
//! if session.connect().await? {
//!     session.publish("vakio/speed", "3").await;
//! }
//! session.disconnect().await;
//! ```

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use arc_swap::ArcSwapOption;
use rumqttc::{AsyncClient, ConnectionError, Event, EventLoop, Outgoing, Packet, Publish, QoS};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::Error;
use crate::transport::TransportConfig;

/// How long `disconnect` waits for the receive loop to wind down.
const LOOP_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

// ── Callbacks ────────────────────────────────────────────────────────

/// Invoked with `(topic, payload)` for every inbound publish.
pub type MessageHandler = Arc<dyn Fn(&str, &[u8]) + Send + Sync>;

/// Invoked after every successful CONNACK, once subscriptions are queued.
pub type ConnectHandler = Arc<dyn Fn() + Send + Sync>;

/// Callbacks registered once at construction.
#[derive(Clone)]
pub struct SessionHandlers {
    pub on_message: MessageHandler,
    pub on_connect: ConnectHandler,
}

impl SessionHandlers {
    /// Handlers that drop everything. Used for connection probes.
    pub fn noop() -> Self {
        Self {
            on_message: Arc::new(|_, _| {}),
            on_connect: Arc::new(|| {}),
        }
    }
}

impl std::fmt::Debug for SessionHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandlers").finish_non_exhaustive()
    }
}

// ── SessionState ─────────────────────────────────────────────────────

/// Lifecycle of the broker connection, observable via [`MqttSession::state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Connected,
    /// The connection dropped and the single reconnect attempt is running.
    Reconnecting,
    Closed,
}

// ── MqttSession ──────────────────────────────────────────────────────

pub struct MqttSession {
    transport: TransportConfig,
    subscriptions: Arc<[String]>,
    handlers: SessionHandlers,
    client: ArcSwapOption<AsyncClient>,
    /// Packet-sent notifications from the loop. The mutex doubles as the
    /// publish lock: only one publish is in flight at a time.
    sent_rx: tokio::sync::Mutex<Option<mpsc::UnboundedReceiver<u16>>>,
    state: Arc<watch::Sender<SessionState>>,
    cancel: Mutex<CancellationToken>,
    task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    last_failure: Mutex<Option<Error>>,
}

impl MqttSession {
    /// Create a session. Does NOT connect.
    pub fn new(
        transport: TransportConfig,
        subscriptions: Vec<String>,
        handlers: SessionHandlers,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Idle);
        Self {
            transport,
            subscriptions: subscriptions.into(),
            handlers,
            client: ArcSwapOption::empty(),
            sent_rx: tokio::sync::Mutex::new(None),
            state: Arc::new(state),
            cancel: Mutex::new(CancellationToken::new()),
            task: tokio::sync::Mutex::new(None),
            last_failure: Mutex::new(None),
        }
    }

    pub fn transport(&self) -> &TransportConfig {
        &self.transport
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    /// Why the most recent `connect` returned `false`, if it did.
    pub fn take_failure(&self) -> Option<Error> {
        self.last_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    // ── Connection lifecycle ─────────────────────────────────────

    /// Open the broker connection and wait for the CONNACK.
    ///
    /// Returns `Ok(false)` when the broker is unreachable, refuses the
    /// login, or does not answer in time; the reason is kept for
    /// [`take_failure`](Self::take_failure). Malformed options or
    /// credentials are returned as `Err`.
    pub async fn connect(&self) -> Result<bool, Error> {
        if self.is_connected() {
            return Ok(true);
        }

        let client_id = client_id();
        let options = self.transport.mqtt_options(&client_id)?;

        // A previous attempt may still own a loop.
        self.disconnect().await;

        self.state.send_replace(SessionState::Connecting);
        tracing::info!(
            broker = %self.transport.address(),
            client_id = %client_id,
            "Connecting to MQTT broker"
        );

        let (client, eventloop) = AsyncClient::new(options, self.transport.request_capacity);
        let (ready_tx, ready_rx) = oneshot::channel();
        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        *self.cancel.lock().unwrap_or_else(PoisonError::into_inner) = cancel.clone();
        *self.sent_rx.lock().await = Some(sent_rx);

        let ctx = LoopContext {
            client: client.clone(),
            subscriptions: Arc::clone(&self.subscriptions),
            handlers: self.handlers.clone(),
            state: Arc::clone(&self.state),
            sent_tx,
            cancel,
            address: self.transport.address(),
        };
        let handle = tokio::spawn(receive_loop(eventloop, ctx, ready_tx));

        self.client.store(Some(Arc::new(client)));
        *self.task.lock().await = Some(handle);

        let failure = match tokio::time::timeout(self.transport.connect_timeout, ready_rx).await {
            Ok(Ok(Ok(()))) => {
                tracing::info!(broker = %self.transport.address(), "MQTT session established");
                return Ok(true);
            }
            Ok(Ok(Err(failure))) => failure,
            Ok(Err(_)) => Error::Unreachable {
                address: self.transport.address(),
                reason: "receive loop stopped before the broker answered".into(),
            },
            Err(_) => Error::Timeout {
                timeout_secs: self.transport.connect_timeout.as_secs(),
            },
        };

        tracing::warn!(
            broker = %self.transport.address(),
            error = %failure,
            "MQTT connect failed"
        );
        *self
            .last_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(failure);
        self.disconnect().await;
        Ok(false)
    }

    /// Stop the receive loop and drop the connection.
    ///
    /// Safe to call before `connect`, after a failed `connect`, and more
    /// than once.
    pub async fn disconnect(&self) {
        self.shutdown();

        let handle = self.task.lock().await.take();
        if let Some(handle) = handle {
            if tokio::time::timeout(LOOP_DRAIN_TIMEOUT, handle).await.is_err() {
                tracing::warn!("MQTT receive loop did not stop in time");
            }
        }

        self.sent_rx.lock().await.take();
    }

    /// Synchronous half of [`disconnect`](Self::disconnect).
    ///
    /// Cancels the loop and releases the client without waiting, so it can
    /// be called from inside a session callback.
    pub fn shutdown(&self) {
        self.cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel();

        if let Some(client) = self.client.swap(None) {
            if let Err(e) = client.try_disconnect() {
                tracing::debug!(error = %e, "disconnect request not queued");
            }
            self.state.send_replace(SessionState::Closed);
            tracing::debug!("MQTT session closed");
        }
    }

    // ── Publishing ───────────────────────────────────────────────

    /// Publish one QoS 0 message.
    ///
    /// Returns `true` once the event loop reports the packet sent. Returns
    /// `false` when disconnected, when the request cannot be queued, or when
    /// the packet does not leave within the publish timeout.
    pub async fn publish(&self, topic: &str, payload: &str) -> bool {
        let mut sent_guard = self.sent_rx.lock().await;

        let Some(client) = self.client.load_full() else {
            tracing::debug!(topic, "publish skipped: session is disconnected");
            return false;
        };
        let Some(sent_rx) = sent_guard.as_mut() else {
            return false;
        };

        // Drop notifications left over from publishes that timed out.
        while sent_rx.try_recv().is_ok() {}

        let queued = client
            .try_publish(topic, QoS::AtMostOnce, false, payload.as_bytes().to_vec())
            .map_err(Error::from);
        if let Err(e) = queued {
            tracing::warn!(topic, error = %e, "publish request rejected");
            return false;
        }

        match tokio::time::timeout(self.transport.publish_timeout, sent_rx.recv()).await {
            Ok(Some(_)) => {
                tracing::debug!(topic, payload, "published");
                true
            }
            Ok(None) => {
                tracing::warn!(topic, "connection closed before the publish was sent");
                false
            }
            Err(_) => {
                tracing::warn!(
                    topic,
                    timeout_ms = u64::try_from(self.transport.publish_timeout.as_millis())
                        .unwrap_or(u64::MAX),
                    "publish timed out"
                );
                false
            }
        }
    }
}

impl Drop for MqttSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Random client id, `vakio-` plus eight hex characters.
fn client_id() -> String {
    let suffix: String = uuid::Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(8)
        .collect();
    format!("vakio-{suffix}")
}

// ── Receive loop ─────────────────────────────────────────────────────

struct LoopContext {
    client: AsyncClient,
    subscriptions: Arc<[String]>,
    handlers: SessionHandlers,
    state: Arc<watch::Sender<SessionState>>,
    sent_tx: mpsc::UnboundedSender<u16>,
    cancel: CancellationToken,
    address: String,
}

/// Poll the event loop until cancelled or the connection is lost for good.
///
/// The first CONNACK (or the first error) completes `ready`. After a loss,
/// exactly one reconnect is attempted: the next poll reconnects, and a
/// second consecutive error ends the loop.
async fn receive_loop(
    mut eventloop: EventLoop,
    ctx: LoopContext,
    ready: oneshot::Sender<Result<(), Error>>,
) {
    let mut ready = Some(ready);
    let mut reconnecting = false;

    loop {
        let event = tokio::select! {
            biased;
            () = ctx.cancel.cancelled() => break,
            event = eventloop.poll() => event,
        };

        match event {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                if let Err(e) = subscribe_all(&ctx.client, &ctx.subscriptions) {
                    tracing::warn!(error = %e, "subscribe failed");
                }
                ctx.state.send_replace(SessionState::Connected);
                (ctx.handlers.on_connect)();

                if reconnecting {
                    tracing::info!(broker = %ctx.address, "MQTT session re-established");
                    reconnecting = false;
                }
                if let Some(tx) = ready.take() {
                    let _ = tx.send(Ok(()));
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                dispatch_publish(&publish, &ctx.handlers);
            }
            Ok(Event::Outgoing(Outgoing::Publish(pkid))) => {
                // Ignore send errors -- nobody is waiting on this publish
                let _ = ctx.sent_tx.send(pkid);
            }
            Ok(_) => {}
            Err(e) => {
                if let Some(tx) = ready.take() {
                    let _ = tx.send(Err(connect_failure(&e, &ctx.address)));
                    break;
                }
                if ctx.cancel.is_cancelled() {
                    break;
                }
                if reconnecting {
                    tracing::error!(
                        broker = %ctx.address,
                        error = %e,
                        "MQTT reconnect failed, giving up"
                    );
                    break;
                }

                tracing::warn!(
                    broker = %ctx.address,
                    error = %e,
                    "MQTT connection lost, attempting one reconnect"
                );
                reconnecting = true;
                ctx.state.send_replace(SessionState::Reconnecting);
            }
        }
    }

    ctx.state.send_replace(SessionState::Closed);
    tracing::debug!("MQTT receive loop exiting");
}

/// Queue a QoS 0 subscription for every topic. Stops at the first topic
/// the client refuses to queue.
fn subscribe_all(client: &AsyncClient, topics: &[String]) -> Result<(), Error> {
    for topic in topics {
        client.try_subscribe(topic.as_str(), QoS::AtMostOnce)?;
        tracing::debug!(topic = %topic, "subscribed");
    }
    Ok(())
}

/// Hand one inbound publish to the message callback.
fn dispatch_publish(publish: &Publish, handlers: &SessionHandlers) {
    tracing::trace!(topic = %publish.topic, bytes = publish.payload.len(), "message received");
    (handlers.on_message)(&publish.topic, &publish.payload);
}

/// Classify a connection error from the first connect attempt.
fn connect_failure(err: &ConnectionError, address: &str) -> Error {
    match err {
        ConnectionError::ConnectionRefused(code) => Error::Refused {
            reason: format!("{code:?}"),
        },
        ConnectionError::NetworkTimeout => Error::Timeout { timeout_secs: 0 },
        other => Error::Unreachable {
            address: address.to_string(),
            reason: other.to_string(),
        },
    }
}

// ── Tests ────────────────────────────────────────────────────────────
