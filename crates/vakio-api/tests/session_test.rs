//! Session behaviour against a scripted loopback broker, and against
//! brokers that are not there.
//!
//! Nothing here needs a running MQTT broker: the scripted broker speaks
//! just enough MQTT 3.1.1 (CONNACK, SUBACK, PINGRESP, one pushed PUBLISH)
//! for a single client, and the remaining tests target a closed local port
//! or never connect at all.

#![allow(clippy::unwrap_used)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use vakio_api::{Credentials, Error, MqttSession, SessionHandlers, SessionState, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

/// A transport aimed at a loopback port nothing listens on.
fn closed_port_transport() -> TransportConfig {
    TransportConfig {
        connect_timeout: Duration::from_secs(3),
        publish_timeout: Duration::from_millis(200),
        ..TransportConfig::new("127.0.0.1", 1)
    }
}

fn topics() -> Vec<String> {
    ["speed", "gate", "state", "endpoint"]
        .iter()
        .map(|e| format!("vakio/{e}"))
        .collect()
}

type Seen = Arc<Mutex<Vec<String>>>;

/// Handlers that record `topic=payload` per message and count CONNACKs.
fn recording_handlers() -> (SessionHandlers, Seen, Arc<AtomicUsize>) {
    let seen: Seen = Arc::default();
    let connects = Arc::new(AtomicUsize::new(0));
    let sink = Arc::clone(&seen);
    let counter = Arc::clone(&connects);
    let handlers = SessionHandlers {
        on_message: Arc::new(move |topic, payload| {
            let payload = String::from_utf8_lossy(payload);
            sink.lock().unwrap().push(format!("{topic}={payload}"));
        }),
        on_connect: Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }),
    };
    (handlers, seen, connects)
}

/// Poll `lines` until `done` holds, failing after three seconds.
async fn wait_until(lines: &Seen, done: impl Fn(&[String]) -> bool) {
    let wait = async {
        while !done(&lines.lock().unwrap()) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    };
    if tokio::time::timeout(Duration::from_secs(3), wait).await.is_err() {
        panic!("condition not reached; log: {:?}", lines.lock().unwrap());
    }
}

// ── Scripted broker ─────────────────────────────────────────────────

#[derive(Clone, Copy, PartialEq, Eq)]
enum Script {
    /// Serve every connection until the client leaves.
    Steady,
    /// Close the first connection once it has subscribed to every topic.
    DropFirstSession,
}

/// Loopback broker that logs what it receives as `CONNECT#n`,
/// `SUB <topic> q<qos>` and `PUB <topic>=<payload>`.
struct ScriptedBroker {
    addr: SocketAddr,
    log: Seen,
}

impl ScriptedBroker {
    async fn start(script: Script) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let log: Seen = Arc::default();

        let accept_log = Arc::clone(&log);
        tokio::spawn(async move {
            let mut sessions = 0;
            while let Ok((stream, _)) = listener.accept().await {
                sessions += 1;
                let drop_after_subscribe = script == Script::DropFirstSession && sessions == 1;
                let log = Arc::clone(&accept_log);
                tokio::spawn(async move {
                    // The client hanging up mid-write is not a broker failure.
                    let _ = serve_client(stream, log, sessions, drop_after_subscribe).await;
                });
            }
        });

        Self { addr, log }
    }

    fn transport(&self) -> TransportConfig {
        TransportConfig {
            connect_timeout: Duration::from_secs(3),
            publish_timeout: Duration::from_secs(1),
            ..TransportConfig::new("127.0.0.1", self.addr.port())
        }
    }

    fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn count(&self, line: &str) -> usize {
        self.log().iter().filter(|l| *l == line).count()
    }
}

async fn serve_client(
    mut stream: TcpStream,
    log: Seen,
    session: usize,
    drop_after_subscribe: bool,
) -> std::io::Result<()> {
    let mut subscriptions = 0;

    while let Some((header, body)) = read_packet(&mut stream).await {
        match header >> 4 {
            // CONNECT
            1 => {
                log.lock().unwrap().push(format!("CONNECT#{session}"));
                stream.write_all(&[0x20, 0x02, 0x00, 0x00]).await?;
            }
            // SUBSCRIBE: packet id, then one topic filter and its QoS
            8 => {
                let (topic, rest) = read_str(&body[2..]);
                let qos = rest[0];
                log.lock().unwrap().push(format!("SUB {topic} q{qos}"));
                stream
                    .write_all(&[0x90, 0x03, body[0], body[1], qos])
                    .await?;

                if topic == "vakio/speed" {
                    stream.write_all(&publish_packet("vakio/speed", "3")).await?;
                }
                subscriptions += 1;
                if drop_after_subscribe && subscriptions == 4 {
                    return Ok(());
                }
            }
            // PUBLISH
            3 => {
                let (topic, rest) = read_str(&body);
                let qos = (header >> 1) & 0x03;
                let payload = if qos == 0 { rest } else { &rest[2..] };
                let payload = String::from_utf8_lossy(payload);
                log.lock().unwrap().push(format!("PUB {topic}={payload}"));
            }
            // PINGREQ
            12 => stream.write_all(&[0xD0, 0x00]).await?,
            // DISCONNECT
            14 => return Ok(()),
            _ => {}
        }
    }
    Ok(())
}

/// One packet as `(first header byte, body)`, or `None` once the peer is gone.
async fn read_packet(stream: &mut TcpStream) -> Option<(u8, Vec<u8>)> {
    let header = stream.read_u8().await.ok()?;

    let mut len = 0usize;
    let mut shift = 0;
    loop {
        let byte = stream.read_u8().await.ok()?;
        len |= usize::from(byte & 0x7F) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
    }

    let mut body = vec![0; len];
    stream.read_exact(&mut body).await.ok()?;
    Some((header, body))
}

/// Length-prefixed UTF-8 string at the start of `buf`, and what follows it.
fn read_str(buf: &[u8]) -> (String, &[u8]) {
    let len = usize::from(u16::from_be_bytes([buf[0], buf[1]]));
    let text = String::from_utf8_lossy(&buf[2..2 + len]).into_owned();
    (text, &buf[2 + len..])
}

/// QoS 0 PUBLISH from the broker to the client.
fn publish_packet(topic: &str, payload: &str) -> Vec<u8> {
    let topic_len = u16::try_from(topic.len()).unwrap();
    let remaining = u8::try_from(2 + topic.len() + payload.len()).unwrap();
    assert!(remaining < 0x80, "single-byte remaining length only");

    let mut packet = vec![0x30, remaining];
    packet.extend_from_slice(&topic_len.to_be_bytes());
    packet.extend_from_slice(topic.as_bytes());
    packet.extend_from_slice(payload.as_bytes());
    packet
}

// ── Connect ─────────────────────────────────────────────────────────

#[tokio::test]
async fn connect_subscribes_to_every_attribute_topic() {
    let broker = ScriptedBroker::start(Script::Steady).await;
    let (handlers, _, connects) = recording_handlers();
    let session = MqttSession::new(broker.transport(), topics(), handlers);

    assert!(session.connect().await.unwrap());
    assert!(session.is_connected());
    assert_eq!(connects.load(Ordering::SeqCst), 1);

    wait_until(&broker.log, |log| log.len() >= 5).await;
    assert_eq!(
        broker.log()[..5],
        [
            "CONNECT#1",
            "SUB vakio/speed q0",
            "SUB vakio/gate q0",
            "SUB vakio/state q0",
            "SUB vakio/endpoint q0",
        ]
    );

    session.disconnect().await;
}

#[tokio::test]
async fn inbound_publish_reaches_the_message_handler() {
    let broker = ScriptedBroker::start(Script::Steady).await;
    let (handlers, seen, _) = recording_handlers();
    let session = MqttSession::new(broker.transport(), topics(), handlers);

    assert!(session.connect().await.unwrap());
    wait_until(&seen, |seen| !seen.is_empty()).await;
    assert_eq!(seen.lock().unwrap().as_slice(), ["vakio/speed=3"]);

    session.disconnect().await;
}

#[tokio::test]
async fn unreachable_broker_returns_false() {
    let (handlers, _, connects) = recording_handlers();
    let session = MqttSession::new(closed_port_transport(), topics(), handlers);

    let connected = session.connect().await.expect("network errors are not fatal");

    assert!(!connected);
    assert_eq!(connects.load(Ordering::SeqCst), 0);
    assert_ne!(session.state(), SessionState::Connected);

    let failure = session.take_failure().expect("failure recorded");
    assert!(!failure.is_auth_rejected());
    assert!(session.take_failure().is_none(), "failure is taken once");
}

#[tokio::test]
async fn malformed_credentials_are_fatal() {
    let transport = closed_port_transport().with_credentials(Credentials {
        username: "vakio".into(),
        password: None,
    });
    let session = MqttSession::new(transport, topics(), SessionHandlers::noop());

    let err = session.connect().await.expect_err("credentials are malformed");
    assert!(matches!(err, Error::InvalidCredentials { .. }));
    assert_eq!(session.state(), SessionState::Idle);
}

// ── Publish ─────────────────────────────────────────────────────────

#[tokio::test]
async fn publish_reaches_the_broker() {
    let broker = ScriptedBroker::start(Script::Steady).await;
    let session = MqttSession::new(broker.transport(), topics(), SessionHandlers::noop());
    assert!(session.connect().await.unwrap());

    assert!(session.publish("vakio/gate", "2").await);

    wait_until(&broker.log, |log| log.iter().any(|l| l.starts_with("PUB"))).await;
    assert_eq!(broker.count("PUB vakio/gate=2"), 1);

    session.disconnect().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_publishes_all_go_out_once() {
    let broker = ScriptedBroker::start(Script::Steady).await;
    let session = Arc::new(MqttSession::new(
        broker.transport(),
        topics(),
        SessionHandlers::noop(),
    ));
    assert!(session.connect().await.unwrap());

    let publishes: Vec<_> = (1..=4)
        .map(|g| {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.publish("vakio/gate", &g.to_string()).await })
        })
        .collect();
    for publish in publishes {
        assert!(publish.await.unwrap());
    }

    wait_until(&broker.log, |log| {
        log.iter().filter(|l| l.starts_with("PUB")).count() == 4
    })
    .await;
    for g in 1..=4 {
        assert_eq!(broker.count(&format!("PUB vakio/gate={g}")), 1);
    }

    session.disconnect().await;
}

#[tokio::test]
async fn publish_after_disconnect_fails_fast() {
    let broker = ScriptedBroker::start(Script::Steady).await;
    let session = MqttSession::new(broker.transport(), topics(), SessionHandlers::noop());
    assert!(session.connect().await.unwrap());

    session.disconnect().await;
    assert_eq!(session.state(), SessionState::Closed);

    let published = tokio::time::timeout(
        Duration::from_millis(100),
        session.publish("vakio/gate", "2"),
    )
    .await
    .expect("publish must not wait on a closed session");
    assert!(!published);
    assert_eq!(broker.count("PUB vakio/gate=2"), 0);
}

#[tokio::test]
async fn publish_after_failed_connect_fails_cleanly() {
    let session = MqttSession::new(closed_port_transport(), topics(), SessionHandlers::noop());
    let _ = session.connect().await;

    let published = tokio::time::timeout(Duration::from_secs(1), session.publish("vakio/gate", "2"))
        .await
        .expect("publish must not hang");
    assert!(!published);
}

// ── Reconnect / disconnect ──────────────────────────────────────────

#[tokio::test]
async fn lost_connection_is_reestablished_once() {
    let broker = ScriptedBroker::start(Script::DropFirstSession).await;
    let (handlers, _, connects) = recording_handlers();
    let session = MqttSession::new(broker.transport(), topics(), handlers);
    assert!(session.connect().await.unwrap());

    wait_until(&broker.log, |log| {
        log.iter().filter(|l| *l == "SUB vakio/endpoint q0").count() == 2
    })
    .await;
    assert_eq!(broker.count("CONNECT#2"), 1);
    assert_eq!(broker.count("SUB vakio/speed q0"), 2);
    assert_eq!(connects.load(Ordering::SeqCst), 2);
    assert_eq!(session.state(), SessionState::Connected);

    assert!(session.publish("vakio/state", "on").await);
    wait_until(&broker.log, |log| log.iter().any(|l| l == "PUB vakio/state=on")).await;

    session.disconnect().await;
}

#[tokio::test]
async fn shutdown_from_a_callback_closes_the_session() {
    let broker = ScriptedBroker::start(Script::Steady).await;
    let cell: Arc<OnceLock<Weak<MqttSession>>> = Arc::default();
    let handle = Arc::clone(&cell);
    let handlers = SessionHandlers {
        on_message: Arc::new(move |_, _| {
            if let Some(session) = handle.get().and_then(Weak::upgrade) {
                session.shutdown();
            }
        }),
        on_connect: Arc::new(|| {}),
    };
    let session = Arc::new(MqttSession::new(broker.transport(), topics(), handlers));
    cell.set(Arc::downgrade(&session)).unwrap();

    assert!(session.connect().await.unwrap());

    let mut state = session.subscribe_state();
    tokio::time::timeout(
        Duration::from_secs(3),
        state.wait_for(|s| *s == SessionState::Closed),
    )
    .await
    .expect("the pushed message shuts the session down")
    .unwrap();

    tokio::time::timeout(Duration::from_secs(3), session.disconnect())
        .await
        .expect("disconnect completes after an in-callback shutdown");
    assert!(!session.is_connected());
}

#[tokio::test]
async fn disconnect_after_failed_connect_is_safe() {
    let session = MqttSession::new(closed_port_transport(), topics(), SessionHandlers::noop());
    let _ = session.connect().await;

    session.disconnect().await;
    session.disconnect().await;
    assert!(!session.is_connected());
}
