//! In-memory broker link shared by the coordinator and entity tests.
#![allow(clippy::unwrap_used, dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use vakio_api::SessionState;
use vakio_core::{BrokerLink, Coordinator, DeviceAttribute, DeviceConfig};

/// Records every publish instead of sending it.
pub struct FakeLink {
    state: watch::Sender<SessionState>,
    published: Mutex<Vec<(String, String)>>,
    connected: AtomicBool,
    refuse: AtomicBool,
    /// Topic whose publishes fail.
    failing_topic: Mutex<Option<String>>,
    publish_delay: Mutex<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Default for FakeLink {
    fn default() -> Self {
        Self {
            state: watch::channel(SessionState::Idle).0,
            published: Mutex::default(),
            connected: AtomicBool::default(),
            refuse: AtomicBool::default(),
            failing_topic: Mutex::default(),
            publish_delay: Mutex::default(),
            in_flight: AtomicUsize::default(),
            max_in_flight: AtomicUsize::default(),
        }
    }
}

impl FakeLink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn refusing() -> Arc<Self> {
        let link = Self::default();
        link.refuse.store(true, Ordering::SeqCst);
        Arc::new(link)
    }

    pub fn fail_topic(&self, topic: &str) {
        *self.failing_topic.lock().unwrap() = Some(topic.to_string());
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.publish_delay.lock().unwrap() = delay;
    }

    /// `(topic, payload)` pairs in publish order.
    pub fn published(&self) -> Vec<(String, String)> {
        self.published.lock().unwrap().clone()
    }

    /// Published messages rendered as `endpoint=payload`, prefix stripped.
    pub fn sent(&self) -> Vec<String> {
        self.published()
            .into_iter()
            .map(|(topic, payload)| {
                let endpoint = topic.rsplit('/').next().unwrap_or_default().to_string();
                format!("{endpoint}={payload}")
            })
            .collect()
    }

    pub fn clear(&self) {
        self.published.lock().unwrap().clear();
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// The broker goes away and the link gives up on it.
    pub fn drop_connection(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.state.send_replace(SessionState::Closed);
    }
}

#[async_trait]
impl BrokerLink for FakeLink {
    async fn connect(&self) -> Result<bool, vakio_api::Error> {
        if self.refuse.load(Ordering::SeqCst) {
            return Ok(false);
        }
        self.connected.store(true, Ordering::SeqCst);
        self.state.send_replace(SessionState::Connected);
        Ok(true)
    }

    async fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.state.send_replace(SessionState::Closed);
    }

    async fn publish(&self, topic: &str, payload: &str) -> bool {
        if !self.is_connected() {
            return false;
        }
        if self.failing_topic.lock().unwrap().as_deref() == Some(topic) {
            return false;
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = *self.publish_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.published
            .lock()
            .unwrap()
            .push((topic.to_string(), payload.to_string()));

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        true
    }

    fn take_failure(&self) -> Option<vakio_api::Error> {
        self.refuse.load(Ordering::SeqCst).then(|| vakio_api::Error::Refused {
            reason: "bad user name or password".into(),
        })
    }

    fn subscribe_state(&self) -> Option<watch::Receiver<SessionState>> {
        Some(self.state.subscribe())
    }
}

// ── Fixtures ────────────────────────────────────────────────────────

pub fn config() -> DeviceConfig {
    DeviceConfig {
        refresh_interval: Duration::ZERO,
        ..DeviceConfig::new("broker.test")
    }
}

/// A logged-in coordinator over a fresh fake link.
pub async fn connected() -> (Coordinator, Arc<FakeLink>) {
    let link = FakeLink::new();
    let coordinator = Coordinator::with_link(config(), link.clone());
    coordinator.login().await.unwrap();
    (coordinator, link)
}

/// Feed telemetry as if the device had published it.
pub fn report(coordinator: &Coordinator, attribute: DeviceAttribute, raw: &str) {
    let topic = attribute.topic(&coordinator.config().topic);
    coordinator.store().apply_message(&topic, raw.as_bytes());
}
