// ── Broker link seam ──
//
// The coordinator talks to the broker only through `BrokerLink`, so the
// MQTT session can be swapped for an in-memory link in tests.

use async_trait::async_trait;
use tokio::sync::watch;
use vakio_api::{MqttSession, SessionState};

/// Minimal broker surface the coordinator needs.
#[async_trait]
pub trait BrokerLink: Send + Sync {
    /// Establish the connection. `Ok(false)` is a recoverable failure whose
    /// reason is available from [`take_failure`](Self::take_failure).
    async fn connect(&self) -> Result<bool, vakio_api::Error>;

    /// Tear the connection down. Safe to call at any time.
    async fn disconnect(&self);

    /// Fire one message. `false` if it could not be sent.
    async fn publish(&self, topic: &str, payload: &str) -> bool;

    /// Reason for the last `Ok(false)` from `connect`, if any.
    fn take_failure(&self) -> Option<vakio_api::Error> {
        None
    }

    /// Lifecycle updates for links that can drop on their own. `None` for
    /// links that stay up until `disconnect`.
    fn subscribe_state(&self) -> Option<watch::Receiver<SessionState>> {
        None
    }
}

#[async_trait]
impl BrokerLink for MqttSession {
    async fn connect(&self) -> Result<bool, vakio_api::Error> {
        MqttSession::connect(self).await
    }

    async fn disconnect(&self) {
        MqttSession::disconnect(self).await;
    }

    async fn publish(&self, topic: &str, payload: &str) -> bool {
        MqttSession::publish(self, topic, payload).await
    }

    fn take_failure(&self) -> Option<vakio_api::Error> {
        MqttSession::take_failure(self)
    }

    fn subscribe_state(&self) -> Option<watch::Receiver<SessionState>> {
        Some(MqttSession::subscribe_state(self))
    }
}
