// ── Device state store ──
//
// Holds the last-known raw value of every attribute. Written only from the
// session's message callback; readers take cheap snapshots or subscribe
// for change notification.

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use super::condition::{DeviceCondition, Telemetry};
use crate::model::DeviceAttribute;
use crate::stream::ConditionStream;

pub struct DeviceStore {
    prefix: String,
    condition: watch::Sender<DeviceCondition>,
    last_refresh: watch::Sender<Option<DateTime<Utc>>>,
}

impl DeviceStore {
    /// Create an empty store for devices publishing under `prefix`.
    pub fn new(prefix: impl Into<String>) -> Self {
        let (condition, _) = watch::channel(DeviceCondition::default());
        let (last_refresh, _) = watch::channel(None);
        Self {
            prefix: prefix.into(),
            condition,
            last_refresh,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The four topics this store is fed from.
    pub fn topics(&self) -> Vec<String> {
        DeviceAttribute::ALL
            .iter()
            .map(|a| a.topic(&self.prefix))
            .collect()
    }

    // ── Writes ───────────────────────────────────────────────────────

    /// Overwrite one attribute unconditionally.
    pub fn update(&self, attribute: DeviceAttribute, raw: impl Into<String>) {
        let telemetry = Telemetry {
            raw: raw.into(),
            received_at: Utc::now(),
        };
        tracing::trace!(%attribute, raw = %telemetry.raw, "telemetry");
        self.condition
            .send_modify(|cond| cond.set(attribute, telemetry));
    }

    /// Route one inbound message to its attribute.
    ///
    /// Returns the attribute updated, or `None` when the topic is not one
    /// of the four device endpoints under this store's prefix.
    pub fn apply_message(&self, topic: &str, payload: &[u8]) -> Option<DeviceAttribute> {
        let endpoint = topic
            .strip_prefix(self.prefix.as_str())
            .and_then(|rest| rest.strip_prefix('/'))?;
        let Some(attribute) = DeviceAttribute::from_endpoint(endpoint) else {
            tracing::debug!(topic, "ignoring message on unknown endpoint");
            return None;
        };

        let raw = String::from_utf8_lossy(payload).trim().to_string();
        self.update(attribute, raw);
        Some(attribute)
    }

    /// Record that the periodic refresh hook ran.
    pub fn mark_refreshed(&self) {
        self.last_refresh.send_replace(Some(Utc::now()));
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub fn read(&self, attribute: DeviceAttribute) -> Option<String> {
        self.condition.borrow().raw(attribute).map(str::to_owned)
    }

    pub fn snapshot(&self) -> DeviceCondition {
        self.condition.borrow().clone()
    }

    /// Run `f` against the current condition without cloning it.
    pub fn with_condition<T>(&self, f: impl FnOnce(&DeviceCondition) -> T) -> T {
        f(&self.condition.borrow())
    }

    pub fn subscribe(&self) -> ConditionStream {
        ConditionStream::new(self.condition.subscribe())
    }

    // ── Metadata ─────────────────────────────────────────────────────

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.condition.borrow().last_update()
    }

    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        *self.last_refresh.borrow()
    }

    /// How long ago any telemetry arrived, or `None` if none has.
    pub fn data_age(&self) -> Option<chrono::Duration> {
        self.last_update().map(|t| Utc::now() - t)
    }
}

impl Default for DeviceStore {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_TOPIC)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn apply_message_routes_by_endpoint() {
        let store = DeviceStore::new("vakio");

        assert_eq!(
            store.apply_message("vakio/state", b"on"),
            Some(DeviceAttribute::Power)
        );
        assert_eq!(
            store.apply_message("vakio/endpoint", b"super_auto\n"),
            Some(DeviceAttribute::Workmode)
        );

        assert_eq!(store.read(DeviceAttribute::Power).as_deref(), Some("on"));
        assert_eq!(
            store.read(DeviceAttribute::Workmode).as_deref(),
            Some("super_auto")
        );
    }

    #[test]
    fn apply_message_ignores_foreign_topics() {
        let store = DeviceStore::new("vakio");

        assert_eq!(store.apply_message("other/speed", b"3"), None);
        assert_eq!(store.apply_message("vakio/temp", b"21"), None);
        assert_eq!(store.apply_message("vakiospeed", b"3"), None);
        assert_eq!(store.apply_message("vakio/speed/extra", b"3"), None);
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn nested_prefix_is_supported() {
        let store = DeviceStore::new("home/openair");
        assert_eq!(
            store.topics(),
            [
                "home/openair/speed",
                "home/openair/gate",
                "home/openair/state",
                "home/openair/endpoint"
            ]
        );
        assert_eq!(
            store.apply_message("home/openair/gate", b"4"),
            Some(DeviceAttribute::Gate)
        );
    }

    #[test]
    fn last_write_wins() {
        let store = DeviceStore::new("vakio");
        store.update(DeviceAttribute::Speed, "2");
        store.update(DeviceAttribute::Speed, "5");
        assert_eq!(store.read(DeviceAttribute::Speed).as_deref(), Some("5"));
        assert!(store.data_age().is_some());
    }

    #[tokio::test]
    async fn subscribers_see_updates() {
        let store = DeviceStore::new("vakio");
        let mut stream = store.subscribe();

        store.update(DeviceAttribute::Gate, "1");

        let cond = stream.changed().await.expect("store alive");
        assert_eq!(cond.raw(DeviceAttribute::Gate), Some("1"));
    }
}
