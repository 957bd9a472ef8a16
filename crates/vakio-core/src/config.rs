// ── Runtime device configuration ──
//
// Describes *how* to reach one device through its broker. Carries
// credential data and connection tuning, but never touches disk.
// The CLI (via vakio-config) constructs a `DeviceConfig` and hands it in.

use std::time::Duration;

use secrecy::SecretString;
use vakio_api::{Credentials, TransportConfig};

pub const DEFAULT_PORT: u16 = 1883;
pub const DEFAULT_TOPIC: &str = "vakio";

/// Broker login for a device.
#[derive(Debug, Clone)]
pub struct BrokerCredentials {
    pub username: String,
    pub password: Option<SecretString>,
}

/// Configuration for one device behind one broker.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub host: String,
    pub port: u16,
    pub credentials: Option<BrokerCredentials>,
    /// Topic prefix the device publishes under.
    pub topic: String,
    pub keep_alive: Duration,
    /// Bound on connect and on each publish.
    pub timeout: Duration,
    /// Interval of the coordinator refresh hook. Zero disables it.
    pub refresh_interval: Duration,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: DEFAULT_PORT,
            credentials: None,
            topic: DEFAULT_TOPIC.into(),
            keep_alive: Duration::from_secs(60),
            timeout: Duration::from_secs(5),
            refresh_interval: Duration::from_secs(1),
        }
    }
}

impl DeviceConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Translate into the transport-level session configuration.
    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            host: self.host.clone(),
            port: self.port,
            credentials: self.credentials.as_ref().map(|c| Credentials {
                username: c.username.clone(),
                password: c.password.clone(),
            }),
            keep_alive: self.keep_alive,
            connect_timeout: self.timeout,
            publish_timeout: self.timeout,
            ..TransportConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_device_factory_settings() {
        let cfg = DeviceConfig::default();
        assert_eq!(cfg.port, 1883);
        assert_eq!(cfg.topic, "vakio");
        assert!(cfg.credentials.is_none());
    }

    #[test]
    fn transport_carries_timeouts_and_credentials() {
        let cfg = DeviceConfig {
            credentials: Some(BrokerCredentials {
                username: "hass".into(),
                password: Some(SecretString::from("pw".to_string())),
            }),
            timeout: Duration::from_secs(9),
            ..DeviceConfig::new("10.0.0.2")
        };

        let transport = cfg.transport();
        assert_eq!(transport.address(), "10.0.0.2:1883");
        assert_eq!(transport.connect_timeout, Duration::from_secs(9));
        assert_eq!(transport.publish_timeout, Duration::from_secs(9));
        assert_eq!(
            transport.credentials.map(|c| c.username).as_deref(),
            Some("hass")
        );
    }
}
