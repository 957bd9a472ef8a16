// Broker transport configuration.
//
// Everything needed to build `rumqttc::MqttOptions` for one session. Option
// validation happens here so malformed input fails before any socket work.

use std::time::Duration;

use rumqttc::MqttOptions;
use secrecy::{ExposeSecret, SecretString};

use crate::error::Error;

/// Smallest keep-alive the client accepts (zero disables keep-alive).
const MIN_KEEP_ALIVE: Duration = Duration::from_secs(5);

/// Broker login.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: Option<SecretString>,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: Some(SecretString::from(password.into())),
        }
    }
}

/// Connection parameters for a single broker session.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub host: String,
    pub port: u16,
    pub credentials: Option<Credentials>,
    pub keep_alive: Duration,
    /// How long `connect` waits for the CONNACK.
    pub connect_timeout: Duration,
    /// How long `publish` waits for the packet to leave the client.
    pub publish_timeout: Duration,
    /// Capacity of the client → event loop request channel.
    pub request_capacity: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 1883,
            credentials: None,
            keep_alive: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(5),
            publish_timeout: Duration::from_secs(5),
            request_capacity: 10,
        }
    }
}

impl TransportConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// `host:port`, for logs and error messages.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Build the client options for one connection attempt.
    pub fn mqtt_options(&self, client_id: &str) -> Result<MqttOptions, Error> {
        if self.host.trim().is_empty() {
            return Err(Error::InvalidOptions {
                field: "host",
                reason: "host cannot be empty".into(),
            });
        }
        if self.port == 0 {
            return Err(Error::InvalidOptions {
                field: "port",
                reason: "port must be between 1 and 65535".into(),
            });
        }
        if !self.keep_alive.is_zero() && self.keep_alive < MIN_KEEP_ALIVE {
            return Err(Error::InvalidOptions {
                field: "keep_alive",
                reason: format!(
                    "must be 0 or at least {}s, got {:?}",
                    MIN_KEEP_ALIVE.as_secs(),
                    self.keep_alive
                ),
            });
        }
        if self.request_capacity == 0 {
            return Err(Error::InvalidOptions {
                field: "request_capacity",
                reason: "must be at least 1".into(),
            });
        }

        let mut options = MqttOptions::new(client_id, self.host.trim(), self.port);
        options.set_keep_alive(self.keep_alive);
        options.set_clean_session(true);

        if let Some(ref creds) = self.credentials {
            let (username, password) = validate_credentials(creds)?;
            options.set_credentials(username, password);
        }

        Ok(options)
    }
}

fn validate_credentials(creds: &Credentials) -> Result<(&str, &str), Error> {
    if creds.username.is_empty() {
        return Err(Error::InvalidCredentials {
            reason: "username cannot be empty".into(),
        });
    }
    let Some(ref password) = creds.password else {
        return Err(Error::InvalidCredentials {
            reason: format!("no password supplied for user '{}'", creds.username),
        });
    };
    Ok((creds.username.as_str(), password.expose_secret()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_targets_local_broker() {
        let cfg = TransportConfig::default();
        assert_eq!(cfg.address(), "localhost:1883");
        assert!(cfg.credentials.is_none());
        assert_eq!(cfg.connect_timeout, Duration::from_secs(5));
    }

    #[test]
    fn options_carry_credentials() {
        let cfg = TransportConfig::new("broker.lan", 1884)
            .with_credentials(Credentials::new("vakio", "secret"));
        let opts = cfg.mqtt_options("vakio-test").expect("valid options");

        assert_eq!(opts.broker_address(), ("broker.lan".to_string(), 1884));
        assert_eq!(
            opts.credentials(),
            Some(("vakio".to_string(), "secret".to_string()))
        );
    }

    #[test]
    fn username_without_password_is_rejected() {
        let cfg = TransportConfig::new("broker.lan", 1883).with_credentials(Credentials {
            username: "vakio".into(),
            password: None,
        });
        let err = cfg.mqtt_options("vakio-test").unwrap_err();
        assert!(matches!(err, Error::InvalidCredentials { .. }));
        assert!(err.is_configuration());
    }

    #[test]
    fn empty_host_is_rejected() {
        let cfg = TransportConfig::new("  ", 1883);
        let err = cfg.mqtt_options("vakio-test").unwrap_err();
        assert!(matches!(err, Error::InvalidOptions { field: "host", .. }));
    }

    #[test]
    fn sub_second_keep_alive_is_rejected() {
        let cfg = TransportConfig {
            keep_alive: Duration::from_millis(500),
            ..TransportConfig::default()
        };
        assert!(cfg.mqtt_options("vakio-test").is_err());
    }
}
