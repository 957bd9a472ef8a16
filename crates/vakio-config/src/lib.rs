//! Shared configuration for the Vakio tools.
//!
//! TOML device profiles, credential resolution (env + keyring + plaintext),
//! and translation to `vakio_core::DeviceConfig`. The CLI layers its
//! `GlobalOpts` overrides on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use vakio_core::{BrokerCredentials, DeviceConfig};
use vakio_core::config::{DEFAULT_PORT, DEFAULT_TOPIC};

/// Keyring service name; entries are keyed `<device>/password`.
pub const KEYRING_SERVICE: &str = "vakio";

/// Environment variable consulted for the broker password.
pub const PASSWORD_ENV: &str = "VAKIO_PASSWORD";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no password found for user '{username}' on device '{device}'")]
    NoCredentials { device: String, username: String },

    #[error("unknown device '{device}'")]
    UnknownDevice { device: String },

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Device used when none is named on the command line.
    pub default_device: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named device profiles.
    #[serde(default)]
    pub devices: HashMap<String, DeviceProfile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_device: Some("default".into()),
            defaults: Defaults::default(),
            devices: HashMap::new(),
        }
    }
}

impl Config {
    /// Look up `name`, or the default device when `name` is `None`.
    pub fn device(&self, name: Option<&str>) -> Result<(&str, &DeviceProfile), ConfigError> {
        let name = name
            .or(self.default_device.as_deref())
            .unwrap_or("default");
        self.devices
            .get_key_value(name)
            .map(|(k, v)| (k.as_str(), v))
            .ok_or_else(|| ConfigError::UnknownDevice {
                device: name.into(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Connect and publish timeout, seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Coordinator refresh and fan tick, seconds.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: u64,

    /// Sensor tick, seconds.
    #[serde(default = "default_sensor_interval")]
    pub sensor_interval: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
            refresh_interval: default_refresh_interval(),
            sensor_interval: default_sensor_interval(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    5
}
fn default_refresh_interval() -> u64 {
    1
}
fn default_sensor_interval() -> u64 {
    30
}

/// One device behind one broker.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DeviceProfile {
    /// Broker host name or address.
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Topic prefix the device publishes under.
    #[serde(default = "default_topic")]
    pub topic: String,

    pub username: Option<String>,

    /// Broker password (plaintext; prefer keyring or env var).
    pub password: Option<String>,

    /// Environment variable name containing the password.
    pub password_env: Option<String>,

    /// Keep-alive override, seconds.
    pub keep_alive: Option<u64>,

    /// Timeout override, seconds.
    pub timeout: Option<u64>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_topic() -> String {
    DEFAULT_TOPIC.into()
}

impl DeviceProfile {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            topic: DEFAULT_TOPIC.into(),
            username: None,
            password: None,
            password_env: None,
            keep_alive: None,
            timeout: None,
        }
    }

    /// Check connection parameters before anything touches the network.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(invalid("host", "cannot be empty"));
        }
        if self.port == 0 {
            return Err(invalid("port", "must be between 1 and 65535"));
        }
        validate_topic(&self.topic)?;
        if self.username.as_deref().is_some_and(|u| u.trim().is_empty()) {
            return Err(invalid("username", "cannot be blank"));
        }
        Ok(())
    }
}

/// A topic prefix must be a literal: no wildcards, no trailing separator.
pub fn validate_topic(topic: &str) -> Result<(), ConfigError> {
    if topic.is_empty() {
        return Err(invalid("topic", "cannot be empty"));
    }
    if topic.contains(['+', '#']) {
        return Err(invalid(
            "topic",
            format!("'{topic}' contains an MQTT wildcard"),
        ));
    }
    if topic.ends_with('/') {
        return Err(invalid("topic", format!("'{topic}' ends with '/'")));
    }
    Ok(())
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "vakio", "vakio").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("vakio");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path`, then `VAKIO_CONFIG_`-prefixed environment variables
/// (`__` separates nesting, e.g. `VAKIO_CONFIG_DEFAULTS__TIMEOUT`).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("VAKIO_CONFIG_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

fn keyring_entry(device: &str) -> Result<keyring::Entry, ConfigError> {
    Ok(keyring::Entry::new(
        KEYRING_SERVICE,
        &format!("{device}/password"),
    )?)
}

/// Store the broker password for `device` in the system keyring.
pub fn store_password(device: &str, password: &SecretString) -> Result<(), ConfigError> {
    keyring_entry(device)?.set_password(password.expose_secret())?;
    Ok(())
}

/// Resolve broker credentials without CLI flags.
///
/// `None` when the profile names no user. Otherwise the password comes
/// from, in order: the profile's `password_env` variable, `VAKIO_PASSWORD`,
/// the system keyring, the plaintext `password` field.
pub fn resolve_credentials(
    profile: &DeviceProfile,
    device: &str,
) -> Result<Option<BrokerCredentials>, ConfigError> {
    resolve_credentials_with(
        profile,
        device,
        |name| std::env::var(name).ok(),
        |device| {
            keyring_entry(device)
                .ok()
                .and_then(|entry| entry.get_password().ok())
        },
    )
}

fn resolve_credentials_with(
    profile: &DeviceProfile,
    device: &str,
    env: impl Fn(&str) -> Option<String>,
    keyring: impl Fn(&str) -> Option<String>,
) -> Result<Option<BrokerCredentials>, ConfigError> {
    let Some(username) = profile.username.clone() else {
        return Ok(None);
    };

    let password = profile
        .password_env
        .as_deref()
        .and_then(&env)
        .or_else(|| env(PASSWORD_ENV))
        .or_else(|| keyring(device))
        .or_else(|| profile.password.clone())
        .ok_or_else(|| ConfigError::NoCredentials {
            device: device.into(),
            username: username.clone(),
        })?;

    Ok(Some(BrokerCredentials {
        username,
        password: Some(SecretString::from(password)),
    }))
}

/// Build a `DeviceConfig` from a profile, without CLI flag overrides.
pub fn profile_to_device_config(
    profile: &DeviceProfile,
    device: &str,
    defaults: &Defaults,
) -> Result<DeviceConfig, ConfigError> {
    profile.validate()?;
    let credentials = resolve_credentials(profile, device)?;
    Ok(build_device_config(profile, defaults, credentials))
}

/// Build a `DeviceConfig` from a profile and already-resolved credentials.
pub fn build_device_config(
    profile: &DeviceProfile,
    defaults: &Defaults,
    credentials: Option<BrokerCredentials>,
) -> DeviceConfig {
    let base = DeviceConfig::default();
    DeviceConfig {
        host: profile.host.trim().to_string(),
        port: profile.port,
        credentials,
        topic: profile.topic.clone(),
        keep_alive: profile
            .keep_alive
            .map_or(base.keep_alive, Duration::from_secs),
        timeout: Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout)),
        refresh_interval: Duration::from_secs(defaults.refresh_interval),
    }
}
