//! CLI configuration: thin wrapper around `vakio_config` shared types.
//!
//! Re-exports the shared types and adds resolution that respects
//! `GlobalOpts` flag overrides (--host, --topic, --username, ...).

use std::time::Duration;

use secrecy::SecretString;

use vakio_core::{BrokerCredentials, DeviceConfig};

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use vakio_config::{
    Config, Defaults, DeviceProfile, config_path, load_config_or_default, save_config,
};

// ── CLI-specific helpers ────────────────────────────────────────────

/// Resolve the active device name from CLI flags and config.
pub fn active_device_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .device
        .clone()
        .or_else(|| config.default_device.clone())
        .unwrap_or_else(|| "default".into())
}

/// Build the `DeviceConfig` for this invocation.
///
/// Uses the active profile when one exists; otherwise `--host` alone is
/// enough for a one-off connection.
pub fn build_device_config(global: &GlobalOpts) -> Result<(String, DeviceConfig), CliError> {
    let cfg = load_config_or_default();
    let name = active_device_name(global, &cfg);

    let profile = match cfg.devices.get(&name) {
        Some(profile) => profile.clone(),
        None => match global.host.as_deref() {
            Some(host) => DeviceProfile::new(host),
            None if global.device.is_some() => {
                return Err(CliError::DeviceNotFound {
                    name,
                    available: available_devices(&cfg),
                });
            }
            None => {
                return Err(CliError::NoConfig {
                    path: config_path().display().to_string(),
                });
            }
        },
    };

    let device_config = resolve_profile(&profile, &name, &cfg.defaults, global)?;
    Ok((name, device_config))
}

/// Translate a `DeviceProfile` + global flags into a `DeviceConfig`.
///
/// Flag (or `VAKIO_*` env) values take priority over profile values.
pub fn resolve_profile(
    profile: &DeviceProfile,
    device: &str,
    defaults: &Defaults,
    global: &GlobalOpts,
) -> Result<DeviceConfig, CliError> {
    let profile = apply_overrides(profile, global);
    profile.validate()?;

    let credentials = match (&profile.username, &global.password) {
        (Some(username), Some(password)) => Some(BrokerCredentials {
            username: username.clone(),
            password: Some(SecretString::from(password.clone())),
        }),
        _ => vakio_config::resolve_credentials(&profile, device)?,
    };

    let mut device_config = vakio_config::build_device_config(&profile, defaults, credentials);
    if let Some(timeout) = global.timeout {
        device_config.timeout = Duration::from_secs(timeout);
    }
    Ok(device_config)
}

fn apply_overrides(profile: &DeviceProfile, global: &GlobalOpts) -> DeviceProfile {
    let mut profile = profile.clone();
    if let Some(ref host) = global.host {
        profile.host.clone_from(host);
    }
    if let Some(port) = global.port {
        profile.port = port;
    }
    if let Some(ref topic) = global.topic {
        profile.topic.clone_from(topic);
    }
    if let Some(ref username) = global.username {
        profile.username = Some(username.clone());
    }
    profile
}

pub fn available_devices(cfg: &Config) -> String {
    let mut names: Vec<_> = cfg.devices.keys().map(String::as_str).collect();
    if names.is_empty() {
        return "(none)".into();
    }
    names.sort_unstable();
    names.join(", ")
}
