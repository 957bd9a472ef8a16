//! Config subcommand handlers.

use std::fmt::Write as _;

use dialoguer::{Input, Select};
use secrecy::SecretString;

use vakio_core::{BrokerCredentials, Coordinator};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, InitArgs};
use crate::config::{self, Config, DeviceProfile};
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

/// Config with every stored secret replaced by `****`.
fn redacted(cfg: &Config) -> Config {
    let mut cfg = cfg.clone();
    for profile in cfg.devices.values_mut() {
        if profile.password.is_some() {
            profile.password = Some("****".into());
        }
    }
    cfg
}

/// TOML-ish view of the config with secrets masked.
fn format_config_redacted(cfg: &Config) -> String {
    let mut out = String::new();
    if let Some(ref name) = cfg.default_device {
        let _ = writeln!(out, "default_device = \"{name}\"\n");
    }
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "color = \"{}\"", cfg.defaults.color);
    let _ = writeln!(out, "timeout = {}", cfg.defaults.timeout);
    let _ = writeln!(out, "refresh_interval = {}", cfg.defaults.refresh_interval);
    let _ = writeln!(out, "sensor_interval = {}", cfg.defaults.sensor_interval);

    let mut names: Vec<_> = cfg.devices.keys().collect();
    names.sort();
    for name in names {
        let p = &cfg.devices[name];
        let _ = writeln!(out);
        let _ = writeln!(out, "[devices.{name}]");
        let _ = writeln!(out, "host = \"{}\"", p.host);
        let _ = writeln!(out, "port = {}", p.port);
        let _ = writeln!(out, "topic = \"{}\"", p.topic);
        if let Some(ref u) = p.username {
            let _ = writeln!(out, "username = \"{u}\"");
        }
        if p.password.is_some() {
            let _ = writeln!(out, "password = \"****\"");
        }
        if let Some(ref env) = p.password_env {
            let _ = writeln!(out, "password_env = \"{env}\"");
        }
        if let Some(keep_alive) = p.keep_alive {
            let _ = writeln!(out, "keep_alive = {keep_alive}");
        }
        if let Some(timeout) = p.timeout {
            let _ = writeln!(out, "timeout = {timeout}");
        }
    }

    out.trim_end().to_owned()
}

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

/// Where the wizard puts the broker password.
enum PasswordStorage {
    Keyring,
    Plaintext,
    EnvVar(String),
}

fn prompt_password_storage() -> Result<PasswordStorage, CliError> {
    let choices = &[
        "Store in system keyring (recommended)",
        "Save to config file (plaintext)",
        "Read from an environment variable",
    ];
    let selection = Select::new()
        .with_prompt("Where to store the password?")
        .items(choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    Ok(match selection {
        0 => PasswordStorage::Keyring,
        1 => PasswordStorage::Plaintext,
        _ => {
            let var: String = Input::new()
                .with_prompt("Environment variable name")
                .default(vakio_config::PASSWORD_ENV.into())
                .interact_text()
                .map_err(prompt_err)?;
            PasswordStorage::EnvVar(var)
        }
    })
}

fn prompt_secret(prompt: &str) -> Result<String, CliError> {
    let secret = rpassword::prompt_password(prompt).map_err(prompt_err)?;
    if secret.is_empty() {
        return Err(CliError::Validation {
            field: "password".into(),
            reason: "password cannot be empty".into(),
        });
    }
    Ok(secret)
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init(init) => handle_init(init, global).await,

        ConfigCommand::Show => {
            let cfg = redacted(&config::load_config_or_default());
            let out = output::render_single(&global.output, &cfg, format_config_redacted, |c| {
                let mut names: Vec<_> = c.devices.keys().cloned().collect();
                names.sort();
                names.join("\n")
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), false);
            Ok(())
        }

        ConfigCommand::SetPassword => {
            let cfg = config::load_config_or_default();
            let name = config::active_device_name(global, &cfg);
            if !cfg.devices.contains_key(&name) {
                return Err(CliError::DeviceNotFound {
                    available: config::available_devices(&cfg),
                    name,
                });
            }

            let password = prompt_secret(&format!("Broker password for '{name}': "))?;
            vakio_config::store_password(&name, &SecretString::from(password))?;

            let color = output::should_color(&global.color);
            eprintln!(
                "{} Password for '{name}' stored in system keyring",
                output::check_mark(color)
            );
            Ok(())
        }
    }
}

async fn handle_init(args: InitArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let config_path = config::config_path();
    let color = output::should_color(&global.color);
    eprintln!("Vakio: configuration wizard");
    eprintln!("   Config path: {}\n", config_path.display());

    // 1. Device name
    let name: String = Input::new()
        .with_prompt("Device name")
        .default(config::active_device_name(global, &Config::default()))
        .interact_text()
        .map_err(prompt_err)?;

    // 2. Broker
    let host: String = Input::new()
        .with_prompt("Broker host")
        .with_initial_text(global.host.clone().unwrap_or_default())
        .validate_with(|h: &String| {
            if h.trim().is_empty() {
                Err("host cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()
        .map_err(prompt_err)?;

    let port: u16 = Input::new()
        .with_prompt("Broker port")
        .default(global.port.unwrap_or(vakio_core::config::DEFAULT_PORT))
        .interact_text()
        .map_err(prompt_err)?;

    let topic: String = Input::new()
        .with_prompt("Device topic prefix")
        .default(
            global
                .topic
                .clone()
                .unwrap_or_else(|| vakio_core::config::DEFAULT_TOPIC.into()),
        )
        .validate_with(|t: &String| vakio_config::validate_topic(t).map_err(|e| e.to_string()))
        .interact_text()
        .map_err(prompt_err)?;

    // 3. Credentials (optional)
    let username: String = Input::new()
        .with_prompt("Broker username (empty for anonymous)")
        .allow_empty(true)
        .interact_text()
        .map_err(prompt_err)?;

    let mut profile = DeviceProfile {
        port,
        topic,
        ..DeviceProfile::new(host)
    };
    let password = if username.trim().is_empty() {
        None
    } else {
        profile.username = Some(username.trim().to_owned());
        Some(prompt_secret("Broker password: ")?)
    };
    profile.validate()?;

    // 4. Validate against the broker before anything is stored
    if !args.no_check {
        let credentials = profile.username.clone().map(|username| BrokerCredentials {
            username,
            password: password.clone().map(SecretString::from),
        });
        let cfg = config::load_config_or_default();
        let device_config = vakio_config::build_device_config(&profile, &cfg.defaults, credentials);
        eprintln!("   Checking {} ...", device_config.address());
        Coordinator::probe(&device_config)
            .await
            .map_err(|e| CliError::from(e).for_device(&name))?;
        eprintln!("   {} Broker accepted the connection", output::check_mark(color));
    }

    // 5. Password storage
    if let Some(password) = password {
        match prompt_password_storage()? {
            PasswordStorage::Keyring => {
                vakio_config::store_password(&name, &SecretString::from(password))?;
                eprintln!("   {} Password stored in system keyring", output::check_mark(color));
            }
            PasswordStorage::Plaintext => profile.password = Some(password),
            PasswordStorage::EnvVar(var) => {
                eprintln!("   Remember to export {var} before running vakio");
                profile.password_env = Some(var);
            }
        }
    }

    // 6. Merge into the existing config and write it
    let mut cfg = config::load_config_or_default();
    let make_default = cfg.devices.is_empty()
        || cfg
            .default_device
            .as_ref()
            .is_none_or(|d| !cfg.devices.contains_key(d));
    cfg.devices.insert(name.clone(), profile);
    if make_default {
        cfg.default_device = Some(name.clone());
    }
    let path = config::save_config(&cfg)?;

    eprintln!("\n{} Configuration written to {}", output::check_mark(color), path.display());
    eprintln!("  Device: {name}");
    eprintln!("\n  Try it: vakio status --device {name}");
    Ok(())
}
