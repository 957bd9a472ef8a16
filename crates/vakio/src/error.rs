//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use vakio_config::ConfigError;
use vakio_core::{CoreError, DeviceAttribute};

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to broker at {address}")]
    #[diagnostic(
        code(vakio::connection_failed),
        help(
            "Check that the broker is running and reachable.\n\
             Address: {address}\n\
             Try: vakio check --host <broker> --port <port>"
        )
    )]
    ConnectionFailed {
        address: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Lost the broker connection")]
    #[diagnostic(
        code(vakio::disconnected),
        help("The command was not sent. Run it again once the broker is back.")
    )]
    Disconnected,

    // ── Authentication ───────────────────────────────────────────────
    #[error("Broker rejected the login for device '{device}'")]
    #[diagnostic(
        code(vakio::auth_failed),
        help(
            "{message}\n\
             Verify the username, or store a new password with:\n\
             vakio config set-password --device {device}"
        )
    )]
    AuthFailed { device: String, message: String },

    #[error("No password found for user '{username}' on device '{device}'")]
    #[diagnostic(
        code(vakio::no_credentials),
        help(
            "Store one with: vakio config set-password --device {device}\n\
             Or set the VAKIO_PASSWORD environment variable."
        )
    )]
    NoCredentials { device: String, username: String },

    // ── Commands ─────────────────────────────────────────────────────
    #[error("Publishing {attribute} failed")]
    #[diagnostic(
        code(vakio::publish_failed),
        help("Earlier writes of the same command were sent: {published}")
    )]
    PublishFailed {
        attribute: DeviceAttribute,
        published: String,
    },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(vakio::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Device '{name}' not found in configuration")]
    #[diagnostic(
        code(vakio::device_not_found),
        help(
            "Available devices: {available}\n\
             Create one with: vakio config init"
        )
    )]
    DeviceNotFound { name: String, available: String },

    #[error("No device configured")]
    #[diagnostic(
        code(vakio::no_config),
        help(
            "Create one with: vakio config init\n\
             Or pass --host for a one-off connection.\n\
             Expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(vakio::config))]
    Config(ConfigError),

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Broker did not answer within {seconds}s")]
    #[diagnostic(
        code(vakio::timeout),
        help("Increase the timeout with --timeout or check the broker address.")
    )]
    Timeout { seconds: u64 },

    // ── Internal ─────────────────────────────────────────────────────
    #[error("{0}")]
    #[diagnostic(code(vakio::internal))]
    Internal(String),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render output: {0}")]
    #[diagnostic(code(vakio::render))]
    Render(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::Disconnected => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }

    /// Attach the device name to errors that only know about the broker.
    pub fn for_device(self, device: &str) -> Self {
        match self {
            Self::AuthFailed { message, .. } => Self::AuthFailed {
                device: device.into(),
                message,
            },
            other => other,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { address, reason } => CliError::ConnectionFailed {
                address,
                source: reason.into(),
            },

            CoreError::AuthenticationFailed { message } => CliError::AuthFailed {
                device: "default".into(),
                message,
            },

            CoreError::Disconnected => CliError::Disconnected,

            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },

            CoreError::InvalidArgument { field, reason } => {
                CliError::Validation { field, reason }
            }

            CoreError::Config { message } => CliError::Validation {
                field: "connection".into(),
                reason: message,
            },

            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoCredentials { device, username } => {
                CliError::NoCredentials { device, username }
            }
            other => CliError::Config(other),
        }
    }
}
