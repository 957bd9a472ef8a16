// ── Core error types ──
//
// User-facing errors from vakio-core. Consumers never see MQTT client
// errors directly; the `From<vakio_api::Error>` impl translates them.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to broker at {address}: {reason}")]
    ConnectionFailed { address: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Device disconnected")]
    Disconnected,

    #[error("Broker connection timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Argument errors ──────────────────────────────────────────────
    #[error("Invalid {field}: {reason}")]
    InvalidArgument { field: String, reason: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub(crate) fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<vakio_api::Error> for CoreError {
    fn from(err: vakio_api::Error) -> Self {
        match err {
            vakio_api::Error::InvalidCredentials { reason } => CoreError::Config {
                message: format!("Invalid credentials: {reason}"),
            },
            vakio_api::Error::InvalidOptions { field, reason } => CoreError::Config {
                message: format!("Invalid {field}: {reason}"),
            },
            vakio_api::Error::Unreachable { address, reason } => {
                CoreError::ConnectionFailed { address, reason }
            }
            vakio_api::Error::Refused { reason } => CoreError::AuthenticationFailed {
                message: format!("broker refused the connection ({reason})"),
            },
            vakio_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            vakio_api::Error::Client(e) => CoreError::Internal(format!("MQTT client: {e}")),
        }
    }
}
