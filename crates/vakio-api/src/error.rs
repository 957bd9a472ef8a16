use thiserror::Error;

/// Top-level error type for the `vakio-api` crate.
///
/// Configuration variants are programming errors and are returned as `Err`
/// from [`MqttSession::connect`](crate::MqttSession::connect). Transport
/// variants describe why a connect attempt came back `false`; they are
/// kept on the session and surfaced through
/// [`take_failure`](crate::MqttSession::take_failure).
#[derive(Debug, Error)]
pub enum Error {
    // ── Configuration ───────────────────────────────────────────────
    /// Credentials object is malformed (e.g. a username without a password).
    #[error("Invalid credentials: {reason}")]
    InvalidCredentials { reason: String },

    /// Transport option outside what the MQTT client accepts.
    #[error("Invalid {field}: {reason}")]
    InvalidOptions { field: &'static str, reason: String },

    // ── Transport ───────────────────────────────────────────────────
    /// Broker could not be reached (DNS failure, refused socket, I/O error).
    #[error("Cannot reach broker at {address}: {reason}")]
    Unreachable { address: String, reason: String },

    /// Broker answered the CONNECT with a non-success return code.
    #[error("Broker refused the connection: {reason}")]
    Refused { reason: String },

    /// No CONNACK within the configured connect timeout.
    #[error("Broker did not acknowledge the connection within {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// Request could not be queued on the client.
    #[error("MQTT client request failed: {0}")]
    Client(#[from] rumqttc::ClientError),
}

impl Error {
    /// Returns `true` if the broker rejected the supplied credentials.
    pub fn is_auth_rejected(&self) -> bool {
        matches!(self, Self::Refused { .. })
    }

    /// Returns `true` if a later attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unreachable { .. } | Self::Timeout { .. })
    }

    /// Returns `true` for errors caused by the caller's configuration.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidCredentials { .. } | Self::InvalidOptions { .. }
        )
    }
}
