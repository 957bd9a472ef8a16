// vakio-api: MQTT session plumbing for Vakio ventilation devices

pub mod error;
pub mod session;
pub mod transport;

pub use error::Error;
pub use session::{MqttSession, SessionHandlers, SessionState};
pub use transport::{Credentials, TransportConfig};
