// ── Device state store ──
//
// Fixed per-attribute record plus push-based change notification.

mod condition;
mod device_store;

pub use condition::{DeviceCondition, Telemetry};
pub use device_store::DeviceStore;
