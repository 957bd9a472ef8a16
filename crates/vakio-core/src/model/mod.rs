// ── Domain model ──
//
// Attribute names, typed attribute values, and the derived preset label.

mod attribute;
mod preset;
mod value;

pub use attribute::DeviceAttribute;
pub use preset::Preset;
pub use value::{AttributeValue, GatePosition, PowerState, SpeedOrdinal, Workmode};
