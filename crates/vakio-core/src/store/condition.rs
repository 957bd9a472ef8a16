use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::model::{DeviceAttribute, GatePosition, PowerState, SpeedOrdinal, Workmode};

/// One observed raw value and when it arrived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Telemetry {
    pub raw: String,
    pub received_at: DateTime<Utc>,
}

/// Last-known raw value of every attribute.
///
/// A fixed record with one slot per [`DeviceAttribute`]; an empty slot
/// means no telemetry has arrived for that attribute yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceCondition {
    slots: [Option<Telemetry>; 4],
}

impl DeviceCondition {
    pub fn get(&self, attribute: DeviceAttribute) -> Option<&Telemetry> {
        self.slots[attribute.index()].as_ref()
    }

    pub fn raw(&self, attribute: DeviceAttribute) -> Option<&str> {
        self.get(attribute).map(|t| t.raw.as_str())
    }

    pub(crate) fn set(&mut self, attribute: DeviceAttribute, telemetry: Telemetry) {
        self.slots[attribute.index()] = Some(telemetry);
    }

    pub fn iter(&self) -> impl Iterator<Item = (DeviceAttribute, Option<&Telemetry>)> {
        DeviceAttribute::ALL.into_iter().map(|a| (a, self.get(a)))
    }

    /// `true` until the first message for any attribute arrives.
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// `true` once every attribute has reported at least once.
    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    /// Most recent reception time across all attributes.
    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.slots.iter().flatten().map(|t| t.received_at).max()
    }

    // ── Typed views ──────────────────────────────────────────────────

    pub fn speed(&self) -> Option<SpeedOrdinal> {
        self.raw(DeviceAttribute::Speed).and_then(SpeedOrdinal::parse)
    }

    pub fn gate(&self) -> Option<GatePosition> {
        self.raw(DeviceAttribute::Gate).and_then(GatePosition::parse)
    }

    pub fn power(&self) -> Option<PowerState> {
        self.raw(DeviceAttribute::Power).and_then(PowerState::parse)
    }

    pub fn workmode(&self) -> Option<Workmode> {
        self.raw(DeviceAttribute::Workmode).and_then(Workmode::parse)
    }
}

impl Serialize for DeviceCondition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.slots.len()))?;
        for (attribute, telemetry) in self.iter() {
            map.serialize_entry(&attribute, &telemetry.map(|t| t.raw.as_str()))?;
        }
        map.end()
    }
}
