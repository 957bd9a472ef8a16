// ── Entities ──
//
// Host-facing views of one device. Every entity of a device shares one
// `Coordinator`; entities hold only what they last rendered and re-derive
// everything else from the coordinator on each tick.

mod fan;
mod sensor;

use std::time::Duration;

use serde::Serialize;
use strum::Display;

use crate::model::DeviceAttribute;
use crate::reconcile::FanSnapshot;

pub use fan::FanEntity;
pub use sensor::AttributeSensor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntityKind {
    Fan,
    Sensor,
}

/// Capabilities a host may offer for an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Feature {
    SetSpeed,
    PresetMode,
    TurnOn,
    TurnOff,
}

/// Rendered state of one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityState {
    Fan(FanSnapshot),
    Sensor {
        attribute: DeviceAttribute,
        value: Option<String>,
    },
}

/// Identity shared by every entity kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityInfo {
    pub unique_id: String,
    pub name: String,
    pub kind: EntityKind,
    pub features: Vec<Feature>,
    #[serde(skip)]
    pub poll_interval: Duration,
}

pub trait Entity: Send {
    fn info(&self) -> &EntityInfo;

    /// Re-derive from the coordinator. `true` when the rendered state
    /// changed and the host should redraw.
    fn tick(&mut self) -> bool;

    /// What was rendered by the last tick.
    fn state(&self) -> EntityState;

    fn unique_id(&self) -> &str {
        &self.info().unique_id
    }

    fn name(&self) -> &str {
        &self.info().name
    }

    fn kind(&self) -> EntityKind {
        self.info().kind
    }

    fn features(&self) -> &[Feature] {
        &self.info().features
    }

    fn poll_interval(&self) -> Duration {
        self.info().poll_interval
    }
}
