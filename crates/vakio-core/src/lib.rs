//! Device state mirror and command reconciliation for Vakio ventilation
//! devices reached through an MQTT broker.
//!
//! - **[`Coordinator`]**: one per device. [`login()`](Coordinator::login)
//!   connects the broker link and spawns the command processor; typed
//!   getters read the [`DeviceStore`], setters flow through a serialized
//!   command queue. [`Coordinator::oneshot()`] wraps a single CLI action.
//!
//! - **[`DeviceStore`]**: last-known raw value of every attribute,
//!   written only by inbound telemetry and observable through
//!   [`ConditionStream`].
//!
//! - **[`reconcile`]**: pure mapping between device attributes and the
//!   percentage / preset / on-off view, plus the ordered writes each UI
//!   command turns into.
//!
//! - **[`entity`]**: [`FanEntity`] and [`AttributeSensor`], the
//!   host-facing views that re-render only on change.

pub mod command;
pub mod config;
pub mod coordinator;
pub mod entity;
pub mod error;
pub mod link;
pub mod model;
pub mod reconcile;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::{Command, CommandResult};
pub use config::{BrokerCredentials, DeviceConfig};
pub use coordinator::{ConnectionState, Coordinator};
pub use entity::{AttributeSensor, Entity, EntityKind, EntityState, FanEntity, Feature};
pub use error::CoreError;
pub use link::BrokerLink;
pub use reconcile::FanSnapshot;
pub use store::{DeviceCondition, DeviceStore};
pub use stream::ConditionStream;

pub use model::{
    AttributeValue, DeviceAttribute, GatePosition, PowerState, Preset, SpeedOrdinal, Workmode,
};
