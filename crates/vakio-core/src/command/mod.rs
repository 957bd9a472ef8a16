// ── Command API ──
//
// All writes flow through a unified `Command` enum. The coordinator plans
// each variant into ordered attribute writes against the current condition
// and publishes them one at a time.

mod publisher;

use serde::Serialize;

use crate::error::CoreError;
use crate::model::{AttributeValue, DeviceAttribute, Preset};

pub use publisher::CommandPublisher;

/// A command envelope sent through the command channel.
/// Contains the command and a oneshot response channel.
pub(crate) struct CommandEnvelope {
    pub command: Command,
    pub response_tx: tokio::sync::oneshot::Sender<Result<CommandResult, CoreError>>,
}

/// All write operations against a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    // ── Plain attribute writes ───────────────────────────────────────
    /// Publish exactly one value, no reconciliation.
    Set(AttributeValue),

    // ── Reconciled operations ────────────────────────────────────────
    TurnOn,
    TurnOff,
    SetPercentage(u8),
    SetPreset(Preset),
}

/// Outcome of one command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum CommandResult {
    /// Every planned write was published.
    Sent { published: Vec<AttributeValue> },
    /// The device already reported the requested state; nothing was sent.
    Unchanged,
    /// Publishing `attribute` failed; `published` lists the writes that
    /// went out before it. The rest of the plan was abandoned.
    Failed {
        attribute: DeviceAttribute,
        published: Vec<AttributeValue>,
    },
}

impl CommandResult {
    /// `true` only when at least one write went out and none failed.
    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent { .. })
    }
}
