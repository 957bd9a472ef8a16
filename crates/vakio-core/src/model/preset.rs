use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use super::GatePosition;
use crate::error::CoreError;

const SUPER_AUTO_LABEL: &str = "Super Auto";

/// User-facing preset summarising gate and workmode.
///
/// Derived from telemetry on every read, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Preset {
    /// `Gate 1` .. `Gate 4`: manual mode at that damper position.
    Gate(GatePosition),
    /// `Super Auto`: the device manages gate and speed itself.
    SuperAuto,
}

impl Preset {
    /// Every selectable preset, in display order.
    pub const ALL: [Self; 5] = [
        Self::Gate(GatePosition::ALL[0]),
        Self::Gate(GatePosition::ALL[1]),
        Self::Gate(GatePosition::ALL[2]),
        Self::Gate(GatePosition::ALL[3]),
        Self::SuperAuto,
    ];

    pub fn labels() -> Vec<String> {
        Self::ALL.iter().map(ToString::to_string).collect()
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gate(g) => write!(f, "Gate {g}"),
            Self::SuperAuto => f.write_str(SUPER_AUTO_LABEL),
        }
    }
}

impl FromStr for Preset {
    type Err = CoreError;

    fn from_str(label: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.to_string() == label)
            .ok_or_else(|| {
                CoreError::invalid(
                    "preset",
                    format!(
                        "unknown preset '{label}', expected one of: {}",
                        Self::labels().join(", ")
                    ),
                )
            })
    }
}

impl Serialize for Preset {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
