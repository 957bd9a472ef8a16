// ── Typed attribute values ──
//
// Parsing from raw telemetry never clamps: anything outside the valid
// range is `None`, which callers treat as "unknown".

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::DeviceAttribute;

// ── SpeedOrdinal ─────────────────────────────────────────────────────

/// Native fan speed index, 0 (fan off) through 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct SpeedOrdinal(u8);

impl SpeedOrdinal {
    pub const OFF: Self = Self(0);
    pub const MIN_RUNNING: Self = Self(1);
    /// Number of named running speeds.
    pub const COUNT: u8 = 5;

    pub const fn new(value: u8) -> Option<Self> {
        if value <= Self::COUNT {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        raw.trim().parse::<u8>().ok().and_then(Self::new)
    }

    pub const fn get(self) -> u8 {
        self.0
    }

    pub const fn is_running(self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for SpeedOrdinal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── GatePosition ─────────────────────────────────────────────────────

/// Intake damper position, 1 through 4. There is no closed position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct GatePosition(u8);

impl GatePosition {
    pub const COUNT: u8 = 4;
    pub const ALL: [Self; 4] = [Self(1), Self(2), Self(3), Self(4)];

    pub const fn new(value: u8) -> Option<Self> {
        if value >= 1 && value <= Self::COUNT {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        raw.trim().parse::<u8>().ok().and_then(Self::new)
    }

    pub const fn get(self) -> u8 {
        self.0
    }

    /// Gate 4 is fully open and keeps the current speed when selected.
    pub const fn is_fully_open(self) -> bool {
        self.0 == Self::COUNT
    }
}

impl fmt::Display for GatePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── PowerState / Workmode ────────────────────────────────────────────

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PowerState {
    On,
    Off,
}

impl PowerState {
    pub fn parse(raw: &str) -> Option<Self> {
        raw.trim().parse().ok()
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Workmode {
    Manual,
    SuperAuto,
}

impl Workmode {
    pub fn parse(raw: &str) -> Option<Self> {
        raw.trim().parse().ok()
    }
}

// ── AttributeValue ───────────────────────────────────────────────────

/// A value destined for exactly one attribute topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "attribute", content = "value", rename_all = "snake_case")]
pub enum AttributeValue {
    Speed(SpeedOrdinal),
    Gate(GatePosition),
    Power(PowerState),
    Workmode(Workmode),
}

impl AttributeValue {
    pub const fn attribute(self) -> DeviceAttribute {
        match self {
            Self::Speed(_) => DeviceAttribute::Speed,
            Self::Gate(_) => DeviceAttribute::Gate,
            Self::Power(_) => DeviceAttribute::Power,
            Self::Workmode(_) => DeviceAttribute::Workmode,
        }
    }

    /// Plain-text payload: integers as decimal, enums as their tag.
    pub fn wire(self) -> String {
        match self {
            Self::Speed(s) => s.to_string(),
            Self::Gate(g) => g.to_string(),
            Self::Power(p) => p.to_string(),
            Self::Workmode(w) => w.to_string(),
        }
    }

    /// Parse a raw payload for `attribute`. `None` for anything out of range.
    pub fn parse(attribute: DeviceAttribute, raw: &str) -> Option<Self> {
        match attribute {
            DeviceAttribute::Speed => SpeedOrdinal::parse(raw).map(Self::Speed),
            DeviceAttribute::Gate => GatePosition::parse(raw).map(Self::Gate),
            DeviceAttribute::Power => PowerState::parse(raw).map(Self::Power),
            DeviceAttribute::Workmode => Workmode::parse(raw).map(Self::Workmode),
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.attribute(), self.wire())
    }
}
