use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

/// One of the four independently published device attributes.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeviceAttribute {
    Speed,
    Gate,
    Power,
    Workmode,
}

impl DeviceAttribute {
    pub const ALL: [Self; 4] = [Self::Speed, Self::Gate, Self::Power, Self::Workmode];

    /// Slot index inside a fixed-size per-attribute record.
    pub const fn index(self) -> usize {
        match self {
            Self::Speed => 0,
            Self::Gate => 1,
            Self::Power => 2,
            Self::Workmode => 3,
        }
    }

    /// Last topic segment the device uses for this attribute.
    pub const fn endpoint(self) -> &'static str {
        match self {
            Self::Speed => "speed",
            Self::Gate => "gate",
            Self::Power => "state",
            Self::Workmode => "endpoint",
        }
    }

    pub fn from_endpoint(endpoint: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.endpoint() == endpoint)
    }

    /// Full topic under `prefix`, e.g. `vakio/state`.
    pub fn topic(self, prefix: &str) -> String {
        format!("{prefix}/{}", self.endpoint())
    }
}
