use std::time::Duration;

use super::{Entity, EntityInfo, EntityKind, EntityState};
use crate::coordinator::Coordinator;
use crate::model::DeviceAttribute;

const SENSOR_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Mirrors one attribute's raw telemetry.
#[derive(Debug)]
pub struct AttributeSensor {
    info: EntityInfo,
    coordinator: Coordinator,
    attribute: DeviceAttribute,
    rendered: Option<String>,
}

impl AttributeSensor {
    pub fn new(coordinator: Coordinator, attribute: DeviceAttribute) -> Self {
        Self::with_interval(coordinator, attribute, SENSOR_POLL_INTERVAL)
    }

    pub fn with_interval(
        coordinator: Coordinator,
        attribute: DeviceAttribute,
        poll_interval: Duration,
    ) -> Self {
        let info = EntityInfo {
            unique_id: format!("{}_{attribute}", coordinator.config().topic),
            name: format!("OpenAir {}", capitalize(attribute.into())),
            kind: EntityKind::Sensor,
            features: Vec::new(),
            poll_interval,
        };
        Self {
            info,
            coordinator,
            attribute,
            rendered: None,
        }
    }

    /// One sensor per attribute.
    pub fn all(coordinator: &Coordinator, poll_interval: Duration) -> Vec<Self> {
        DeviceAttribute::ALL
            .into_iter()
            .map(|a| Self::with_interval(coordinator.clone(), a, poll_interval))
            .collect()
    }

    pub fn attribute(&self) -> DeviceAttribute {
        self.attribute
    }

    pub fn value(&self) -> Option<&str> {
        self.rendered.as_deref()
    }
}

impl Entity for AttributeSensor {
    fn info(&self) -> &EntityInfo {
        &self.info
    }

    fn tick(&mut self) -> bool {
        let current = self.coordinator.raw(self.attribute);
        if current == self.rendered {
            return false;
        }
        self.rendered = current;
        true
    }

    fn state(&self) -> EntityState {
        EntityState::Sensor {
            attribute: self.attribute,
            value: self.rendered.clone(),
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}
