use std::time::Duration;

use super::{Entity, EntityInfo, EntityKind, EntityState, Feature};
use crate::coordinator::Coordinator;
use crate::error::CoreError;
use crate::model::{SpeedOrdinal, Workmode};
use crate::reconcile::{self, FanSnapshot};

const FAN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// The device as a fan: percentage speed, preset, on/off.
#[derive(Debug)]
pub struct FanEntity {
    info: EntityInfo,
    coordinator: Coordinator,
    rendered: FanSnapshot,
}

impl FanEntity {
    pub fn new(coordinator: Coordinator) -> Self {
        let info = EntityInfo {
            unique_id: format!("{}_fan", coordinator.config().topic),
            name: "OpenAir".into(),
            kind: EntityKind::Fan,
            features: vec![
                Feature::SetSpeed,
                Feature::PresetMode,
                Feature::TurnOn,
                Feature::TurnOff,
            ],
            poll_interval: FAN_POLL_INTERVAL,
        };
        Self {
            info,
            coordinator,
            rendered: FanSnapshot::default(),
        }
    }

    pub fn snapshot(&self) -> FanSnapshot {
        self.rendered
    }

    /// Set speed by percentage.
    ///
    /// Suppressed in super-auto, where the device owns the speed: nothing
    /// is sent and the rendered state snaps back to telemetry.
    pub async fn set_percentage(&mut self, percentage: u8) -> Result<bool, CoreError> {
        if self.coordinator.workmode() == Some(Workmode::SuperAuto) {
            tracing::debug!(percentage, "speed change ignored in super auto");
            self.rendered = self.coordinator.fan_snapshot();
            return Ok(false);
        }
        self.coordinator.set_percentage(percentage).await
    }

    pub async fn set_preset_mode(&mut self, label: &str) -> Result<bool, CoreError> {
        self.coordinator.set_preset(label).await
    }

    /// Turn on, then run at `percentage` or at the lowest speed.
    ///
    /// 0% still runs at the lowest speed; turning on never stops the fan.
    pub async fn turn_on(&mut self, percentage: Option<u8>) -> Result<bool, CoreError> {
        let speed = match percentage {
            Some(pct) => reconcile::percentage_to_speed(pct)?,
            None => SpeedOrdinal::MIN_RUNNING,
        };
        let speed = if speed.is_running() {
            speed
        } else {
            SpeedOrdinal::MIN_RUNNING
        };
        let powered = self.coordinator.turn_on().await?;
        let sped = self.coordinator.set_speed(speed).await?;
        Ok(powered || sped)
    }

    pub async fn turn_off(&mut self) -> Result<bool, CoreError> {
        let sent = self.coordinator.turn_off().await?;
        self.tick();
        Ok(sent)
    }
}

impl Entity for FanEntity {
    fn info(&self) -> &EntityInfo {
        &self.info
    }

    fn tick(&mut self) -> bool {
        let current = self.coordinator.fan_snapshot();
        if current == self.rendered {
            return false;
        }
        tracing::trace!(?current, "fan state changed");
        self.rendered = current;
        true
    }

    fn state(&self) -> EntityState {
        EntityState::Fan(self.rendered)
    }
}
