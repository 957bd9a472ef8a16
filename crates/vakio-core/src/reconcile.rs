// ── State reconciliation ──
//
// Pure translation between raw device attributes and the UI-facing view
// (percentage, preset, on/off), plus planning of the attribute writes a
// UI command turns into. Nothing here touches the network.

use serde::Serialize;

use crate::error::CoreError;
use crate::model::{AttributeValue, GatePosition, PowerState, Preset, SpeedOrdinal, Workmode};
use crate::store::DeviceCondition;

/// Ordered attribute writes for one command. Published one by one.
pub type CommandPlan = Vec<AttributeValue>;

// ── Speed ↔ percentage ───────────────────────────────────────────────

/// Percentage band ceiling for `speed`: 0 → 0, k → k·20.
///
/// `None` (unknown or out-of-range telemetry) stays `None`; it is never
/// rendered as 0%.
pub fn speed_to_percentage(speed: Option<SpeedOrdinal>) -> Option<u8> {
    let speed = speed?;
    let pct = u16::from(speed.get()) * 100 / u16::from(SpeedOrdinal::COUNT);
    u8::try_from(pct).ok()
}

/// Speed whose band contains `percentage`.
///
/// 0% is speed 0. Otherwise the first k in 1..=5 with
/// `percentage <= k·100/5`, so 1–20 → 1, 21–40 → 2 and so on.
pub fn percentage_to_speed(percentage: u8) -> Result<SpeedOrdinal, CoreError> {
    if percentage > 100 {
        return Err(CoreError::invalid(
            "percentage",
            format!("{percentage} is outside 0-100"),
        ));
    }
    if percentage == 0 {
        return Ok(SpeedOrdinal::OFF);
    }

    let count = u16::from(SpeedOrdinal::COUNT);
    (1..=SpeedOrdinal::COUNT)
        .find(|k| u16::from(percentage) <= u16::from(*k) * 100 / count)
        .and_then(SpeedOrdinal::new)
        .ok_or_else(|| CoreError::Internal(format!("no speed band for {percentage}%")))
}

// ── Preset ───────────────────────────────────────────────────────────

/// Preset shown for the current workmode and gate.
///
/// Super-auto wins regardless of gate. Otherwise the gate preset, or
/// `None` while the gate is unknown.
pub fn derive_preset(workmode: Option<Workmode>, gate: Option<GatePosition>) -> Option<Preset> {
    if workmode == Some(Workmode::SuperAuto) {
        return Some(Preset::SuperAuto);
    }
    gate.map(Preset::Gate)
}

/// Writes that select `preset` given the current workmode.
///
/// A gate preset while in super-auto first drops to manual. Gates 1–3
/// force speed 0 before moving the gate; gate 4 leaves speed alone, as the
/// device firmware does. Super Auto only switches the workmode.
pub fn preset_plan(preset: Preset, workmode: Option<Workmode>) -> CommandPlan {
    match preset {
        Preset::Gate(gate) => {
            let mut plan = Vec::with_capacity(3);
            if workmode == Some(Workmode::SuperAuto) {
                plan.push(AttributeValue::Workmode(Workmode::Manual));
            }
            if !gate.is_fully_open() {
                plan.push(AttributeValue::Speed(SpeedOrdinal::OFF));
            }
            plan.push(AttributeValue::Gate(gate));
            plan
        }
        Preset::SuperAuto => vec![AttributeValue::Workmode(Workmode::SuperAuto)],
    }
}

// ── On / off ─────────────────────────────────────────────────────────

pub fn is_on(power: Option<PowerState>) -> Option<bool> {
    power.map(|p| p == PowerState::On)
}

/// `state=on` unless the device already reports on. Unknown counts as off.
pub fn turn_on_plan(power: Option<PowerState>) -> CommandPlan {
    if power == Some(PowerState::On) {
        Vec::new()
    } else {
        vec![AttributeValue::Power(PowerState::On)]
    }
}

/// `state=off` unless the device already reports off.
pub fn turn_off_plan(power: Option<PowerState>) -> CommandPlan {
    if power == Some(PowerState::Off) {
        Vec::new()
    } else {
        vec![AttributeValue::Power(PowerState::Off)]
    }
}

/// A running speed implies turning on first. Speed 0 never implies off.
pub fn speed_plan(speed: SpeedOrdinal, power: Option<PowerState>) -> CommandPlan {
    let mut plan = if speed.is_running() {
        turn_on_plan(power)
    } else {
        Vec::new()
    };
    plan.push(AttributeValue::Speed(speed));
    plan
}

/// 0% turns the device off; anything else runs the matching speed.
pub fn percentage_plan(percentage: u8, power: Option<PowerState>) -> Result<CommandPlan, CoreError> {
    let speed = percentage_to_speed(percentage)?;
    if speed.is_running() {
        Ok(speed_plan(speed, power))
    } else {
        Ok(turn_off_plan(power))
    }
}

// ── Fan view ─────────────────────────────────────────────────────────

/// Everything a fan renders, derived from one condition snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FanSnapshot {
    pub percentage: Option<u8>,
    pub preset: Option<Preset>,
    pub is_on: Option<bool>,
}

impl FanSnapshot {
    pub fn derive(condition: &DeviceCondition) -> Self {
        Self {
            percentage: speed_to_percentage(condition.speed()),
            preset: derive_preset(condition.workmode(), condition.gate()),
            is_on: is_on(condition.power()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn speed(k: u8) -> SpeedOrdinal {
        SpeedOrdinal::new(k).unwrap()
    }

    fn gate(g: u8) -> GatePosition {
        GatePosition::new(g).unwrap()
    }

    // ── Percentage ───────────────────────────────────────────────────

    #[test]
    fn speed_maps_to_band_ceiling() {
        let pcts: Vec<_> = (0..=5).map(|k| speed_to_percentage(Some(speed(k)))).collect();
        assert_eq!(
            pcts,
            [Some(0), Some(20), Some(40), Some(60), Some(80), Some(100)]
        );
    }

    #[test]
    fn unknown_speed_has_no_percentage() {
        assert_eq!(speed_to_percentage(None), None);
        assert_eq!(speed_to_percentage(SpeedOrdinal::parse("6")), None);
    }

    #[test]
    fn band_round_trip_is_stable() {
        for k in 1..=5 {
            let pct = speed_to_percentage(Some(speed(k))).unwrap();
            let back = percentage_to_speed(pct).unwrap();
            assert_eq!(speed_to_percentage(Some(back)), Some(pct));
        }
        assert_eq!(percentage_to_speed(0).unwrap(), SpeedOrdinal::OFF);
    }

    #[test]
    fn percentages_quantize_upward_into_bands() {
        let cases = [(1, 1), (20, 1), (21, 2), (33, 2), (50, 3), (61, 4), (80, 4), (99, 5), (100, 5)];
        for (pct, expected) in cases {
            assert_eq!(percentage_to_speed(pct).unwrap().get(), expected, "{pct}%");
        }
    }

    #[test]
    fn percentage_above_hundred_is_invalid() {
        assert!(matches!(
            percentage_to_speed(101),
            Err(CoreError::InvalidArgument { .. })
        ));
    }

    // ── Preset ───────────────────────────────────────────────────────

    #[test]
    fn preset_follows_gate_in_manual() {
        assert_eq!(
            derive_preset(Some(Workmode::Manual), Some(gate(3))),
            Some(Preset::Gate(gate(3)))
        );
        assert_eq!(derive_preset(None, Some(gate(1))), Some(Preset::Gate(gate(1))));
        assert_eq!(derive_preset(Some(Workmode::Manual), None), None);
    }

    #[test]
    fn super_auto_overrides_gate() {
        for g in [None, Some(gate(1)), Some(gate(4))] {
            assert_eq!(derive_preset(Some(Workmode::SuperAuto), g), Some(Preset::SuperAuto));
        }
    }

    #[test]
    fn gate_preset_from_super_auto_drops_to_manual_and_stops_fan() {
        let plan = preset_plan(Preset::Gate(gate(2)), Some(Workmode::SuperAuto));
        assert_eq!(
            plan,
            [
                AttributeValue::Workmode(Workmode::Manual),
                AttributeValue::Speed(SpeedOrdinal::OFF),
                AttributeValue::Gate(gate(2)),
            ]
        );
    }

    #[test]
    fn gate_four_keeps_speed() {
        assert_eq!(
            preset_plan(Preset::Gate(gate(4)), Some(Workmode::Manual)),
            [AttributeValue::Gate(gate(4))]
        );
        assert_eq!(
            preset_plan(Preset::Gate(gate(4)), Some(Workmode::SuperAuto)),
            [
                AttributeValue::Workmode(Workmode::Manual),
                AttributeValue::Gate(gate(4)),
            ]
        );
    }

    #[test]
    fn super_auto_preset_only_switches_workmode() {
        for mode in [None, Some(Workmode::Manual), Some(Workmode::SuperAuto)] {
            assert_eq!(
                preset_plan(Preset::SuperAuto, mode),
                [AttributeValue::Workmode(Workmode::SuperAuto)]
            );
        }
    }

    // ── On / off ─────────────────────────────────────────────────────

    #[test]
    fn turn_on_is_idempotent() {
        assert!(turn_on_plan(Some(PowerState::On)).is_empty());
        assert_eq!(turn_on_plan(Some(PowerState::Off)), [AttributeValue::Power(PowerState::On)]);
        assert_eq!(turn_on_plan(None), [AttributeValue::Power(PowerState::On)]);
    }

    #[test]
    fn turn_off_is_idempotent() {
        assert!(turn_off_plan(Some(PowerState::Off)).is_empty());
        assert_eq!(turn_off_plan(None), [AttributeValue::Power(PowerState::Off)]);
    }

    #[test]
    fn running_speed_turns_on_first() {
        assert_eq!(
            speed_plan(speed(3), Some(PowerState::Off)),
            [
                AttributeValue::Power(PowerState::On),
                AttributeValue::Speed(speed(3)),
            ]
        );
        assert_eq!(
            speed_plan(speed(3), Some(PowerState::On)),
            [AttributeValue::Speed(speed(3))]
        );
    }

    #[test]
    fn speed_zero_does_not_turn_off() {
        assert_eq!(
            speed_plan(SpeedOrdinal::OFF, Some(PowerState::On)),
            [AttributeValue::Speed(SpeedOrdinal::OFF)]
        );
    }

    #[test]
    fn zero_percent_turns_off() {
        assert_eq!(
            percentage_plan(0, Some(PowerState::On)).unwrap(),
            [AttributeValue::Power(PowerState::Off)]
        );
        assert!(percentage_plan(0, Some(PowerState::Off)).unwrap().is_empty());
        assert_eq!(
            percentage_plan(45, Some(PowerState::On)).unwrap(),
            [AttributeValue::Speed(speed(3))]
        );
    }
}
