//! Watch command: drive the fan and sensor entities on their timers and
//! print one line per render.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};
use vakio_core::{AttributeSensor, Coordinator, DeviceConfig, Entity, EntityState, FanEntity};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::config;
use crate::error::CliError;
use crate::output;

/// One entity render.
#[derive(Debug, Serialize)]
struct RenderEvent<'a> {
    at: DateTime<Utc>,
    unique_id: &'a str,
    name: &'a str,
    state: EntityState,
}

pub async fn handle(
    device_config: DeviceConfig,
    args: WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let defaults = config::load_config_or_default().defaults;
    let sensor_every = Duration::from_secs(
        args.sensor_interval
            .unwrap_or(defaults.sensor_interval)
            .max(1),
    );

    let coordinator = Coordinator::new(device_config);
    coordinator.login().await?;
    info!(broker = %coordinator.config().address(), "watching device");

    let mut fan = FanEntity::new(coordinator.clone());
    let mut sensors = AttributeSensor::all(&coordinator, sensor_every);
    let fan_every = args
        .fan_interval
        .map_or(fan.poll_interval(), Duration::from_secs);

    let mut fan_tick = tokio::time::interval(fan_every);
    fan_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut sensor_tick = tokio::time::interval(sensor_every);
    sensor_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let color = output::should_color(&global.color);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let result = loop {
        tokio::select! {
            biased;
            signal = &mut shutdown => {
                debug!("interrupted, shutting down");
                break signal.map_err(CliError::from);
            }
            _ = fan_tick.tick() => {
                if fan.tick() {
                    if let Err(e) = emit(&fan, global, color) {
                        break Err(e);
                    }
                }
            }
            _ = sensor_tick.tick() => {
                let rendered = sensors
                    .iter_mut()
                    .filter_map(|sensor| sensor.tick().then_some(&*sensor))
                    .try_for_each(|sensor| emit(sensor, global, color));
                if let Err(e) = rendered {
                    break Err(e);
                }
            }
        }
    };

    coordinator.disconnect().await;
    result
}

fn emit(entity: &dyn Entity, global: &GlobalOpts, color: bool) -> Result<(), CliError> {
    let event = RenderEvent {
        at: Utc::now(),
        unique_id: entity.unique_id(),
        name: entity.name(),
        state: entity.state(),
    };
    let line = render_event(&event, &global.output, color)?;
    output::print_output(&line, global.quiet);
    Ok(())
}

/// Structured formats emit one document per render so the stream can be
/// piped; json is always compact here.
fn render_event(
    event: &RenderEvent<'_>,
    format: &OutputFormat,
    color: bool,
) -> Result<String, CliError> {
    match format {
        OutputFormat::Json | OutputFormat::JsonCompact => output::render_json_compact(event),
        OutputFormat::Yaml => Ok(format!("---\n{}", output::render_yaml(event)?)),
        OutputFormat::Plain => Ok(format!("{} {}", event.unique_id, state_text(&event.state))),
        OutputFormat::Table => Ok(format!(
            "{}  {:<16} {}",
            output::dim(&event.at.format("%H:%M:%S").to_string(), color),
            event.name,
            output::accent(&state_text(&event.state), color),
        )),
    }
}

fn state_text(state: &EntityState) -> String {
    match state {
        EntityState::Fan(fan) => {
            let power = match fan.is_on {
                Some(true) => "on",
                Some(false) => "off",
                None => "-",
            };
            let speed = fan.percentage.map_or_else(|| "-".into(), |p| format!("{p}%"));
            let preset = fan.preset.map_or_else(|| "-".into(), |p| p.to_string());
            format!("{power} {speed} {preset}")
        }
        EntityState::Sensor { value, .. } => value.clone().unwrap_or_else(|| "-".into()),
    }
}
