//! Connection check and status command handlers.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tabled::Tabled;
use vakio_core::{Coordinator, DeviceAttribute, DeviceCondition, DeviceConfig, FanSnapshot};

use crate::cli::{GlobalOpts, OutputFormat, StatusArgs};
use crate::error::CliError;
use crate::output;

// ── Check ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct CheckReport {
    broker: String,
    username: Option<String>,
    connected: bool,
}

/// Connect, then disconnect straight away.
pub async fn check(config: DeviceConfig, global: &GlobalOpts) -> Result<(), CliError> {
    Coordinator::probe(&config).await?;

    let report = CheckReport {
        broker: config.address(),
        username: config.credentials.as_ref().map(|c| c.username.clone()),
        connected: true,
    };

    if matches!(global.output, OutputFormat::Table | OutputFormat::Plain) {
        if !global.quiet {
            let color = output::should_color(&global.color);
            let who = report.username.as_deref().unwrap_or("anonymous");
            eprintln!(
                "{} Connected to {} as {who}",
                output::check_mark(color),
                report.broker
            );
        }
        return Ok(());
    }

    let out = output::render_single(&global.output, &report, |_| String::new(), |_| {
        String::new()
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}

// ── Status ──────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct StatusReport {
    broker: String,
    topic: String,
    fan: FanSnapshot,
    attributes: Vec<AttributeReading>,
    last_update: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
struct AttributeReading {
    attribute: DeviceAttribute,
    topic: String,
    value: Option<String>,
    received_at: Option<DateTime<Utc>>,
}

#[derive(Tabled)]
struct AttributeRow {
    #[tabled(rename = "Attribute")]
    attribute: String,
    #[tabled(rename = "Topic")]
    topic: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Received")]
    received: String,
}

impl From<&AttributeReading> for AttributeRow {
    fn from(r: &AttributeReading) -> Self {
        Self {
            attribute: r.attribute.to_string(),
            topic: r.topic.clone(),
            value: r.value.clone().unwrap_or_else(|| "-".into()),
            received: r
                .received_at
                .map_or_else(|| "-".into(), |t| t.format("%H:%M:%S").to_string()),
        }
    }
}

impl StatusReport {
    fn new(config: &DeviceConfig, condition: &DeviceCondition) -> Self {
        let attributes = condition
            .iter()
            .map(|(attribute, telemetry)| AttributeReading {
                attribute,
                topic: attribute.topic(&config.topic),
                value: telemetry.map(|t| t.raw.clone()),
                received_at: telemetry.map(|t| t.received_at),
            })
            .collect();

        Self {
            broker: config.address(),
            topic: config.topic.clone(),
            fan: FanSnapshot::derive(condition),
            attributes,
            last_update: condition.last_update(),
        }
    }
}

/// Login, give the device `--wait` seconds to report, print what arrived.
pub async fn handle(
    config: DeviceConfig,
    args: StatusArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let wait = Duration::from_secs(args.wait);
    let condition = Coordinator::oneshot(config.clone(), |coordinator| async move {
        Ok(coordinator.wait_for_condition(wait).await)
    })
    .await?;

    if condition.is_empty() {
        tracing::warn!(topic = %config.topic, "no telemetry received");
    }

    let report = StatusReport::new(&config, &condition);
    let color = output::should_color(&global.color);
    let out = output::render_single(&global.output, &report, |r| detail(r, color), plain)?;
    output::print_output(&out, global.quiet);
    Ok(())
}

fn detail(r: &StatusReport, color: bool) -> String {
    let unknown = || output::dim("-", color);
    let power = match r.fan.is_on {
        Some(true) => output::accent("on", color),
        Some(false) => "off".into(),
        None => unknown(),
    };
    let percentage = r
        .fan
        .percentage
        .map_or_else(unknown, |p| output::accent(&format!("{p}%"), color));
    let preset = r
        .fan
        .preset
        .map_or_else(unknown, |p| output::accent(&p.to_string(), color));
    let updated = r.last_update.map_or_else(unknown, |t| {
        t.format("%Y-%m-%d %H:%M:%S UTC").to_string()
    });

    let rows: Vec<AttributeRow> = r.attributes.iter().map(AttributeRow::from).collect();
    let lines = [
        format!("Broker:     {}", r.broker),
        format!("Topic:      {}", r.topic),
        format!("Power:      {power}"),
        format!("Speed:      {percentage}"),
        format!("Preset:     {preset}"),
        format!("Updated:    {updated}"),
        String::new(),
        output::render_table(&rows),
    ];
    lines.join("\n")
}

/// `attribute=value` per reported attribute.
fn plain(r: &StatusReport) -> String {
    r.attributes
        .iter()
        .filter_map(|a| a.value.as_ref().map(|v| format!("{}={v}", a.attribute)))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use vakio_core::DeviceStore;

    use super::*;

    fn report_with(values: &[(DeviceAttribute, &str)]) -> StatusReport {
        let store = DeviceStore::new("vakio");
        for (attribute, raw) in values {
            store.update(*attribute, *raw);
        }
        StatusReport::new(&DeviceConfig::new("broker.lan"), &store.snapshot())
    }

    #[test]
    fn report_derives_fan_view() {
        let report = report_with(&[
            (DeviceAttribute::Speed, "3"),
            (DeviceAttribute::Gate, "2"),
            (DeviceAttribute::Workmode, "manual"),
        ]);

        assert_eq!(report.broker, "broker.lan:1883");
        assert_eq!(report.fan.percentage, Some(60));
        assert_eq!(report.fan.preset.map(|p| p.to_string()).as_deref(), Some("Gate 2"));
        assert_eq!(report.fan.is_on, None);
        assert_eq!(report.attributes[0].topic, "vakio/speed");
        assert!(report.last_update.is_some());
    }

    #[test]
    fn plain_skips_unreported_attributes() {
        let report = report_with(&[(DeviceAttribute::Power, "on"), (DeviceAttribute::Speed, "1")]);
        assert_eq!(plain(&report), "speed=1\npower=on");
    }

    #[test]
    fn detail_marks_unknowns() {
        let report = report_with(&[]);
        let text = detail(&report, false);
        assert!(text.contains("Power:      -"));
        assert!(text.contains("vakio/endpoint"));
    }
}
