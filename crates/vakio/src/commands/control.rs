//! Setter command handlers: plain attribute writes and reconciled fan commands.

use std::fmt::Write as _;

use tracing::debug;
use vakio_core::{
    AttributeValue, Command as CoreCommand, CommandResult, Coordinator, CoreError, DeviceConfig,
    GatePosition, PowerState, Preset, SpeedOrdinal, Workmode,
};

use crate::cli::{Command, GlobalOpts, OutputFormat, PowerArg, WorkmodeArg};
use crate::error::CliError;
use crate::output;

pub async fn handle(
    config: DeviceConfig,
    cmd: Command,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let core_cmd = to_core_command(&cmd)?;
    let settle = needs_condition(&core_cmd).then_some(config.timeout);

    let result = Coordinator::oneshot(config, |coordinator| async move {
        if let Some(timeout) = settle {
            // Reconciled commands plan against what the device last reported.
            let condition = coordinator.wait_for_condition(timeout).await;
            debug!(complete = condition.is_complete(), "planning from condition");
        }
        coordinator.execute(core_cmd).await
    })
    .await?;

    report(&result, global)
}

/// Translate parsed CLI arguments into a core command.
///
/// clap already range-checks numeric arguments; the constructors here
/// re-check so the core never sees an out-of-range value.
fn to_core_command(cmd: &Command) -> Result<CoreCommand, CliError> {
    let core_cmd = match cmd {
        Command::Speed(args) => {
            let speed = SpeedOrdinal::new(args.value).ok_or_else(|| out_of_range("speed", "0-5"))?;
            CoreCommand::Set(AttributeValue::Speed(speed))
        }
        Command::Gate(args) => {
            let gate = GatePosition::new(args.value).ok_or_else(|| out_of_range("gate", "1-4"))?;
            CoreCommand::Set(AttributeValue::Gate(gate))
        }
        Command::Power(args) => CoreCommand::Set(AttributeValue::Power(match args.state {
            PowerArg::On => PowerState::On,
            PowerArg::Off => PowerState::Off,
        })),
        Command::Workmode(args) => CoreCommand::Set(AttributeValue::Workmode(match args.mode {
            WorkmodeArg::Manual => Workmode::Manual,
            WorkmodeArg::SuperAuto => Workmode::SuperAuto,
        })),
        Command::Percentage(args) => CoreCommand::SetPercentage(args.value),
        Command::Preset(args) => CoreCommand::SetPreset(args.label.parse::<Preset>()?),
        Command::On(args) => match args.percentage {
            Some(pct) => CoreCommand::SetPercentage(pct),
            None => CoreCommand::TurnOn,
        },
        Command::Off => CoreCommand::TurnOff,
        other => {
            return Err(CliError::Internal(format!(
                "not a setter command: {other:?}"
            )));
        }
    };
    Ok(core_cmd)
}

fn needs_condition(cmd: &CoreCommand) -> bool {
    !matches!(cmd, CoreCommand::Set(_))
}

fn out_of_range(field: &str, range: &str) -> CliError {
    CliError::from(CoreError::InvalidArgument {
        field: field.into(),
        reason: format!("must be in {range}"),
    })
}

// ── Reporting ────────────────────────────────────────────────────────

fn report(result: &CommandResult, global: &GlobalOpts) -> Result<(), CliError> {
    if let CommandResult::Failed {
        attribute,
        published,
    } = result
    {
        return Err(CliError::PublishFailed {
            attribute: *attribute,
            published: join_writes(published),
        });
    }

    match global.output {
        OutputFormat::Table | OutputFormat::Plain => {
            if !global.quiet {
                let color = output::should_color(&global.color);
                eprintln!("{}", summary(result, color));
            }
            Ok(())
        }
        _ => {
            let out = output::render_single(&global.output, result, |_| String::new(), |_| {
                String::new()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}

fn summary(result: &CommandResult, color: bool) -> String {
    match result {
        CommandResult::Sent { published } => {
            let mut line = format!("{} Sent {}", output::check_mark(color), join_writes(published));
            if published.len() > 1 {
                let _ = write!(line, " ({} writes)", published.len());
            }
            line
        }
        CommandResult::Unchanged => "Device already reports that state; nothing sent".into(),
        CommandResult::Failed { attribute, .. } => format!("Publishing {attribute} failed"),
    }
}

fn join_writes(writes: &[AttributeValue]) -> String {
    if writes.is_empty() {
        return "(none)".into();
    }
    writes
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
