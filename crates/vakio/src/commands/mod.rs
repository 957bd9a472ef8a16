//! Command dispatch: bridges CLI args -> coordinator calls -> output formatting.

pub mod config_cmd;
pub mod control;
pub mod status;
pub mod watch;

use vakio_core::DeviceConfig;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a broker-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    config: DeviceConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Check => status::check(config, global).await,
        Command::Status(args) => status::handle(config, args, global).await,
        Command::Watch(args) => watch::handle(config, args, global).await,

        Command::Speed(_)
        | Command::Gate(_)
        | Command::Power(_)
        | Command::Workmode(_)
        | Command::Percentage(_)
        | Command::Preset(_)
        | Command::On(_)
        | Command::Off => control::handle(config, cmd, global).await,

        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => Err(CliError::Internal(
            "config and completions do not reach the broker".into(),
        )),
    }
}
