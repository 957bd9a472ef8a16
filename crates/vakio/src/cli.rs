//! Clap derive structures for the `vakio` CLI.
//!
//! Defines the command tree, global flags, and shared value enums. Kept
//! free of workspace types so `build.rs` can include it for man pages.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// vakio -- drive a Vakio OpenAir ventilator through its MQTT broker
#[derive(Debug, Parser)]
#[command(
    name = "vakio",
    version,
    about = "Control Vakio ventilation devices over MQTT",
    long_about = "Mirror and control a Vakio OpenAir ventilator that publishes its state\n\
        to an MQTT broker.\n\n\
        Speed, gate, power and workmode can be set directly, or through the\n\
        fan view: percentage, presets and on/off.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Device profile to use
    #[arg(long, short = 'd', env = "VAKIO_DEVICE", global = true)]
    pub device: Option<String>,

    /// Broker host (overrides profile)
    #[arg(long, short = 'H', env = "VAKIO_HOST", global = true)]
    pub host: Option<String>,

    /// Broker port (overrides profile)
    #[arg(long, env = "VAKIO_PORT", global = true)]
    pub port: Option<u16>,

    /// Topic prefix the device publishes under (overrides profile)
    #[arg(long, short = 't', env = "VAKIO_TOPIC", global = true)]
    pub topic: Option<String>,

    /// Broker username (overrides profile)
    #[arg(long, short = 'u', env = "VAKIO_USERNAME", global = true)]
    pub username: Option<String>,

    /// Broker password
    #[arg(
        long,
        env = "VAKIO_PASSWORD",
        global = true,
        hide = true,
        hide_env_values = true
    )]
    pub password: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "VAKIO_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, env = "VAKIO_COLOR", default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Connect and publish timeout in seconds (overrides profile)
    #[arg(long, env = "VAKIO_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Connect to the broker and disconnect again
    Check,

    /// Show the device's last reported state
    #[command(alias = "st")]
    Status(StatusArgs),

    /// Follow the fan and sensors until interrupted
    Watch(WatchArgs),

    /// Set the fan speed ordinal directly
    Speed(SpeedArgs),

    /// Set the gate position directly
    Gate(GateArgs),

    /// Set the power state directly
    Power(PowerArgs),

    /// Set the workmode directly
    #[command(alias = "mode")]
    Workmode(WorkmodeArgs),

    /// Set the fan speed as a percentage, turning the device on or off
    #[command(alias = "pct")]
    Percentage(PercentageArgs),

    /// Select a preset ("Gate 1".."Gate 4", "Super Auto")
    Preset(PresetArgs),

    /// Turn the device on
    On(OnArgs),

    /// Turn the device off
    Off,

    /// Manage device profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Monitoring ───────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Seconds to wait for every attribute to report
    #[arg(long, short = 'w', default_value = "3")]
    pub wait: u64,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Fan refresh interval in seconds
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub fan_interval: Option<u64>,

    /// Sensor refresh interval in seconds (overrides config)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub sensor_interval: Option<u64>,
}

// ── Plain setters ────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SpeedArgs {
    /// Speed ordinal, 0 (stopped) to 5
    #[arg(value_parser = clap::value_parser!(u8).range(0..=5))]
    pub value: u8,
}

#[derive(Debug, Args)]
pub struct GateArgs {
    /// Gate position, 1 to 4 (4 is fully open)
    #[arg(value_parser = clap::value_parser!(u8).range(1..=4))]
    pub value: u8,
}

#[derive(Debug, Args)]
pub struct PowerArgs {
    pub state: PowerArg,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PowerArg {
    On,
    Off,
}

#[derive(Debug, Args)]
pub struct WorkmodeArgs {
    pub mode: WorkmodeArg,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum WorkmodeArg {
    /// Speed and gate follow explicit commands
    Manual,
    /// The device regulates itself
    SuperAuto,
}

// ── Fan commands ─────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct PercentageArgs {
    /// 0 turns the device off; 1-100 maps onto speeds 1-5
    #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
    pub value: u8,
}

#[derive(Debug, Args)]
pub struct PresetArgs {
    /// Preset label, e.g. "Gate 2" or "Super Auto"
    pub label: String,
}

#[derive(Debug, Args)]
pub struct OnArgs {
    /// Also set the speed, as a percentage (default: keep the current speed)
    #[arg(long, short = 'p', value_parser = clap::value_parser!(u8).range(1..=100))]
    pub percentage: Option<u8>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Interactive setup wizard
    Init(InitArgs),

    /// Show the current configuration (secrets redacted)
    Show,

    /// Print the config file path
    Path,

    /// Store the broker password for a device in the system keyring
    SetPassword,
}

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Save without test-connecting to the broker first
    #[arg(long)]
    pub no_check: bool,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
