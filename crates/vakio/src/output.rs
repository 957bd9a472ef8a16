//! Output formatting: table, JSON, YAML, plain.
//!
//! Renders data in the format selected by `--output`. Table uses `tabled`,
//! structured formats use serde, plain emits bare values for scripts.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use tabled::{Table, Tabled, settings::Style};

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: &ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

/// Success marker for action confirmations on stderr.
pub fn check_mark(color: bool) -> String {
    if color {
        "✓".green().to_string()
    } else {
        "✓".into()
    }
}

/// Dim a secondary value (timestamps, unknowns).
pub fn dim(text: &str, color: bool) -> String {
    if color {
        text.dimmed().to_string()
    } else {
        text.to_owned()
    }
}

/// Highlight a primary value.
pub fn accent(text: &str, color: bool) -> String {
    if color {
        text.cyan().bold().to_string()
    } else {
        text.to_owned()
    }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a single serde-serializable item in the chosen format.
///
/// Table rendering uses `detail_fn`, which returns a pre-formatted view;
/// plain rendering uses `plain_fn`.
pub fn render_single<T>(
    format: &OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
    plain_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize,
{
    match format {
        OutputFormat::Table => Ok(detail_fn(data)),
        OutputFormat::Json => render_json_pretty(data),
        OutputFormat::JsonCompact => render_json_compact(data),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => Ok(plain_fn(data)),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
    let _ = stdout.flush();
}

// ── Format-specific renderers ────────────────────────────────────────

pub fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

/// Pretty-printed JSON.
pub fn render_json_pretty<T: serde::Serialize + ?Sized>(data: &T) -> Result<String, CliError> {
    serde_json::to_string_pretty(data).map_err(|e| CliError::Render(e.to_string()))
}

/// Compact single-line JSON.
pub fn render_json_compact<T: serde::Serialize + ?Sized>(data: &T) -> Result<String, CliError> {
    serde_json::to_string(data).map_err(|e| CliError::Render(e.to_string()))
}

/// YAML output.
pub fn render_yaml<T: serde::Serialize + ?Sized>(data: &T) -> Result<String, CliError> {
    serde_yaml::to_string(data)
        .map(|s| s.trim_end().to_owned())
        .map_err(|e| CliError::Render(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde::Serialize;

    use super::*;

    #[derive(Serialize)]
    struct Reading {
        attribute: &'static str,
        value: Option<u8>,
    }

    const READING: Reading = Reading {
        attribute: "speed",
        value: Some(3),
    };

    fn detail(r: &Reading) -> String {
        format!("{}: {:?}", r.attribute, r.value)
    }

    fn plain(r: &Reading) -> String {
        r.value.map(|v| v.to_string()).unwrap_or_default()
    }

    #[test]
    fn structured_formats_use_serde() {
        let json = render_single(&OutputFormat::JsonCompact, &READING, detail, plain).unwrap();
        assert_eq!(json, r#"{"attribute":"speed","value":3}"#);

        let yaml = render_single(&OutputFormat::Yaml, &READING, detail, plain).unwrap();
        assert_eq!(yaml, "attribute: speed\nvalue: 3");
    }

    #[test]
    fn table_and_plain_use_callbacks() {
        let table = render_single(&OutputFormat::Table, &READING, detail, plain).unwrap();
        assert_eq!(table, "speed: Some(3)");
        let bare = render_single(&OutputFormat::Plain, &READING, detail, plain).unwrap();
        assert_eq!(bare, "3");
    }

    #[test]
    fn colorless_helpers_pass_text_through() {
        assert_eq!(check_mark(false), "✓");
        assert_eq!(dim("-", false), "-");
        assert_eq!(accent("60%", false), "60%");
        assert_ne!(accent("60%", true), "60%");
    }
}
