//! Output formatting: table, JSON, YAML.
//!
//! Renders data in the format selected by `--output`. Table uses `tabled`,
//! structured formats use serde.

use std::io::{self, Write};

use tabled::{Table, Tabled, settings::Style};

use crate::cli::OutputFormat;
use crate::error::CliError;

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a serde-serializable item in the chosen format.
///
/// Table rendering delegates to `table_fn`, since each command lays out
/// its own tables.
pub fn render<T>(
    format: OutputFormat,
    data: &T,
    table_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize + ?Sized,
{
    match format {
        OutputFormat::Table => Ok(table_fn(data)),
        OutputFormat::Json => render_json_pretty(data),
        OutputFormat::JsonCompact => render_json_compact(data),
        OutputFormat::Yaml => render_yaml(data),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Format-specific renderers ────────────────────────────────────────

pub fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

fn render_json_pretty<T: serde::Serialize + ?Sized>(data: &T) -> Result<String, CliError> {
    serde_json::to_string_pretty(data).map_err(|e| CliError::Render(e.to_string()))
}

fn render_json_compact<T: serde::Serialize + ?Sized>(data: &T) -> Result<String, CliError> {
    serde_json::to_string(data).map_err(|e| CliError::Render(e.to_string()))
}

fn render_yaml<T: serde::Serialize + ?Sized>(data: &T) -> Result<String, CliError> {
    serde_yaml::to_string(data).map_err(|e| CliError::Render(e.to_string()))
}

// ── Value helpers ────────────────────────────────────────────────────

/// Format a percentage with two decimals.
pub fn fmt_pct(value: f64) -> String {
    format!("{value:.2}%")
}

/// Render an optional string, using `-` for absent values.
pub fn or_dash(value: Option<&str>) -> String {
    value.unwrap_or("-").to_owned()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[derive(serde::Serialize)]
    struct Row {
        name: &'static str,
    }

    #[test]
    fn compact_json_is_single_line() {
        let out = render(OutputFormat::JsonCompact, &Row { name: "a" }, |_| String::new()).unwrap();
        assert_eq!(out, r#"{"name":"a"}"#);
    }

    #[test]
    fn table_format_uses_layout_fn() {
        let out = render(OutputFormat::Table, &Row { name: "a" }, |r| r.name.to_owned()).unwrap();
        assert_eq!(out, "a");
    }

    #[test]
    fn percent_has_two_decimals() {
        assert_eq!(fmt_pct(12.5), "12.50%");
        assert_eq!(or_dash(None), "-");
    }
}
