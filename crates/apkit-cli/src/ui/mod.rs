//! Terminal output helpers.
//!
//! Commands print plain `label  value` listings and one-line status
//! messages; everything styled goes through here so `--json` paths never
//! touch it.

pub mod theme;

use crossterm::style::Stylize;
use serde_json::Value;

use theme::{Icons, LABEL_WIDTH, Severity};

/// Print `name version` as a heading.
pub fn heading(name: &str, detail: &str) {
    println!();
    println!("  {} {}", name.white().bold(), detail.dark_grey());
    println!();
}

/// Print one aligned `label  value` line.
pub fn field(label: &str, value: impl std::fmt::Display) {
    let lw = LABEL_WIDTH;
    println!("  {label:<lw$}{value}");
}

/// Print a field only when it has something to show.
pub fn field_opt(label: &str, value: Option<impl std::fmt::Display>) {
    if let Some(value) = value {
        field(label, value);
    }
}

/// Print a list field, comma separated, skipping empty lists.
pub fn field_list<I, T>(label: &str, values: I)
where
    I: IntoIterator<Item = T>,
    T: std::fmt::Display,
{
    let joined = join(values);
    if !joined.is_empty() {
        field(label, joined);
    }
}

fn status_line(severity: Severity, msg: &str) -> String {
    let icon = severity.icon(&Icons::default());
    let color = severity.color();
    format!("{} {}", icon.with(color), msg.with(color))
}

/// Print a status line with its icon.
pub fn status(severity: Severity, msg: &str) {
    println!("{}", status_line(severity, msg));
}

/// Print an error line to stderr.
pub fn error(msg: &str) {
    eprintln!("{}", status_line(Severity::Error, msg));
}

pub fn success(msg: &str) {
    status(Severity::Success, msg);
}

pub fn warning(msg: &str) {
    status(Severity::Warning, msg);
}

pub fn skipped(msg: &str) {
    status(Severity::Skipped, msg);
}

/// Print a JSON value, pretty.
pub fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn join<I, T>(values: I) -> String
where
    I: IntoIterator<Item = T>,
    T: std::fmt::Display,
{
    values
        .into_iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
