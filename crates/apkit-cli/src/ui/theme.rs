//! Visual constants shared by the commands.

use crossterm::style::Color;

/// Label column width for `label  value` listings.
pub const LABEL_WIDTH: usize = 14;

/// Status icons
#[derive(Debug, Clone)]
pub struct Icons {
    pub success: &'static str,
    pub warning: &'static str,
    pub error: &'static str,
    pub skipped: &'static str,
}

impl Default for Icons {
    fn default() -> Self {
        Self {
            success: "✓",
            warning: "⚠",
            error: "✗",
            skipped: "○",
        }
    }
}

/// Message severity for status lines
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Success,
    Warning,
    Error,
    Skipped,
}

impl Severity {
    pub fn icon(self, icons: &Icons) -> &'static str {
        match self {
            Self::Success => icons.success,
            Self::Warning => icons.warning,
            Self::Error => icons.error,
            Self::Skipped => icons.skipped,
        }
    }

    pub fn color(self) -> Color {
        match self {
            Self::Success => Color::Green,
            Self::Warning => Color::Yellow,
            Self::Error => Color::Red,
            Self::Skipped => Color::DarkGrey,
        }
    }
}

/// Format a byte count as B, KB, MB or GB.
pub fn format_size(bytes: u64) -> String {
    let kb = bytes as f64 / 1024.0;
    let mb = kb / 1024.0;
    if mb >= 1024.0 {
        format!("{:.1} GB", mb / 1024.0)
    } else if kb >= 1024.0 {
        format!("{mb:.1} MB")
    } else if kb >= 1.0 {
        format!("{kb:.1} KB")
    } else {
        format!("{bytes} B")
    }
}
