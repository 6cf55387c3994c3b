//! Output formatting abstraction for text vs JSON rendering
//!
//! All subcommand output flows through [`OutputWriter`] which handles format
//! switching. Command handlers build a report struct implementing both
//! `Serialize` (for JSON) and [`Render`] (for text) and never touch stdout
//! directly. Shared column formatting for timestamps, severities, and trust
//! states also lives here so every command prints them the same way.

use std::io::Write;

use chrono::{DateTime, Utc};
use colored::{ColoredString, Colorize};
use serde::Serialize;

use authwatch_core::types::{Severity, TrustStatus};

use crate::cli::OutputFormat;
use crate::error::CliError;

/// Abstraction for writing CLI output in different formats.
pub struct OutputWriter {
    format: OutputFormat,
}

impl OutputWriter {
    /// Create a new output writer with the specified format.
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Render a payload to stdout.
    ///
    /// For `Text` format, delegates to `Render::render_text()`.
    /// For `Json` format, serialises via `serde_json`.
    pub fn render<T: Render + Serialize>(&self, payload: &T) -> Result<(), CliError> {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        match self.format {
            OutputFormat::Text => {
                payload.render_text(&mut handle)?;
            }
            OutputFormat::Json => {
                serde_json::to_writer_pretty(&mut handle, payload)?;
                writeln!(handle)?;
            }
        }
        Ok(())
    }
}

/// Trait for human-readable text rendering.
///
/// Implemented by every CLI output payload alongside `serde::Serialize`.
pub trait Render {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()>;
}

/// Format a UTC timestamp for table columns.
pub(crate) fn short_time(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Colorize a severity label for text output.
pub(crate) fn severity_label(severity: Severity) -> ColoredString {
    match severity {
        Severity::Critical => severity.to_string().red().bold(),
        Severity::Warning => severity.to_string().yellow(),
    }
}

/// Colorize a trust status label for text output.
pub(crate) fn trust_label(status: TrustStatus) -> ColoredString {
    match status {
        TrustStatus::Banned => status.to_string().red().bold(),
        TrustStatus::Trusted => status.to_string().green(),
        TrustStatus::Unknown => status.to_string().normal(),
    }
}
