//! `authwatch config` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use authwatch_core::config::AuthwatchConfig;

use crate::cli::{ConfigAction, ConfigArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

const SECTION_NAMES: &str = "general, fleet, collection, correlation, metrics";

/// Execute the `config` command.
pub async fn execute(
    args: ConfigArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        ConfigAction::Validate => execute_validate(config_path, writer).await,
        ConfigAction::Show { section } => execute_show(config_path, section, writer).await,
    }
}

/// Execute the config validate subcommand.
///
/// Attempts to load and validate the configuration file, reporting any errors.
///
/// # Arguments
///
/// * `config_path` - Path to authwatch.toml configuration file
/// * `writer` - Output writer for rendering results
///
/// # Errors
///
/// Returns `CliError::Config` if validation fails (missing fields, invalid values, parse errors).
async fn execute_validate(config_path: &Path, writer: &OutputWriter) -> Result<(), CliError> {
    info!(path = %config_path.display(), "validating configuration");

    let report = match AuthwatchConfig::load(config_path).await {
        Ok(config) => ConfigValidationReport {
            source: config_path.display().to_string(),
            valid: true,
            hosts: config.fleet.hosts.len(),
            errors: Vec::new(),
        },
        Err(e) => ConfigValidationReport {
            source: config_path.display().to_string(),
            valid: false,
            hosts: 0,
            errors: vec![e.to_string()],
        },
    };

    writer.render(&report)?;

    if !report.valid {
        return Err(CliError::Config("configuration is invalid".to_owned()));
    }

    Ok(())
}

/// Execute the config show subcommand.
///
/// Loads and displays the effective configuration (file + env overrides + defaults).
///
/// # Arguments
///
/// * `config_path` - Path to authwatch.toml configuration file
/// * `section` - Optional section name to display (general, fleet, collection, correlation, metrics)
/// * `writer` - Output writer for rendering results
///
/// # Errors
///
/// Returns `CliError::Config` if loading fails or `CliError::Command` if the section name is invalid.
async fn execute_show(
    config_path: &Path,
    section: Option<String>,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    info!(path = %config_path.display(), "loading configuration");

    let config = AuthwatchConfig::load(config_path).await?;

    let config_toml = match &section {
        Some(name) => section_toml(&config, name).ok_or_else(|| {
            CliError::Command(format!(
                "unknown section: {name} (expected: {SECTION_NAMES})"
            ))
        })?,
        None => toml::to_string_pretty(&config)
            .unwrap_or_else(|e| format!("(serialization error: {})", e)),
    };

    let report = ConfigReport {
        source: config_path.display().to_string(),
        section,
        config_toml,
    };

    writer.render(&report)?;

    Ok(())
}

/// Serialize a single configuration section to TOML.
///
/// Returns `None` for unrecognized section names.
fn section_toml(config: &AuthwatchConfig, name: &str) -> Option<String> {
    let rendered = match name {
        "general" => toml::to_string_pretty(&config.general),
        "fleet" => toml::to_string_pretty(&config.fleet),
        "collection" => toml::to_string_pretty(&config.collection),
        "correlation" => toml::to_string_pretty(&config.correlation),
        "metrics" => toml::to_string_pretty(&config.metrics),
        _ => return None,
    };
    Some(rendered.unwrap_or_else(|e| format!("(serialization error: {})", e)))
}

/// Configuration display report.
///
/// Contains the source file path and serialized TOML configuration.
/// The `config_toml` field is skipped during JSON serialization (only used for text rendering).
#[derive(Serialize)]
pub struct ConfigReport {
    /// Configuration file path
    pub source: String,
    /// Optional section name (None = full config)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    /// Serialized TOML configuration
    #[serde(skip)]
    pub config_toml: String,
}

impl Render for ConfigReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        if let Some(ref section) = self.section {
            let section_label = format!("[{}]", section);
            writeln!(
                w,
                "Configuration {} (source: {})",
                section_label.bold(),
                self.source
            )?;
        } else {
            writeln!(w, "Configuration (source: {})", self.source.bold())?;
        }

        writeln!(w)?;
        write!(w, "{}", self.config_toml)?;

        Ok(())
    }
}

/// Configuration validation report.
///
/// Contains validation result and any error messages encountered.
#[derive(Serialize)]
pub struct ConfigValidationReport {
    /// Configuration file path
    pub source: String,
    /// Whether the configuration is valid
    pub valid: bool,
    /// Number of fleet hosts defined (0 when invalid)
    pub hosts: usize,
    /// Validation error messages (empty if valid)
    pub errors: Vec<String>,
}

impl Render for ConfigValidationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Config Validation: {}", self.source.bold())?;

        if self.valid {
            writeln!(
                w,
                "  Result: {} ({} hosts configured)",
                "VALID".green().bold(),
                self.hosts
            )?;
        } else {
            writeln!(w, "  Result: {}", "INVALID".red().bold())?;
            for err in &self.errors {
                writeln!(w, "  Error: {}", err.red())?;
            }
        }

        Ok(())
    }
}
