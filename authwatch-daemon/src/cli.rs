//! CLI argument definitions for authwatch-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

use authwatch_core::config::AuthwatchConfig;

/// Authwatch fleet authentication monitoring daemon.
///
/// Periodically sweeps the configured fleet over SSH, normalizes
/// authentication logs, persists batches, and raises correlation alerts.
#[derive(Parser, Debug)]
#[command(name = "authwatch-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to authwatch.toml configuration file.
    #[arg(short, long, default_value = "/etc/authwatch/authwatch.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration file and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,

    /// Override PID file path (takes precedence over config file).
    #[arg(long)]
    pub pid_file: Option<String>,
}

impl DaemonCli {
    /// Apply CLI overrides onto a loaded configuration.
    ///
    /// The caller should re-run `config.validate()` afterwards, since
    /// override values come from the operator and may be invalid.
    pub fn apply_overrides(&self, config: &mut AuthwatchConfig) {
        if let Some(level) = &self.log_level {
            config.general.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.general.log_format = format.clone();
        }
        if let Some(pid_file) = &self.pid_file {
            config.general.pid_file = pid_file.clone();
        }
    }
}
