//! CLI argument parsing using clap derive API
//!
//! This module defines the command-line interface structure using clap's
//! derive macros. It is purely declarative with no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Authwatch -- fleet authentication abuse monitor.
///
/// Use `authwatch <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "authwatch", version, about, long_about = None)]
pub struct Cli {
    /// Path to the authwatch.toml configuration file.
    #[arg(short, long, default_value = "/etc/authwatch/authwatch.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table / text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one collection cycle for a single host now.
    Fetch(FetchArgs),

    /// Show fleet status: hosts, watermarks, archives, registry.
    Status(StatusArgs),

    /// Show recent alerts from the alert ledger.
    Alerts(AlertsArgs),

    /// Manage the IP trust registry.
    Ips(IpsArgs),

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- fetch ----

/// Run one collection cycle for a single host.
#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Host id from the fleet configuration.
    #[arg(long)]
    pub host: String,
}

// ---- status ----

/// Display fleet and daemon status.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Show connection details per host.
    #[arg(short, long)]
    pub verbose: bool,
}

// ---- alerts ----

/// Display recent alerts, newest first.
#[derive(Args, Debug)]
pub struct AlertsArgs {
    /// Maximum number of alerts to show.
    #[arg(long, default_value_t = 20)]
    pub limit: usize,

    /// Minimum severity to show (warning, critical).
    #[arg(long)]
    pub severity: Option<String>,
}

// ---- ips ----

/// Manage the IP trust registry.
#[derive(Args, Debug)]
pub struct IpsArgs {
    #[command(subcommand)]
    pub action: IpsAction,
}

#[derive(Subcommand, Debug)]
pub enum IpsAction {
    /// List registry entries, most recently seen first.
    List,
    /// Set the trust status of an IP (unknown, trusted, banned).
    Set {
        /// Source IP address.
        ip: String,
        /// Trust status to assign.
        status: String,
    },
    /// Remove an IP from the registry.
    Remove {
        /// Source IP address.
        ip: String,
    },
}

// ---- config ----

/// Manage authwatch configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only a specific section (general, fleet, collection, correlation, metrics).
        #[arg(long)]
        section: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parse_fetch_with_host() {
        let args = Cli::try_parse_from(["authwatch", "fetch", "--host", "web-01"]);
        assert!(args.is_ok(), "should parse 'fetch --host' subcommand");
        let cli = args.expect("parse succeeded");
        match cli.command {
            Commands::Fetch(fetch_args) => {
                assert_eq!(fetch_args.host, "web-01", "host id should match");
            }
            _ => panic!("expected Fetch command"),
        }
    }

    #[test]
    fn test_cli_parse_fetch_without_host_fails() {
        let args = Cli::try_parse_from(["authwatch", "fetch"]);
        assert!(args.is_err(), "fetch should require --host");
    }

    #[test]
    fn test_cli_parse_status_basic() {
        let args = Cli::try_parse_from(["authwatch", "status"]);
        assert!(args.is_ok(), "should parse 'status' subcommand");
        let cli = args.expect("parse succeeded");
        match cli.command {
            Commands::Status(status_args) => {
                assert!(!status_args.verbose, "verbose should default to false");
            }
            _ => panic!("expected Status command"),
        }
    }

    #[test]
    fn test_cli_parse_status_verbose() {
        let args = Cli::try_parse_from(["authwatch", "status", "-v"]);
        assert!(args.is_ok(), "should parse 'status -v' subcommand");
        let cli = args.expect("parse succeeded");
        match cli.command {
            Commands::Status(status_args) => {
                assert!(status_args.verbose, "verbose should be true");
            }
            _ => panic!("expected Status command"),
        }
    }

    #[test]
    fn test_cli_parse_alerts_defaults() {
        let args = Cli::try_parse_from(["authwatch", "alerts"]);
        assert!(args.is_ok(), "should parse 'alerts' subcommand");
        let cli = args.expect("parse succeeded");
        match cli.command {
            Commands::Alerts(alerts_args) => {
                assert_eq!(alerts_args.limit, 20, "limit should default to 20");
                assert!(alerts_args.severity.is_none(), "severity should be None");
            }
            _ => panic!("expected Alerts command"),
        }
    }

    #[test]
    fn test_cli_parse_alerts_with_limit() {
        let args = Cli::try_parse_from(["authwatch", "alerts", "--limit", "5"]);
        assert!(args.is_ok(), "should parse alerts with limit");
        let cli = args.expect("parse succeeded");
        match cli.command {
            Commands::Alerts(alerts_args) => {
                assert_eq!(alerts_args.limit, 5);
            }
            _ => panic!("expected Alerts command"),
        }
    }

    #[test]
    fn test_cli_parse_alerts_with_severity() {
        let args = Cli::try_parse_from(["authwatch", "alerts", "--severity", "critical"]);
        assert!(args.is_ok(), "should parse alerts with severity filter");
        let cli = args.expect("parse succeeded");
        match cli.command {
            Commands::Alerts(alerts_args) => {
                assert_eq!(alerts_args.severity, Some("critical".to_owned()));
            }
            _ => panic!("expected Alerts command"),
        }
    }

    #[test]
    fn test_cli_parse_ips_list() {
        let args = Cli::try_parse_from(["authwatch", "ips", "list"]);
        assert!(args.is_ok(), "should parse 'ips list' subcommand");
        let cli = args.expect("parse succeeded");
        match cli.command {
            Commands::Ips(ips_args) => match ips_args.action {
                IpsAction::List => {}
                _ => panic!("expected List action"),
            },
            _ => panic!("expected Ips command"),
        }
    }

    #[test]
    fn test_cli_parse_ips_set() {
        let args = Cli::try_parse_from(["authwatch", "ips", "set", "203.0.113.9", "banned"]);
        assert!(args.is_ok(), "should parse 'ips set' subcommand");
        let cli = args.expect("parse succeeded");
        match cli.command {
            Commands::Ips(ips_args) => match ips_args.action {
                IpsAction::Set { ip, status } => {
                    assert_eq!(ip, "203.0.113.9");
                    assert_eq!(status, "banned");
                }
                _ => panic!("expected Set action"),
            },
            _ => panic!("expected Ips command"),
        }
    }

    #[test]
    fn test_cli_parse_ips_set_requires_status() {
        let args = Cli::try_parse_from(["authwatch", "ips", "set", "203.0.113.9"]);
        assert!(args.is_err(), "ips set should require a status argument");
    }

    #[test]
    fn test_cli_parse_ips_remove() {
        let args = Cli::try_parse_from(["authwatch", "ips", "remove", "203.0.113.9"]);
        assert!(args.is_ok(), "should parse 'ips remove' subcommand");
        let cli = args.expect("parse succeeded");
        match cli.command {
            Commands::Ips(ips_args) => match ips_args.action {
                IpsAction::Remove { ip } => {
                    assert_eq!(ip, "203.0.113.9");
                }
                _ => panic!("expected Remove action"),
            },
            _ => panic!("expected Ips command"),
        }
    }

    #[test]
    fn test_cli_parse_config_validate() {
        let args = Cli::try_parse_from(["authwatch", "config", "validate"]);
        assert!(args.is_ok(), "should parse 'config validate' subcommand");
        let cli = args.expect("parse succeeded");
        match cli.command {
            Commands::Config(config_args) => match config_args.action {
                ConfigAction::Validate => {}
                _ => panic!("expected Validate action"),
            },
            _ => panic!("expected Config command"),
        }
    }

    #[test]
    fn test_cli_parse_config_show() {
        let args = Cli::try_parse_from(["authwatch", "config", "show"]);
        assert!(args.is_ok(), "should parse 'config show' subcommand");
        let cli = args.expect("parse succeeded");
        match cli.command {
            Commands::Config(config_args) => match config_args.action {
                ConfigAction::Show { section } => {
                    assert!(section.is_none(), "section should be None");
                }
                _ => panic!("expected Show action"),
            },
            _ => panic!("expected Config command"),
        }
    }

    #[test]
    fn test_cli_parse_config_show_section() {
        let args = Cli::try_parse_from(["authwatch", "config", "show", "--section", "fleet"]);
        assert!(args.is_ok(), "should parse config show with section");
        let cli = args.expect("parse succeeded");
        match cli.command {
            Commands::Config(config_args) => match config_args.action {
                ConfigAction::Show { section } => {
                    assert_eq!(section, Some("fleet".to_owned()));
                }
                _ => panic!("expected Show action"),
            },
            _ => panic!("expected Config command"),
        }
    }

    #[test]
    fn test_cli_parse_custom_config_path() {
        let args = Cli::try_parse_from(["authwatch", "-c", "/custom/config.toml", "status"]);
        assert!(args.is_ok(), "should parse with custom config path");
        let cli = args.expect("parse succeeded");
        assert_eq!(cli.config, std::path::PathBuf::from("/custom/config.toml"));
    }

    #[test]
    fn test_cli_parse_log_level() {
        let args = Cli::try_parse_from(["authwatch", "--log-level", "debug", "status"]);
        assert!(args.is_ok(), "should parse with custom log level");
        let cli = args.expect("parse succeeded");
        assert_eq!(cli.log_level, Some("debug".to_owned()));
    }

    #[test]
    fn test_cli_parse_output_format_json() {
        let args = Cli::try_parse_from(["authwatch", "--output", "json", "status"]);
        assert!(args.is_ok(), "should parse with json output format");
        let cli = args.expect("parse succeeded");
        match cli.output {
            OutputFormat::Json => {}
            _ => panic!("expected Json output format"),
        }
    }

    #[test]
    fn test_cli_parse_output_format_text() {
        let args = Cli::try_parse_from(["authwatch", "--output", "text", "status"]);
        assert!(args.is_ok(), "should parse with text output format");
        let cli = args.expect("parse succeeded");
        match cli.output {
            OutputFormat::Text => {}
            _ => panic!("expected Text output format"),
        }
    }

    #[test]
    fn test_cli_parse_global_flag_after_subcommand() {
        let args = Cli::try_parse_from(["authwatch", "alerts", "--output", "json"]);
        assert!(args.is_ok(), "global flags should parse after the subcommand");
        let cli = args.expect("parse succeeded");
        match cli.output {
            OutputFormat::Json => {}
            _ => panic!("expected Json output format"),
        }
    }

    #[test]
    fn test_cli_parse_invalid_command_fails() {
        let args = Cli::try_parse_from(["authwatch", "invalid-command"]);
        assert!(args.is_err(), "should fail on invalid command");
    }

    #[test]
    fn test_cli_parse_missing_command_fails() {
        let args = Cli::try_parse_from(["authwatch"]);
        assert!(args.is_err(), "should fail when no command provided");
    }

    #[test]
    fn test_cli_verify_command_structure() {
        let cmd = Cli::command();
        assert_eq!(cmd.get_name(), "authwatch");

        let subcommands: Vec<_> = cmd.get_subcommands().map(|s| s.get_name()).collect();
        assert!(
            subcommands.contains(&"fetch"),
            "should have 'fetch' subcommand"
        );
        assert!(
            subcommands.contains(&"status"),
            "should have 'status' subcommand"
        );
        assert!(
            subcommands.contains(&"alerts"),
            "should have 'alerts' subcommand"
        );
        assert!(subcommands.contains(&"ips"), "should have 'ips' subcommand");
        assert!(
            subcommands.contains(&"config"),
            "should have 'config' subcommand"
        );
    }
}
