//! `authwatch alerts` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;

use authwatch_core::config::AuthwatchConfig;
use authwatch_core::event::Alert;
use authwatch_core::types::Severity;
use authwatch_log_pipeline::DataStore;

use crate::cli::AlertsArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render, severity_label, short_time};

/// Execute the `alerts` command: show recent correlation alerts.
pub async fn execute(
    args: AlertsArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let min_severity = args
        .severity
        .as_deref()
        .map(|s| {
            Severity::from_str_loose(s).ok_or_else(|| {
                CliError::Command(format!(
                    "invalid severity: {s} (expected: warning, critical)"
                ))
            })
        })
        .transpose()?;

    let config = AuthwatchConfig::load(config_path).await?;
    let store = DataStore::open(&config.general.data_dir)?;

    // Filter before applying the limit so `--severity critical` still
    // fills the window with matching alerts.
    let mut alerts = store.recent_alerts(usize::MAX)?;
    if let Some(min) = min_severity {
        alerts.retain(|alert| alert.severity >= min);
    }
    alerts.truncate(args.limit);

    let report = build_alerts_report(alerts, args.limit, min_severity);

    writer.render(&report)?;

    Ok(())
}

/// Build the alerts report. `alerts` must already be sorted newest first.
pub fn build_alerts_report(
    alerts: Vec<Alert>,
    limit: usize,
    min_severity: Option<Severity>,
) -> AlertsReport {
    AlertsReport {
        shown: alerts.len(),
        limit,
        min_severity: min_severity.map(|s| s.to_string()),
        alerts,
    }
}

#[derive(Serialize)]
pub struct AlertsReport {
    pub shown: usize,
    pub limit: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_severity: Option<String>,
    pub alerts: Vec<Alert>,
}

impl Render for AlertsReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        if self.alerts.is_empty() {
            writeln!(w, "No alerts recorded.")?;
            return Ok(());
        }

        writeln!(
            w,
            "Recent alerts (showing {} of up to {}):",
            self.shown, self.limit
        )?;
        writeln!(w, "{}", "-".repeat(90))?;

        for alert in &self.alerts {
            writeln!(
                w,
                "{}  {:<10} {:<12} {} (from {})",
                short_time(alert.timestamp),
                severity_label(alert.severity),
                alert.host_id,
                alert.message,
                alert.source_ip
            )?;
        }

        Ok(())
    }
}
