//! `authwatch fetch` command handler

use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use authwatch_core::config::AuthwatchConfig;
use authwatch_core::event::Alert;
use authwatch_log_pipeline::{AnalysisStats, CycleOutcome, PipelineConfig, fetch_host_once};

use crate::cli::FetchArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render, severity_label, short_time};

/// Execute the `fetch` command: run one collection cycle for a single host.
pub async fn execute(
    args: FetchArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let config = AuthwatchConfig::load(config_path).await?;

    // A manual cycle must not race the daemon over watermarks and batches.
    if let Some(pid) = super::status::daemon_pid(&config.general.pid_file) {
        return Err(CliError::Command(format!(
            "daemon appears to be running (pid {pid}); stop it before running a manual fetch"
        )));
    }

    let pipeline_config = PipelineConfig::from_core(&config);

    info!(host = %args.host, "starting manual fetch cycle");
    let outcome = fetch_host_once(&pipeline_config, &args.host).await?;

    let report = build_fetch_report(&args.host, &outcome);
    writer.render(&report)?;

    if let CycleOutcome::Failed { step, reason } = outcome {
        return Err(CliError::Command(format!(
            "cycle failed at {}: {}",
            step.as_str(),
            reason
        )));
    }

    Ok(())
}

/// Build the fetch report from a cycle outcome.
pub fn build_fetch_report(host_id: &str, outcome: &CycleOutcome) -> FetchReport {
    match outcome {
        CycleOutcome::Committed(cycle) => FetchReport {
            host_id: host_id.to_owned(),
            outcome: "committed",
            cycle: Some(CycleSummary {
                batch_file: cycle.filename.clone(),
                entries_collected: cycle.entries_collected,
                events_normalized: cycle.events_normalized,
                malformed: cycle.malformed,
                watermark: cycle.watermark,
                analysis: AnalysisSummary::from(cycle.stats),
                alerts: cycle.alerts.clone(),
            }),
            failed_step: None,
            failure: None,
        },
        CycleOutcome::NoData => FetchReport {
            host_id: host_id.to_owned(),
            outcome: "no-data",
            cycle: None,
            failed_step: None,
            failure: None,
        },
        CycleOutcome::Failed { step, reason } => FetchReport {
            host_id: host_id.to_owned(),
            outcome: "failed",
            cycle: None,
            failed_step: Some(step.as_str()),
            failure: Some(reason.clone()),
        },
    }
}

#[derive(Serialize)]
pub struct FetchReport {
    pub host_id: String,
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycle: Option<CycleSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

#[derive(Serialize)]
pub struct CycleSummary {
    pub batch_file: String,
    pub entries_collected: usize,
    pub events_normalized: usize,
    pub malformed: usize,
    pub watermark: DateTime<Utc>,
    pub analysis: AnalysisSummary,
    pub alerts: Vec<Alert>,
}

#[derive(Serialize)]
pub struct AnalysisSummary {
    pub events_in: usize,
    pub non_attack: usize,
    pub local_skipped: usize,
    pub deduplicated: usize,
    pub trusted_suppressed: usize,
    pub cross_host: usize,
    pub banned_hits: usize,
}

impl From<AnalysisStats> for AnalysisSummary {
    fn from(stats: AnalysisStats) -> Self {
        Self {
            events_in: stats.events_in,
            non_attack: stats.non_attack,
            local_skipped: stats.local_skipped,
            deduplicated: stats.deduplicated,
            trusted_suppressed: stats.trusted_suppressed,
            cross_host: stats.cross_host,
            banned_hits: stats.banned_hits,
        }
    }
}

impl Render for FetchReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        match self.outcome {
            "committed" => writeln!(
                w,
                "Fetch cycle for {}: {}",
                self.host_id,
                "COMMITTED".green().bold()
            )?,
            "no-data" => {
                writeln!(w, "Fetch cycle for {}: {}", self.host_id, "NO DATA".dimmed())?;
                writeln!(w, "  Nothing new since the last watermark.")?;
            }
            _ => writeln!(
                w,
                "Fetch cycle for {}: {}",
                self.host_id,
                "FAILED".red().bold()
            )?,
        }

        if let Some(cycle) = &self.cycle {
            writeln!(w, "  Batch file: {}", cycle.batch_file)?;
            writeln!(
                w,
                "  Collected:  {} entries ({} events, {} malformed)",
                cycle.entries_collected, cycle.events_normalized, cycle.malformed
            )?;
            writeln!(w, "  Watermark:  {}", short_time(cycle.watermark))?;

            let a = &cycle.analysis;
            writeln!(w, "  Analysis:")?;
            writeln!(w, "    events in:          {}", a.events_in)?;
            writeln!(w, "    non-attack:         {}", a.non_attack)?;
            writeln!(w, "    local skipped:      {}", a.local_skipped)?;
            writeln!(w, "    deduplicated:       {}", a.deduplicated)?;
            writeln!(w, "    trusted suppressed: {}", a.trusted_suppressed)?;
            writeln!(w, "    cross-host:         {}", a.cross_host)?;
            writeln!(w, "    banned-ip hits:     {}", a.banned_hits)?;

            if cycle.alerts.is_empty() {
                writeln!(w, "  Alerts: none")?;
            } else {
                writeln!(w, "  Alerts ({}):", cycle.alerts.len())?;
                for alert in &cycle.alerts {
                    writeln!(
                        w,
                        "    {} {} {} (from {})",
                        short_time(alert.timestamp),
                        severity_label(alert.severity),
                        alert.message,
                        alert.source_ip
                    )?;
                }
            }
        }

        if let Some(step) = self.failed_step {
            writeln!(w, "  Step:   {}", step)?;
        }
        if let Some(failure) = &self.failure {
            writeln!(w, "  Reason: {}", failure)?;
        }

        Ok(())
    }
}
