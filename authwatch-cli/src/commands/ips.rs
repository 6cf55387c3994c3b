//! `authwatch ips` command handler

use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use authwatch_core::config::AuthwatchConfig;
use authwatch_core::types::TrustStatus;
use authwatch_log_pipeline::TrustRegistry;

use crate::cli::{IpsAction, IpsArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render, short_time, trust_label};

/// Execute the `ips` command: inspect or edit the IP trust registry.
pub async fn execute(
    args: IpsArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let config = AuthwatchConfig::load(config_path).await?;
    let data_dir = Path::new(&config.general.data_dir);

    match args.action {
        IpsAction::List => {
            let registry = TrustRegistry::load(data_dir)?;
            let report = build_list_report(&registry);
            writer.render(&report)?;
            Ok(())
        }
        IpsAction::Set { ip, status } => {
            if ip.parse::<std::net::IpAddr>().is_err() {
                return Err(CliError::Command(format!("invalid IP address: {ip}")));
            }
            let status = TrustStatus::from_str_loose(&status).ok_or_else(|| {
                CliError::Command(format!(
                    "invalid trust status: {status} (expected: unknown, trusted, banned)"
                ))
            })?;

            let mut registry = TrustRegistry::load(data_dir)?;
            let created = registry.get(&ip).is_none();
            registry.set_status(&ip, status, Utc::now());
            registry.save()?;

            let report = IpsChangeReport {
                action: "set",
                ip,
                status: Some(status.to_string()),
                created: Some(created),
                removed: None,
            };
            writer.render(&report)?;
            Ok(())
        }
        IpsAction::Remove { ip } => {
            let mut registry = TrustRegistry::load(data_dir)?;
            let removed = registry.remove(&ip);
            if removed {
                registry.save()?;
            }

            let report = IpsChangeReport {
                action: "remove",
                ip: ip.clone(),
                status: None,
                created: None,
                removed: Some(removed),
            };
            writer.render(&report)?;

            if !removed {
                return Err(CliError::Command(format!(
                    "ip {ip} was not in the registry"
                )));
            }
            Ok(())
        }
    }
}

/// Build the registry listing, ordered by most recent sighting.
pub fn build_list_report(registry: &TrustRegistry) -> IpsListReport {
    IpsListReport {
        total: registry.len(),
        entries: registry
            .entries_by_last_seen()
            .into_iter()
            .map(|entry| IpEntryRow {
                ip: entry.ip.clone(),
                status: entry.status.to_string(),
                last_seen: entry.last_seen,
            })
            .collect(),
    }
}

#[derive(Serialize)]
pub struct IpsListReport {
    pub total: usize,
    pub entries: Vec<IpEntryRow>,
}

#[derive(Serialize)]
pub struct IpEntryRow {
    pub ip: String,
    pub status: String,
    pub last_seen: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct IpsChangeReport {
    pub action: &'static str,
    pub ip: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed: Option<bool>,
}

impl Render for IpsListReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        if self.entries.is_empty() {
            writeln!(w, "No IPs in the registry.")?;
            return Ok(());
        }

        writeln!(w, "{:<40} {:<10} Last seen", "IP", "Status")?;
        writeln!(w, "{}", "-".repeat(72))?;
        for entry in &self.entries {
            // Reparse for the colored label; keep the report itself plain strings
            let label = TrustStatus::from_str_loose(&entry.status)
                .map(trust_label)
                .unwrap_or_else(|| entry.status.normal());
            writeln!(
                w,
                "{:<40} {:<10} {}",
                entry.ip,
                label,
                short_time(entry.last_seen)
            )?;
        }
        writeln!(w)?;
        writeln!(w, "{} IPs total", self.total)?;

        Ok(())
    }
}

impl Render for IpsChangeReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        match self.action {
            "set" => {
                let status = self.status.as_deref().unwrap_or("?");
                let label = TrustStatus::from_str_loose(status)
                    .map(trust_label)
                    .unwrap_or_else(|| status.normal());
                if self.created == Some(true) {
                    writeln!(w, "Marked {} as {} (new entry)", self.ip, label)?;
                } else {
                    writeln!(w, "Marked {} as {}", self.ip, label)?;
                }
            }
            _ => {
                if self.removed == Some(true) {
                    writeln!(w, "Removed {} from the registry", self.ip)?;
                } else {
                    writeln!(w, "{} is not in the registry", self.ip)?;
                }
            }
        }

        Ok(())
    }
}
