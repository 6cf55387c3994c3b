//! `authwatch status` command handler

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use authwatch_core::config::AuthwatchConfig;
use authwatch_core::event::ArchiveRecord;
use authwatch_core::types::TrustStatus;
use authwatch_log_pipeline::{DataStore, TrustRegistry};

use crate::cli::StatusArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render, short_time};

/// Execute the `status` command.
pub async fn execute(
    args: StatusArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let config = AuthwatchConfig::load(config_path).await?;

    let store = DataStore::open(&config.general.data_dir)?;
    let watermarks = store.load_watermarks()?;
    let archives = store.recent_archives(usize::MAX)?;
    let registry = TrustRegistry::load(Path::new(&config.general.data_dir))?;
    let pid = daemon_pid(&config.general.pid_file);

    let report = build_status_report(&config, &watermarks, &archives, &registry, pid, args.verbose);

    writer.render(&report)?;

    Ok(())
}

/// Build the status report from loaded daemon state.
///
/// `archives` must be sorted newest first, as returned by
/// [`DataStore::recent_archives`].
pub fn build_status_report(
    config: &AuthwatchConfig,
    watermarks: &BTreeMap<String, DateTime<Utc>>,
    archives: &[ArchiveRecord],
    registry: &TrustRegistry,
    daemon_pid: Option<u32>,
    verbose: bool,
) -> StatusReport {
    let hosts = config
        .fleet
        .hosts
        .iter()
        .map(|host| {
            let mut batches = 0;
            let mut events_archived = 0;
            let mut last_batch = None;
            for record in archives.iter().filter(|r| r.host_id == host.id) {
                if last_batch.is_none() {
                    last_batch = Some(record.filename.clone());
                }
                batches += 1;
                events_archived += record.record_count;
            }

            HostStatus {
                id: host.id.clone(),
                os: host.os.as_str().to_owned(),
                address: host.address.clone(),
                watermark: watermarks.get(&host.id).copied(),
                batches,
                events_archived,
                last_batch,
                connection: verbose
                    .then(|| format!("{}@{}:{}", host.username, host.address, host.port)),
            }
        })
        .collect();

    StatusReport {
        daemon_running: daemon_pid.is_some(),
        daemon_pid,
        data_dir: config.general.data_dir.clone(),
        sweep_interval_secs: config.fleet.sweep_interval_secs,
        hosts,
        registry: RegistrySummary {
            known_ips: registry.len(),
            trusted: registry.count_with_status(TrustStatus::Trusted),
            banned: registry.count_with_status(TrustStatus::Banned),
        },
    }
}

/// Check whether a daemon instance owns the PID file.
///
/// Returns the PID when the file names a live process. A missing file,
/// unreadable file, or stale PID all read as "not running".
pub fn daemon_pid(pid_file: &str) -> Option<u32> {
    if pid_file.is_empty() {
        return None;
    }
    let pid_path = Path::new(pid_file);
    if !pid_path.exists() {
        debug!(pid_file, "pid file does not exist");
        return None;
    }

    let pid_content = match std::fs::read_to_string(pid_path) {
        Ok(content) => content,
        Err(e) => {
            warn!(pid_file, error = %e, "failed to read pid file");
            return None;
        }
    };

    let pid = match pid_content.trim().parse::<u32>() {
        Ok(p) => p,
        Err(e) => {
            warn!(pid_file, error = %e, "failed to parse pid");
            return None;
        }
    };

    is_process_alive(pid).then_some(pid)
}

/// Check if a process with the given PID is alive.
#[cfg(unix)]
fn is_process_alive(pid: u32) -> bool {
    use std::io::ErrorKind;

    // Send signal 0 to check if process exists
    // SAFETY: kill(2) with signal 0 is safe and does not affect the target process
    let result = unsafe { libc::kill(pid as libc::pid_t, 0) };

    if result == 0 {
        true
    } else {
        let err = std::io::Error::last_os_error();
        match err.kind() {
            ErrorKind::PermissionDenied => true, // Process exists but we can't signal it
            _ => false,
        }
    }
}

#[cfg(not(unix))]
fn is_process_alive(_pid: u32) -> bool {
    warn!("process liveness check not supported on this platform");
    false
}

#[derive(Serialize)]
pub struct StatusReport {
    pub daemon_running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daemon_pid: Option<u32>,
    pub data_dir: String,
    pub sweep_interval_secs: u64,
    pub hosts: Vec<HostStatus>,
    pub registry: RegistrySummary,
}

#[derive(Serialize)]
pub struct HostStatus {
    pub id: String,
    pub os: String,
    pub address: String,
    /// Collection watermark; `None` until the first committed cycle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watermark: Option<DateTime<Utc>>,
    pub batches: usize,
    pub events_archived: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_batch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection: Option<String>,
}

#[derive(Serialize)]
pub struct RegistrySummary {
    pub known_ips: usize,
    pub trusted: usize,
    pub banned: usize,
}

impl Render for StatusReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        if let Some(pid) = self.daemon_pid {
            writeln!(w, "Daemon: {} (pid {})", "running".green().bold(), pid)?;
        } else {
            writeln!(w, "Daemon: {}", "not running".red().bold())?;
        }
        writeln!(
            w,
            "Data dir: {} (sweep every {}s)",
            self.data_dir, self.sweep_interval_secs
        )?;

        writeln!(w)?;
        if self.hosts.is_empty() {
            writeln!(w, "No hosts configured.")?;
        } else {
            writeln!(
                w,
                "{:<16} {:<9} {:<20} {:>8} {:>8}  Last batch",
                "Host", "OS", "Watermark", "Batches", "Events"
            )?;
            writeln!(w, "{}", "-".repeat(90))?;

            for h in &self.hosts {
                let watermark = h
                    .watermark
                    .map(short_time)
                    .unwrap_or_else(|| "never fetched".to_owned());
                writeln!(
                    w,
                    "{:<16} {:<9} {:<20} {:>8} {:>8}  {}",
                    h.id,
                    h.os,
                    watermark,
                    h.batches,
                    h.events_archived,
                    h.last_batch.as_deref().unwrap_or("-")
                )?;

                if let Some(connection) = &h.connection {
                    writeln!(w, "  {}", connection.dimmed())?;
                }
            }
        }

        writeln!(w)?;
        writeln!(
            w,
            "Registry: {} known IPs ({} trusted, {} banned)",
            self.registry.known_ips, self.registry.trusted, self.registry.banned
        )?;

        Ok(())
    }
}
