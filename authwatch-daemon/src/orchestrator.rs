//! Daemon orchestration -- pipeline assembly, PID handling, and lifecycle.
//!
//! The [`Orchestrator`] is the central coordinator of `authwatch-daemon`.
//! It validates configuration, builds the fetch pipeline, writes the PID
//! file, runs the signal loop, and performs graceful shutdown.
//!
//! # Lifecycle
//!
//! 1. Build: validate config, install metrics recorder, build the pipeline
//! 2. Run: write PID file, start the pipeline, spawn alert log + uptime tasks
//! 3. Wait: SIGTERM/SIGINT, logging a health report between signals
//! 4. Shutdown: broadcast to tasks, stop the pipeline, remove the PID file
//!
//! Shutdown waits for an in-flight sweep to finish its commits, so the
//! data directory is never left with a half-applied cycle.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};
use tokio::time::MissedTickBehavior;

use authwatch_core::config::AuthwatchConfig;
use authwatch_core::event::Alert;
use authwatch_core::pipeline::Pipeline;
use authwatch_core::types::Severity;
use authwatch_log_pipeline::{FetchPipeline, FetchPipelineBuilder, PipelineConfig};

use crate::health::DaemonHealth;
use crate::metrics_server;

/// Seconds between periodic health report log lines.
const HEALTH_REPORT_INTERVAL_SECS: u64 = 60;

/// Seconds between uptime gauge refreshes.
const UPTIME_REFRESH_SECS: u64 = 10;

/// The main daemon orchestrator.
///
/// Owns the fetch pipeline and the daemon-level background tasks
/// (alert log, uptime gauge). `run()` blocks until a shutdown signal
/// arrives, then tears everything down in order.
#[derive(Debug)]
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: AuthwatchConfig,
    /// The fleet fetch pipeline.
    pipeline: FetchPipeline,
    /// Receiver for alerts committed by the pipeline (taken by `run`).
    alert_rx: Option<mpsc::Receiver<Alert>>,
    /// Shutdown broadcast sender (signals all background tasks).
    shutdown_tx: broadcast::Sender<()>,
    /// Daemon start time (for uptime reporting).
    start_time: Instant,
}

impl Orchestrator {
    /// Load configuration from a file and build the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, if
    /// validation fails, or if the pipeline fails to initialize.
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = AuthwatchConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config).await
    }

    /// Build from an already-loaded configuration.
    ///
    /// Useful for testing or when CLI overrides have been applied
    /// after loading.
    pub async fn build_from_config(config: AuthwatchConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        // Install the metrics recorder before the pipeline records anything
        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
            record_build_info();
            tracing::info!(port = config.metrics.port, "metrics endpoint enabled");
        }

        let pipeline_config = PipelineConfig::from_core(&config);
        let (pipeline, alert_rx) = FetchPipelineBuilder::new()
            .config(pipeline_config)
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build fetch pipeline: {}", e))?;

        let (shutdown_tx, _) = broadcast::channel(16);

        tracing::info!(
            hosts = pipeline.host_count(),
            sweep_interval_secs = config.fleet.sweep_interval_secs,
            data_dir = %config.general.data_dir,
            "orchestrator initialized"
        );

        Ok(Self {
            config,
            pipeline,
            alert_rx,
            shutdown_tx,
            start_time: Instant::now(),
        })
    }

    /// Start the pipeline and enter the main event loop.
    ///
    /// This method blocks until a shutdown signal is received.
    ///
    /// # Shutdown Triggers
    ///
    /// - `SIGTERM` (from systemd, Docker, or `kill`)
    /// - `SIGINT` (Ctrl+C)
    pub async fn run(&mut self) -> Result<()> {
        let pid_path = (!self.config.general.pid_file.is_empty())
            .then(|| PathBuf::from(&self.config.general.pid_file));

        if let Some(path) = &pid_path {
            write_pid_file(path)?;
        }

        tracing::info!("starting fetch pipeline");
        if let Err(e) = self.pipeline.start().await {
            tracing::error!(error = %e, "fetch pipeline failed to start");
            if let Some(path) = &pid_path {
                remove_pid_file(path);
            }
            return Err(e.into());
        }

        // Mirror committed alerts into the daemon log
        let mut alert_logger = self
            .alert_rx
            .take()
            .map(|rx| spawn_alert_logger(rx, self.shutdown_tx.subscribe()));

        let mut uptime_updater = self
            .config
            .metrics
            .enabled
            .then(|| spawn_uptime_updater(self.start_time, self.shutdown_tx.subscribe()));

        tracing::info!("entering main event loop");
        let signal = self.wait_and_report_health().await?;
        tracing::info!(signal = signal, "shutdown signal received");

        tracing::info!("broadcasting shutdown signal to all tasks");
        let _ = self.shutdown_tx.send(());

        if let Some(task) = alert_logger.take() {
            let _ = task.await;
        }
        if let Some(task) = uptime_updater.take() {
            let _ = task.await;
        }

        // Stop the pipeline before removing the PID file: the PID file
        // must mark the process as alive while commits are in flight.
        let stop_result = self.shutdown().await;

        if let Some(path) = &pid_path {
            remove_pid_file(path);
        }

        stop_result
    }

    /// Wait for a shutdown signal, logging a health report between ticks.
    async fn wait_and_report_health(&self) -> Result<&'static str> {
        let mut health_interval =
            tokio::time::interval(Duration::from_secs(HEALTH_REPORT_INTERVAL_SECS));
        health_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let shutdown = wait_for_shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                signal = &mut shutdown => return signal,
                _ = health_interval.tick() => {
                    self.health().await.log();
                }
            }
        }
    }

    /// Perform graceful shutdown of the pipeline.
    ///
    /// An in-flight sweep finishes its commits before this returns.
    async fn shutdown(&mut self) -> Result<()> {
        tracing::info!("stopping fetch pipeline");
        self.pipeline.stop().await.map_err(|e| e.into())
    }

    /// Get the current aggregated health report.
    pub async fn health(&self) -> DaemonHealth {
        let report = DaemonHealth::collect(&self.pipeline, self.start_time).await;

        if self.config.metrics.enabled {
            use authwatch_core::metrics as m;
            #[allow(clippy::cast_precision_loss)]
            metrics::gauge!(m::DAEMON_UPTIME_SECONDS).set(report.uptime_secs as f64);
        }

        report
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &AuthwatchConfig {
        &self.config
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
///
/// # Errors
///
/// Returns an error if signal handlers cannot be installed.
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Write the current process PID to a file.
///
/// Used to prevent duplicate daemon instances.
///
/// # Security
///
/// - `create_new(true)` creates the file atomically (no TOCTOU window)
/// - The created file must be a regular file (rejects special files)
/// - Parent directory is created with mode 0o700, the file gets 0o600
///
/// # Errors
///
/// Returns an error if the file already exists or cannot be written.
pub fn write_pid_file(path: &Path) -> Result<()> {
    use std::fs::{self, OpenOptions};
    use std::io::{ErrorKind, Write};

    if let Some(parent) = path.parent() {
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            let mut builder = fs::DirBuilder::new();
            builder.mode(0o700).recursive(true);
            builder.create(parent)?;
        }
        #[cfg(not(unix))]
        {
            fs::create_dir_all(parent)?;
        }
    }

    let pid = std::process::id();

    // create_new is atomic: either this process owns the file or it fails
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            let existing = fs::read_to_string(path).unwrap_or_else(|_| "unknown".to_owned());
            return Err(anyhow::anyhow!(
                "PID file {} already exists with PID: {}. Is another instance running?",
                path.display(),
                existing.trim()
            ));
        }
        Err(e) => return Err(e.into()),
    };

    // The handle we opened must point at a regular file
    let metadata = file.metadata()?;
    if !metadata.is_file() {
        let _ = fs::remove_file(path);
        return Err(anyhow::anyhow!(
            "PID file {} is not a regular file",
            path.display()
        ));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }

    writeln!(file, "{}", pid)?;

    tracing::info!(pid = pid, path = %path.display(), "PID file written");
    Ok(())
}

/// Remove the PID file on daemon shutdown.
///
/// Logs a warning but does not fail if the file cannot be removed.
pub fn remove_pid_file(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        tracing::warn!(
            path = %path.display(),
            error = %e,
            "failed to remove PID file"
        );
    } else {
        tracing::info!(path = %path.display(), "PID file removed");
    }
}

/// Spawn a background task that logs alerts committed by the pipeline.
///
/// Alerts are already persisted to the ledger before they reach this
/// channel; the task mirrors them into the daemon log so operators see
/// attacks without querying the data directory.
fn spawn_alert_logger(
    mut alert_rx: mpsc::Receiver<Alert>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                alert = alert_rx.recv() => {
                    match alert {
                        Some(alert) => log_alert(&alert),
                        None => {
                            tracing::debug!("alert channel closed, exiting alert log task");
                            break;
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::debug!("alert log task shutting down");
                    break;
                }
            }
        }
    })
}

/// Write one alert into the daemon log at a level matching its severity.
fn log_alert(alert: &Alert) {
    match alert.severity {
        Severity::Critical => tracing::error!(
            host = %alert.host_id,
            ip = %alert.source_ip,
            kind = %alert.kind,
            event_time = %alert.timestamp,
            "{}",
            alert.message
        ),
        Severity::Warning => tracing::warn!(
            host = %alert.host_id,
            ip = %alert.source_ip,
            kind = %alert.kind,
            event_time = %alert.timestamp,
            "{}",
            alert.message
        ),
    }
}

/// Record the build info gauge (always 1, with a version label).
///
/// Called once after the metrics recorder is installed.
fn record_build_info() {
    use authwatch_core::metrics as m;
    metrics::gauge!(m::DAEMON_BUILD_INFO, "version" => env!("CARGO_PKG_VERSION")).set(1.0);

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "build info recorded");
}

/// Spawn a background task that periodically refreshes the uptime gauge.
///
/// Updates every 10 seconds to keep the metric fresh for Prometheus scrapes.
fn spawn_uptime_updater(
    start_time: Instant,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    use authwatch_core::metrics as m;

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(UPTIME_REFRESH_SECS));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let uptime_secs = start_time.elapsed().as_secs();
                    #[allow(clippy::cast_precision_loss)]
                    metrics::gauge!(m::DAEMON_UPTIME_SECONDS).set(uptime_secs as f64);
                }
                _ = shutdown_rx.recv() => {
                    tracing::debug!("uptime updater shutting down");
                    break;
                }
            }
        }
    })
}
