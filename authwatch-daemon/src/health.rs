//! Aggregated health check reporting.
//!
//! The daemon owns a single long-running fetch pipeline. [`DaemonHealth`]
//! folds the pipeline's `HealthStatus` together with uptime and sweep
//! counters so one periodic log line answers both "is the fleet being
//! watched" and "is it working".
//!
//! # Status Source
//!
//! - Pipeline Healthy -> daemon Healthy
//! - Pipeline Degraded(reason) -> daemon Degraded (some host cycles failing)
//! - Pipeline Unhealthy(reason) -> daemon Unhealthy (not running at all)

use std::time::Instant;

use serde::Serialize;

use authwatch_core::pipeline::{HealthStatus, Pipeline};
use authwatch_log_pipeline::FetchPipeline;

/// Aggregated health report for the daemon process.
#[derive(Debug, Clone, Serialize)]
pub struct DaemonHealth {
    /// Overall daemon status, derived from the fetch pipeline.
    pub status: HealthStatus,
    /// Daemon uptime in seconds since start.
    pub uptime_secs: u64,
    /// Number of fleet hosts under watch.
    pub hosts: usize,
    /// Completed fleet sweeps since start.
    pub sweeps_completed: u64,
    /// Host cycles that committed a batch.
    pub cycles_committed: u64,
    /// Host cycles that failed and kept their watermark.
    pub cycles_failed: u64,
    /// Alerts handed to the daemon alert log.
    pub alerts_delivered: u64,
}

impl DaemonHealth {
    /// Collect a report from the running pipeline.
    pub async fn collect(pipeline: &FetchPipeline, started: Instant) -> Self {
        Self {
            status: pipeline.health_check().await,
            uptime_secs: started.elapsed().as_secs(),
            hosts: pipeline.host_count(),
            sweeps_completed: pipeline.sweeps_completed(),
            cycles_committed: pipeline.cycles_committed(),
            cycles_failed: pipeline.cycles_failed(),
            alerts_delivered: pipeline.alerts_delivered(),
        }
    }

    /// Emit the report as a log line at a level matching its status.
    pub fn log(&self) {
        match &self.status {
            HealthStatus::Healthy => tracing::info!(
                uptime_secs = self.uptime_secs,
                hosts = self.hosts,
                sweeps = self.sweeps_completed,
                cycles_committed = self.cycles_committed,
                cycles_failed = self.cycles_failed,
                alerts = self.alerts_delivered,
                "daemon health: healthy"
            ),
            HealthStatus::Degraded(reason) => tracing::warn!(
                uptime_secs = self.uptime_secs,
                hosts = self.hosts,
                sweeps = self.sweeps_completed,
                cycles_committed = self.cycles_committed,
                cycles_failed = self.cycles_failed,
                alerts = self.alerts_delivered,
                reason = %reason,
                "daemon health: degraded"
            ),
            HealthStatus::Unhealthy(reason) => tracing::error!(
                uptime_secs = self.uptime_secs,
                hosts = self.hosts,
                reason = %reason,
                "daemon health: unhealthy"
            ),
        }
    }
}
