//! Integration tests for the commands that read and edit daemon state.
//!
//! Seeds a data directory with ledgers, watermarks, and a registry the way
//! the daemon writes them, then drives the status/alerts/ips/fetch handlers.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{TimeZone, Utc};
use tempfile::TempDir;

use authwatch_core::config::AuthwatchConfig;
use authwatch_core::event::{Alert, ArchiveRecord};
use authwatch_core::types::{EventKind, Host, OsKind, Severity, TrustStatus};
use authwatch_log_pipeline::{
    AnalysisStats, CycleOutcome, CycleReport, CycleStep, DataStore, TrustRegistry,
};

use authwatch_cli::cli::{AlertsArgs, FetchArgs, IpsAction, IpsArgs, OutputFormat, StatusArgs};
use authwatch_cli::commands;
use authwatch_cli::output::OutputWriter;

fn sample_alert(host: &str, severity: Severity, second: u32) -> Alert {
    Alert {
        host_id: host.to_owned(),
        timestamp: Utc.with_ymd_and_hms(2026, 8, 21, 9, 0, second).unwrap(),
        kind: EventKind::FailedLogin,
        source_ip: "203.0.113.9".to_owned(),
        severity,
        message: "Failed password for root".to_owned(),
    }
}

fn archive_record(host: &str, filename: &str, record_count: usize) -> ArchiveRecord {
    ArchiveRecord {
        host_id: host.to_owned(),
        recorded_at: Utc.with_ymd_and_hms(2026, 8, 21, 9, 30, 0).unwrap(),
        filename: filename.to_owned(),
        record_count,
    }
}

fn fleet_host(id: &str, os: OsKind) -> Host {
    Host {
        id: id.to_owned(),
        address: "203.0.113.10".to_owned(),
        os,
        username: "ops".to_owned(),
        port: 22,
    }
}

fn write_fleet_config(dir: &Path, data_dir: &Path, pid_file: &Path) -> PathBuf {
    let config_path = dir.join("authwatch.toml");
    let contents = format!(
        r#"
[general]
data_dir = "{data}"
pid_file = "{pid}"

[[fleet.hosts]]
id = "web-01"
address = "203.0.113.10"
os = "linux"
username = "ops"

[[fleet.hosts]]
id = "dc-01"
address = "203.0.113.20"
os = "windows"
"#,
        data = data_dir.display(),
        pid = pid_file.display()
    );
    fs::write(&config_path, contents).expect("should write config");
    config_path
}

// ---- status ----

#[test]
fn test_status_report_aggregates_per_host() {
    // Given: Two configured hosts, archives for one of them
    let temp_dir = TempDir::new().unwrap();
    let mut config = AuthwatchConfig::default();
    config.fleet.hosts = vec![
        fleet_host("web-01", OsKind::Linux),
        fleet_host("dc-01", OsKind::Windows),
    ];

    let mut watermarks = BTreeMap::new();
    watermarks.insert(
        "web-01".to_owned(),
        Utc.with_ymd_and_hms(2026, 8, 21, 9, 30, 0).unwrap(),
    );

    // Newest first, matching DataStore::recent_archives
    let archives = vec![
        archive_record("web-01", "logs_web-01_20260821_093000.csv", 12),
        archive_record("web-01", "logs_web-01_20260821_091500.csv", 8),
    ];

    let mut registry = TrustRegistry::load(temp_dir.path()).unwrap();
    registry.set_status("203.0.113.9", TrustStatus::Banned, Utc::now());
    registry.set_status("198.51.100.7", TrustStatus::Trusted, Utc::now());

    // When: Building the status report
    let report =
        commands::status::build_status_report(&config, &watermarks, &archives, &registry, None, false);

    // Then: Per-host aggregates and registry counts line up
    assert!(!report.daemon_running);
    assert_eq!(report.hosts.len(), 2);

    let web = &report.hosts[0];
    assert_eq!(web.id, "web-01");
    assert_eq!(web.batches, 2);
    assert_eq!(web.events_archived, 20);
    assert_eq!(
        web.last_batch.as_deref(),
        Some("logs_web-01_20260821_093000.csv"),
        "last batch should be the newest archive entry"
    );
    assert!(web.watermark.is_some());
    assert!(web.connection.is_none(), "non-verbose report hides connection");

    let dc = &report.hosts[1];
    assert_eq!(dc.batches, 0);
    assert!(dc.watermark.is_none(), "never-fetched host has no watermark");
    assert!(dc.last_batch.is_none());

    assert_eq!(report.registry.known_ips, 2);
    assert_eq!(report.registry.banned, 1);
    assert_eq!(report.registry.trusted, 1);
}

#[test]
fn test_status_report_verbose_connection_details() {
    // Given: A verbose report for one host
    let temp_dir = TempDir::new().unwrap();
    let mut config = AuthwatchConfig::default();
    config.fleet.hosts = vec![fleet_host("web-01", OsKind::Linux)];
    let registry = TrustRegistry::load(temp_dir.path()).unwrap();

    // When: Building with verbose = true
    let report = commands::status::build_status_report(
        &config,
        &BTreeMap::new(),
        &[],
        &registry,
        Some(4242),
        true,
    );

    // Then: Connection details and daemon pid are carried through
    assert!(report.daemon_running);
    assert_eq!(report.daemon_pid, Some(4242));
    assert_eq!(
        report.hosts[0].connection.as_deref(),
        Some("ops@203.0.113.10:22")
    );
}

#[test]
fn test_status_report_json_omits_missing_watermark() {
    // Given: A host that has never been fetched
    let temp_dir = TempDir::new().unwrap();
    let mut config = AuthwatchConfig::default();
    config.fleet.hosts = vec![fleet_host("dc-01", OsKind::Windows)];
    let registry = TrustRegistry::load(temp_dir.path()).unwrap();

    let report = commands::status::build_status_report(
        &config,
        &BTreeMap::new(),
        &[],
        &registry,
        None,
        false,
    );

    // When: Serializing to JSON
    let value = serde_json::to_value(&report).unwrap();

    // Then: Optional fields are omitted, not null
    let host = &value["hosts"][0];
    assert!(host.get("watermark").is_none(), "watermark should be omitted");
    assert!(host.get("last_batch").is_none(), "last_batch should be omitted");
    assert!(value.get("daemon_pid").is_none(), "daemon_pid should be omitted");
}

#[test]
fn test_daemon_pid_detection() {
    let temp_dir = TempDir::new().unwrap();

    // A pid file naming this test process reads as running
    let own_pid = temp_dir.path().join("own.pid");
    fs::write(&own_pid, std::process::id().to_string()).unwrap();
    assert_eq!(
        commands::status::daemon_pid(&own_pid.to_string_lossy()),
        Some(std::process::id())
    );

    // A stale pid (no such process) reads as not running
    let stale_pid = temp_dir.path().join("stale.pid");
    fs::write(&stale_pid, "4200000").unwrap();
    assert_eq!(commands::status::daemon_pid(&stale_pid.to_string_lossy()), None);

    // Garbage content reads as not running
    let garbage_pid = temp_dir.path().join("garbage.pid");
    fs::write(&garbage_pid, "not-a-pid").unwrap();
    assert_eq!(
        commands::status::daemon_pid(&garbage_pid.to_string_lossy()),
        None
    );

    // Missing file reads as not running
    let missing = temp_dir.path().join("missing.pid");
    assert_eq!(commands::status::daemon_pid(&missing.to_string_lossy()), None);
}

#[tokio::test]
async fn test_status_execute_on_seeded_data_dir() {
    // Given: A data dir seeded the way the daemon writes it
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().join("data");

    let store = DataStore::open(&data_dir).unwrap();
    store
        .append_archive(&archive_record("web-01", "logs_web-01_20260821_093000.csv", 12))
        .unwrap();
    store
        .append_alerts(&[sample_alert("web-01", Severity::Critical, 5)])
        .unwrap();
    let mut watermarks = BTreeMap::new();
    watermarks.insert(
        "web-01".to_owned(),
        Utc.with_ymd_and_hms(2026, 8, 21, 9, 30, 0).unwrap(),
    );
    store.save_watermarks(&watermarks).unwrap();

    let mut registry = TrustRegistry::load(&data_dir).unwrap();
    registry.set_status("203.0.113.9", TrustStatus::Banned, Utc::now());
    registry.save().unwrap();

    let config_path = write_fleet_config(
        temp_dir.path(),
        &data_dir,
        &temp_dir.path().join("authwatch.pid"),
    );

    // When: Running `status` in both output formats
    for format in [OutputFormat::Text, OutputFormat::Json] {
        let writer = OutputWriter::new(format);
        let result =
            commands::status::execute(StatusArgs { verbose: true }, &config_path, &writer).await;

        // Then: Should succeed
        assert!(result.is_ok(), "status should succeed: {result:?}");
    }
}

// ---- alerts ----

#[tokio::test]
async fn test_alerts_execute_with_filters() {
    // Given: A ledger with three alerts of mixed severity
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().join("data");
    let store = DataStore::open(&data_dir).unwrap();
    store
        .append_alerts(&[
            sample_alert("web-01", Severity::Warning, 1),
            sample_alert("web-01", Severity::Critical, 2),
            sample_alert("dc-01", Severity::Critical, 3),
        ])
        .unwrap();

    let config_path = write_fleet_config(
        temp_dir.path(),
        &data_dir,
        &temp_dir.path().join("authwatch.pid"),
    );
    let writer = OutputWriter::new(OutputFormat::Text);

    // When / Then: Plain listing succeeds
    let result = commands::alerts::execute(
        AlertsArgs {
            limit: 2,
            severity: None,
        },
        &config_path,
        &writer,
    )
    .await;
    assert!(result.is_ok(), "alerts should succeed: {result:?}");

    // When / Then: A severity filter parses loosely
    let result = commands::alerts::execute(
        AlertsArgs {
            limit: 20,
            severity: Some("crit".to_owned()),
        },
        &config_path,
        &writer,
    )
    .await;
    assert!(result.is_ok(), "severity filter should succeed: {result:?}");

    // When / Then: An unknown severity fails as a command error
    let err = commands::alerts::execute(
        AlertsArgs {
            limit: 20,
            severity: Some("bogus".to_owned()),
        },
        &config_path,
        &writer,
    )
    .await
    .expect_err("bogus severity should fail");
    assert_eq!(err.exit_code(), 1);
    assert!(err.to_string().contains("invalid severity"), "{err}");
}

#[test]
fn test_alerts_report_shape() {
    let alerts = vec![
        sample_alert("web-01", Severity::Critical, 2),
        sample_alert("web-01", Severity::Warning, 1),
    ];

    let report = commands::alerts::build_alerts_report(alerts, 20, Some(Severity::Warning));

    assert_eq!(report.shown, 2);
    assert_eq!(report.limit, 20);
    assert_eq!(report.min_severity.as_deref(), Some("WARNING"));
    assert_eq!(report.alerts[0].severity, Severity::Critical);
}

// ---- ips ----

#[tokio::test]
async fn test_ips_set_and_list_roundtrip() {
    // Given: A config pointing at a fresh data dir
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().join("data");
    DataStore::open(&data_dir).unwrap();
    let config_path = write_fleet_config(
        temp_dir.path(),
        &data_dir,
        &temp_dir.path().join("authwatch.pid"),
    );
    let writer = OutputWriter::new(OutputFormat::Text);

    // When: Banning an IP
    let result = commands::ips::execute(
        IpsArgs {
            action: IpsAction::Set {
                ip: "203.0.113.9".to_owned(),
                status: "banned".to_owned(),
            },
        },
        &config_path,
        &writer,
    )
    .await;
    assert!(result.is_ok(), "ips set should succeed: {result:?}");

    // Then: The registry on disk reflects it
    let registry = TrustRegistry::load(&data_dir).unwrap();
    let entry = registry.get("203.0.113.9").expect("entry should exist");
    assert_eq!(entry.status, TrustStatus::Banned);

    // When: Changing the status of the same IP
    let result = commands::ips::execute(
        IpsArgs {
            action: IpsAction::Set {
                ip: "203.0.113.9".to_owned(),
                status: "trusted".to_owned(),
            },
        },
        &config_path,
        &writer,
    )
    .await;
    assert!(result.is_ok());

    let registry = TrustRegistry::load(&data_dir).unwrap();
    assert_eq!(
        registry.get("203.0.113.9").unwrap().status,
        TrustStatus::Trusted,
        "set should update an existing entry"
    );

    // When / Then: Listing succeeds
    let result = commands::ips::execute(
        IpsArgs {
            action: IpsAction::List,
        },
        &config_path,
        &writer,
    )
    .await;
    assert!(result.is_ok(), "ips list should succeed: {result:?}");
}

#[tokio::test]
async fn test_ips_set_rejects_bad_input() {
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().join("data");
    let config_path = write_fleet_config(
        temp_dir.path(),
        &data_dir,
        &temp_dir.path().join("authwatch.pid"),
    );
    let writer = OutputWriter::new(OutputFormat::Text);

    // An unparseable address is rejected before touching the registry
    let err = commands::ips::execute(
        IpsArgs {
            action: IpsAction::Set {
                ip: "not-an-ip".to_owned(),
                status: "banned".to_owned(),
            },
        },
        &config_path,
        &writer,
    )
    .await
    .expect_err("bad ip should fail");
    assert_eq!(err.exit_code(), 1);
    assert!(err.to_string().contains("invalid IP address"), "{err}");

    // An unknown trust status is rejected
    let err = commands::ips::execute(
        IpsArgs {
            action: IpsAction::Set {
                ip: "203.0.113.9".to_owned(),
                status: "friendly".to_owned(),
            },
        },
        &config_path,
        &writer,
    )
    .await
    .expect_err("bad status should fail");
    assert_eq!(err.exit_code(), 1);
    assert!(err.to_string().contains("invalid trust status"), "{err}");
}

#[tokio::test]
async fn test_ips_remove() {
    // Given: A registry with one banned IP
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().join("data");
    DataStore::open(&data_dir).unwrap();
    let mut registry = TrustRegistry::load(&data_dir).unwrap();
    registry.set_status("203.0.113.9", TrustStatus::Banned, Utc::now());
    registry.save().unwrap();

    let config_path = write_fleet_config(
        temp_dir.path(),
        &data_dir,
        &temp_dir.path().join("authwatch.pid"),
    );
    let writer = OutputWriter::new(OutputFormat::Text);

    // When: Removing it
    let result = commands::ips::execute(
        IpsArgs {
            action: IpsAction::Remove {
                ip: "203.0.113.9".to_owned(),
            },
        },
        &config_path,
        &writer,
    )
    .await;
    assert!(result.is_ok(), "remove should succeed: {result:?}");

    // Then: It is gone from disk
    let registry = TrustRegistry::load(&data_dir).unwrap();
    assert!(registry.get("203.0.113.9").is_none());

    // When / Then: Removing it again fails with a command error
    let err = commands::ips::execute(
        IpsArgs {
            action: IpsAction::Remove {
                ip: "203.0.113.9".to_owned(),
            },
        },
        &config_path,
        &writer,
    )
    .await
    .expect_err("second remove should fail");
    assert_eq!(err.exit_code(), 1);
    assert!(err.to_string().contains("was not in the registry"), "{err}");
}

#[test]
fn test_ips_list_orders_by_last_seen() {
    // Given: Entries observed at different times
    let temp_dir = TempDir::new().unwrap();
    let mut registry = TrustRegistry::load(temp_dir.path()).unwrap();
    registry.set_status(
        "203.0.113.9",
        TrustStatus::Banned,
        Utc.with_ymd_and_hms(2026, 8, 21, 9, 0, 0).unwrap(),
    );
    registry.set_status(
        "198.51.100.7",
        TrustStatus::Trusted,
        Utc.with_ymd_and_hms(2026, 8, 21, 10, 0, 0).unwrap(),
    );

    // When: Building the listing
    let report = commands::ips::build_list_report(&registry);

    // Then: Most recently seen comes first
    assert_eq!(report.total, 2);
    assert_eq!(report.entries[0].ip, "198.51.100.7");
    assert_eq!(report.entries[0].status, "TRUSTED");
    assert_eq!(report.entries[1].ip, "203.0.113.9");
}

// ---- fetch ----

#[tokio::test]
async fn test_fetch_refuses_while_daemon_runs() {
    // Given: A pid file naming a live process (this test)
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().join("data");
    let pid_file = temp_dir.path().join("authwatch.pid");
    fs::write(&pid_file, std::process::id().to_string()).unwrap();

    let config_path = write_fleet_config(temp_dir.path(), &data_dir, &pid_file);
    let writer = OutputWriter::new(OutputFormat::Text);

    // When: Running a manual fetch
    let err = commands::fetch::execute(
        FetchArgs {
            host: "web-01".to_owned(),
        },
        &config_path,
        &writer,
    )
    .await
    .expect_err("fetch should refuse while the daemon runs");

    // Then: Refused with a command error naming the pid
    assert_eq!(err.exit_code(), 1);
    assert!(
        err.to_string().contains("daemon appears to be running"),
        "{err}"
    );
}

#[tokio::test]
async fn test_fetch_unknown_host_is_config_error() {
    // Given: No daemon running, a host id that is not in the fleet
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().join("data");
    let config_path = write_fleet_config(
        temp_dir.path(),
        &data_dir,
        &temp_dir.path().join("authwatch.pid"),
    );
    let writer = OutputWriter::new(OutputFormat::Text);

    // When: Fetching the unknown host
    let err = commands::fetch::execute(
        FetchArgs {
            host: "ghost-99".to_owned(),
        },
        &config_path,
        &writer,
    )
    .await
    .expect_err("unknown host should fail");

    // Then: Surfaces as a configuration error
    assert_eq!(err.exit_code(), 2, "unknown host ids come from config");
    assert!(err.to_string().contains("unknown host id"), "{err}");
}

#[test]
fn test_fetch_report_maps_cycle_outcomes() {
    let committed = CycleOutcome::Committed(CycleReport {
        filename: "logs_web-01_20260821_093000.csv".to_owned(),
        entries_collected: 42,
        events_normalized: 40,
        malformed: 2,
        alerts: vec![sample_alert("web-01", Severity::Critical, 0)],
        stats: AnalysisStats {
            events_in: 40,
            ..Default::default()
        },
        watermark: Utc.with_ymd_and_hms(2026, 8, 21, 9, 30, 0).unwrap(),
    });
    let report = commands::fetch::build_fetch_report("web-01", &committed);
    assert_eq!(report.outcome, "committed");
    let cycle = report.cycle.expect("committed outcome should carry a cycle");
    assert_eq!(cycle.batch_file, "logs_web-01_20260821_093000.csv");
    assert_eq!(cycle.entries_collected, 42);
    assert_eq!(cycle.malformed, 2);
    assert_eq!(cycle.analysis.events_in, 40);
    assert_eq!(cycle.alerts.len(), 1);
    assert!(report.failed_step.is_none());

    let report = commands::fetch::build_fetch_report("web-01", &CycleOutcome::NoData);
    assert_eq!(report.outcome, "no-data");
    assert!(report.cycle.is_none());

    let failed = CycleOutcome::Failed {
        step: CycleStep::Collect,
        reason: "ssh exited with status 255".to_owned(),
    };
    let report = commands::fetch::build_fetch_report("web-01", &failed);
    assert_eq!(report.outcome, "failed");
    assert_eq!(report.failed_step, Some("collect"));
    assert!(report.failure.as_deref().unwrap().contains("255"));
}
