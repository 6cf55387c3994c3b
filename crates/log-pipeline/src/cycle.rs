//! 호스트 사이클 -- 한 호스트의 수집부터 커밋까지 단일 실행
//!
//! 사이클은 수집 -> 정규화 -> 영속화 -> 분석 -> 커밋 순서로 진행합니다.
//! 수집과 정규화는 공유 상태 락 없이 실행되고, 영속화 이후 단계만
//! 전역 락을 잡습니다. 원격 호스트가 느려도 다른 호스트의 커밋을
//! 막지 않습니다.
//!
//! 워터마크는 커밋의 마지막 저장물입니다. 그 이전 단계에서 실패하면
//! 워터마크가 그대로 남아 다음 사이클이 같은 구간을 다시 수집하고,
//! 중복 제거 인덱스가 이미 처리된 이벤트를 걸러냅니다.

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use metrics::{counter, gauge, histogram};
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use authwatch_core::event::{Alert, ArchiveRecord};
use authwatch_core::metrics::{
    LABEL_HOST, LABEL_REASON, LABEL_SEVERITY, LABEL_STATUS, LABEL_STEP,
    PIPELINE_ALERTS_SUPPRESSED_TOTAL, PIPELINE_ALERTS_TOTAL, PIPELINE_CYCLES_TOTAL,
    PIPELINE_CYCLE_DURATION_SECONDS, PIPELINE_CYCLE_FAILURES_TOTAL,
    PIPELINE_ENTRIES_COLLECTED_TOTAL, PIPELINE_ENTRIES_SKIPPED_TOTAL,
    PIPELINE_EVENTS_NORMALIZED_TOTAL, PIPELINE_KNOWN_IPS,
};
use authwatch_core::types::{Host, Severity, TrustStatus};

use crate::collector::collect_host;
use crate::config::PipelineConfig;
use crate::correlate::{AnalysisStats, CorrelationEngine};
use crate::executor::RemoteExecutor;
use crate::normalizer::Normalizer;
use crate::registry::TrustRegistry;
use crate::store::DataStore;

/// 사이클 진행 단계
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStep {
    /// 원격 수집
    Collect,
    /// 정규화
    Normalize,
    /// 배치 파일 기록
    Persist,
    /// 상관 분석
    Analyze,
    /// 장부/레지스트리/워터마크 커밋
    Commit,
}

impl CycleStep {
    /// 로그와 메트릭 레이블에 쓰는 이름을 반환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Collect => "collect",
            Self::Normalize => "normalize",
            Self::Persist => "persist",
            Self::Analyze => "analyze",
            Self::Commit => "commit",
        }
    }
}

/// 커밋된 사이클의 결과 요약
#[derive(Debug)]
pub struct CycleReport {
    /// 기록된 배치 파일 이름
    pub filename: String,
    /// 수집된 원시 항목 수
    pub entries_collected: usize,
    /// 정규화된 이벤트 수
    pub events_normalized: usize,
    /// 형식 오류로 버린 항목 수
    pub malformed: usize,
    /// 커밋된 알림
    pub alerts: Vec<Alert>,
    /// 분석 집계
    pub stats: AnalysisStats,
    /// 새로 저장된 워터마크 (사이클 시작 시각)
    pub watermark: DateTime<Utc>,
}

/// 사이클 실행 결과
#[derive(Debug)]
pub enum CycleOutcome {
    /// 커밋 완료
    Committed(CycleReport),
    /// 커밋할 이벤트 없음. 워터마크는 변하지 않습니다.
    NoData,
    /// 단계 실패. 워터마크는 변하지 않습니다.
    Failed {
        /// 실패한 단계
        step: CycleStep,
        /// 실패 사유
        reason: String,
    },
}

/// 커밋 단계에서만 변경되는 공유 상태
///
/// 사이클들이 전역 락([`tokio::sync::Mutex`]) 아래에서 접근합니다.
pub struct SharedState {
    /// 디스크 저장소
    pub store: DataStore,
    /// IP 신뢰 레지스트리
    pub registry: TrustRegistry,
    /// 상관 분석 엔진
    pub engine: CorrelationEngine,
    /// 호스트별 수집 워터마크
    pub watermarks: BTreeMap<String, DateTime<Utc>>,
}

impl SharedState {
    /// 새 공유 상태를 만듭니다.
    pub fn new(
        store: DataStore,
        registry: TrustRegistry,
        engine: CorrelationEngine,
        watermarks: BTreeMap<String, DateTime<Utc>>,
    ) -> Self {
        Self {
            store,
            registry,
            engine,
            watermarks,
        }
    }
}

/// 한 호스트의 사이클을 실행합니다.
///
/// `now`는 사이클 시작 시각입니다. 커밋되는 워터마크 값이자 배치 파일
/// 이름과 분석 기준 시각으로 쓰입니다. 시작 시각을 워터마크로 쓰면
/// 수집 진행 중 도착한 이벤트 구간이 다음 사이클과 겹치는데, 겹친
/// 이벤트는 중복 제거가 걸러냅니다.
pub async fn run_cycle<E: RemoteExecutor>(
    executor: &E,
    config: &PipelineConfig,
    host: &Host,
    normalizer: &Normalizer,
    state: &tokio::sync::Mutex<SharedState>,
    watermark: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> CycleOutcome {
    let cycle_id = Uuid::new_v4();
    let span = info_span!("cycle", host = %host.id, %cycle_id);
    let started = Instant::now();
    let outcome = drive_cycle(executor, config, host, normalizer, state, watermark, now)
        .instrument(span)
        .await;
    histogram!(PIPELINE_CYCLE_DURATION_SECONDS, LABEL_HOST => host.id.clone())
        .record(started.elapsed().as_secs_f64());
    outcome
}

async fn drive_cycle<E: RemoteExecutor>(
    executor: &E,
    config: &PipelineConfig,
    host: &Host,
    normalizer: &Normalizer,
    state: &tokio::sync::Mutex<SharedState>,
    watermark: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> CycleOutcome {
    debug!(host = %host.id, step = CycleStep::Collect.as_str(), ?watermark, "cycle started");
    let entries = match collect_host(executor, config, host, watermark).await {
        Ok(entries) => entries,
        Err(e) => return fail_with(host, CycleStep::Collect, e.to_string()),
    };
    counter!(PIPELINE_ENTRIES_COLLECTED_TOTAL, LABEL_HOST => host.id.clone())
        .increment(entries.len() as u64);
    if entries.is_empty() {
        debug!(host = %host.id, "no new entries");
        counter!(PIPELINE_CYCLES_TOTAL, LABEL_HOST => host.id.clone()).increment(1);
        return CycleOutcome::NoData;
    }

    debug!(host = %host.id, step = CycleStep::Normalize.as_str(), entries = entries.len(), "normalizing");
    let normalized = normalizer.normalize_batch(host, &entries, now);
    counter!(PIPELINE_EVENTS_NORMALIZED_TOTAL, LABEL_HOST => host.id.clone())
        .increment(normalized.events.len() as u64);
    counter!(PIPELINE_ENTRIES_SKIPPED_TOTAL, LABEL_HOST => host.id.clone())
        .increment(normalized.malformed as u64);
    if normalized.events.is_empty() {
        debug!(host = %host.id, "no auth events in batch");
        counter!(PIPELINE_CYCLES_TOTAL, LABEL_HOST => host.id.clone()).increment(1);
        return CycleOutcome::NoData;
    }

    let mut shared = state.lock().await;
    let SharedState {
        store,
        registry,
        engine,
        watermarks,
    } = &mut *shared;

    debug!(host = %host.id, step = CycleStep::Persist.as_str(), events = normalized.events.len(), "writing batch");
    let filename = match store.write_batch(&host.id, &normalized.events, now) {
        Ok(filename) => filename,
        Err(e) => return fail_with(host, CycleStep::Persist, e.to_string()),
    };

    debug!(host = %host.id, step = CycleStep::Analyze.as_str(), "analyzing");
    let report = engine.analyze(&host.id, &normalized.events, registry, now);

    // 커밋: 알림 장부 -> 레지스트리 -> 아카이브 장부 -> 워터마크 순서.
    // 실패한 사이클은 아카이브 기록을 남기지 않아야 하므로 아카이브가
    // 복구 가능한 저장물 중 마지막이고, 워터마크가 전체의 마지막입니다.
    // 중간 실패가 남기는 것은 최대 알림 라인과 레지스트리 항목이며,
    // 재수화와 다음 사이클의 재관찰이 이를 흡수합니다.
    debug!(host = %host.id, step = CycleStep::Commit.as_str(), alerts = report.alerts.len(), "committing");
    let archive = ArchiveRecord {
        host_id: host.id.clone(),
        recorded_at: now,
        filename: filename.clone(),
        record_count: normalized.events.len(),
    };
    let mut registry_next = registry.clone();
    for change in &report.registry_changes {
        registry_next.apply(change.clone());
    }
    let mut watermarks_next = watermarks.clone();
    watermarks_next.insert(host.id.clone(), now);

    let ledgers = store
        .append_alerts(&report.alerts)
        .and_then(|()| registry_next.save())
        .and_then(|()| store.append_archive(&archive));
    if let Err(e) = ledgers {
        store.remove_batch(&filename);
        return fail_with(host, CycleStep::Commit, e.to_string());
    }
    // 아카이브까지 기록된 뒤의 워터마크 실패는 배치 파일을 남겨 둡니다.
    // 아카이브 기록과 배치 파일은 항상 짝을 이루어야 합니다. 워터마크가
    // 그대로이므로 다음 사이클이 같은 구간을 다시 수집하고, 겹친
    // 이벤트는 중복 제거가 걸러냅니다.
    if let Err(e) = store.save_watermarks(&watermarks_next) {
        return fail_with(host, CycleStep::Commit, e.to_string());
    }

    *registry = registry_next;
    *watermarks = watermarks_next;
    engine.commit(&report);
    record_commit_metrics(host, registry, &report.alerts, &report.stats);

    info!(
        host = %host.id,
        file = %filename,
        events = normalized.events.len(),
        alerts = report.alerts.len(),
        critical = report.alerts.iter().filter(|a| a.severity == Severity::Critical).count(),
        "cycle committed"
    );
    CycleOutcome::Committed(CycleReport {
        filename,
        entries_collected: entries.len(),
        events_normalized: normalized.events.len(),
        malformed: normalized.malformed,
        alerts: report.alerts,
        stats: report.stats,
        watermark: now,
    })
}

fn fail_with(host: &Host, step: CycleStep, reason: String) -> CycleOutcome {
    warn!(host = %host.id, step = step.as_str(), reason = %reason, "cycle failed");
    counter!(
        PIPELINE_CYCLE_FAILURES_TOTAL,
        LABEL_HOST => host.id.clone(),
        LABEL_STEP => step.as_str()
    )
    .increment(1);
    CycleOutcome::Failed { step, reason }
}

fn record_commit_metrics(
    host: &Host,
    registry: &TrustRegistry,
    alerts: &[Alert],
    stats: &AnalysisStats,
) {
    counter!(PIPELINE_CYCLES_TOTAL, LABEL_HOST => host.id.clone()).increment(1);

    let critical = alerts
        .iter()
        .filter(|a| a.severity == Severity::Critical)
        .count();
    counter!(PIPELINE_ALERTS_TOTAL, LABEL_SEVERITY => "critical").increment(critical as u64);
    counter!(PIPELINE_ALERTS_TOTAL, LABEL_SEVERITY => "warning")
        .increment((alerts.len() - critical) as u64);

    counter!(PIPELINE_ALERTS_SUPPRESSED_TOTAL, LABEL_REASON => "dedup")
        .increment(stats.deduplicated as u64);
    counter!(PIPELINE_ALERTS_SUPPRESSED_TOTAL, LABEL_REASON => "trusted")
        .increment(stats.trusted_suppressed as u64);
    counter!(PIPELINE_ALERTS_SUPPRESSED_TOTAL, LABEL_REASON => "local")
        .increment(stats.local_skipped as u64);

    for (status, label) in [
        (TrustStatus::Unknown, "unknown"),
        (TrustStatus::Trusted, "trusted"),
        (TrustStatus::Banned, "banned"),
    ] {
        gauge!(PIPELINE_KNOWN_IPS, LABEL_STATUS => label)
            .set(registry.count_with_status(status) as f64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::RemoteOutput;
    use authwatch_core::types::OsKind;
    use chrono::TimeZone;
    use std::sync::Mutex as StdMutex;
    use tempfile::TempDir;
    use tokio::sync::Mutex;

    struct FixedShell {
        results: StdMutex<Vec<Result<RemoteOutput, crate::error::LogPipelineError>>>,
    }

    impl FixedShell {
        fn with_stdout(stdout: &str) -> Self {
            Self {
                results: StdMutex::new(vec![Ok(RemoteOutput {
                    code: Some(0),
                    stdout: stdout.to_owned(),
                    stderr: String::new(),
                })]),
            }
        }

        fn failing(reason: &str) -> Self {
            Self {
                results: StdMutex::new(vec![Err(crate::error::LogPipelineError::Remote {
                    host: "web-01".to_owned(),
                    reason: reason.to_owned(),
                })]),
            }
        }
    }

    impl RemoteExecutor for FixedShell {
        async fn run(
            &self,
            _host: &Host,
            _command: &str,
        ) -> Result<RemoteOutput, crate::error::LogPipelineError> {
            self.results.lock().unwrap().pop().expect("unexpected extra command")
        }

        async fn run_script(
            &self,
            _host: &Host,
            _script: &str,
        ) -> Result<String, crate::error::LogPipelineError> {
            unreachable!("linux-only tests")
        }
    }

    fn linux_host() -> Host {
        Host {
            id: "web-01".to_owned(),
            address: "10.0.0.10".to_owned(),
            os: OsKind::Linux,
            username: "root".to_owned(),
            port: 22,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn fresh_state(dir: &TempDir) -> Mutex<SharedState> {
        let store = DataStore::open(dir.path()).unwrap();
        let registry = TrustRegistry::load(dir.path()).unwrap();
        let engine = CorrelationEngine::new(600, 86_400);
        Mutex::new(SharedState::new(store, registry, engine, BTreeMap::new()))
    }

    const TWO_ATTACKS: &str = concat!(
        r#"{"MESSAGE":"Failed password for root from 203.0.113.9 port 22 ssh2","__REALTIME_TIMESTAMP":"1740830300000000"}"#,
        "\n",
        r#"{"MESSAGE":"Invalid user admin from 203.0.113.9","__REALTIME_TIMESTAMP":"1740830310000000"}"#,
        "\n",
    );

    #[tokio::test]
    async fn full_cycle_commits_batch_alerts_and_watermark() {
        let dir = tempfile::tempdir().unwrap();
        let state = fresh_state(&dir);
        let shell = FixedShell::with_stdout(TWO_ATTACKS);
        let normalizer = Normalizer::new().unwrap();

        let outcome = run_cycle(
            &shell,
            &PipelineConfig::default(),
            &linux_host(),
            &normalizer,
            &state,
            None,
            now(),
        )
        .await;

        let report = match outcome {
            CycleOutcome::Committed(report) => report,
            other => panic!("expected commit, got {other:?}"),
        };
        assert_eq!(report.events_normalized, 2);
        assert_eq!(report.alerts.len(), 2);
        assert_eq!(report.watermark, now());

        let shared = state.lock().await;
        assert_eq!(shared.watermarks.get("web-01"), Some(&now()));
        assert_eq!(shared.store.load_watermarks().unwrap().get("web-01"), Some(&now()));
        assert_eq!(shared.store.read_batch(&report.filename).unwrap().len(), 2);
        assert_eq!(shared.store.recent_alerts(10).unwrap().len(), 2);
        assert_eq!(shared.store.recent_archives(10).unwrap().len(), 1);
        assert_eq!(shared.registry.status("203.0.113.9"), TrustStatus::Unknown);
        assert_eq!(shared.engine.alerts_generated(), 2);
    }

    #[tokio::test]
    async fn empty_collection_is_no_data_and_keeps_watermark() {
        let dir = tempfile::tempdir().unwrap();
        let state = fresh_state(&dir);
        let shell = FixedShell::with_stdout("");
        let normalizer = Normalizer::new().unwrap();

        let outcome = run_cycle(
            &shell,
            &PipelineConfig::default(),
            &linux_host(),
            &normalizer,
            &state,
            None,
            now(),
        )
        .await;

        assert!(matches!(outcome, CycleOutcome::NoData));
        let shared = state.lock().await;
        assert!(shared.watermarks.is_empty());
        assert!(shared.store.load_watermarks().unwrap().is_empty());
        assert!(shared.store.recent_archives(10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn batch_without_auth_events_is_no_data() {
        let dir = tempfile::tempdir().unwrap();
        let state = fresh_state(&dir);
        let shell = FixedShell::with_stdout(
            "{\"MESSAGE\":\"Accepted publickey for ops from 10.0.0.9\"}\n",
        );
        let normalizer = Normalizer::new().unwrap();

        let outcome = run_cycle(
            &shell,
            &PipelineConfig::default(),
            &linux_host(),
            &normalizer,
            &state,
            None,
            now(),
        )
        .await;

        assert!(matches!(outcome, CycleOutcome::NoData));
        let shared = state.lock().await;
        assert!(shared.store.load_watermarks().unwrap().is_empty());
    }

    #[tokio::test]
    async fn collection_failure_is_soft_and_keeps_watermark() {
        let dir = tempfile::tempdir().unwrap();
        let state = fresh_state(&dir);
        let shell = FixedShell::failing("connection refused");
        let normalizer = Normalizer::new().unwrap();

        let outcome = run_cycle(
            &shell,
            &PipelineConfig::default(),
            &linux_host(),
            &normalizer,
            &state,
            None,
            now(),
        )
        .await;

        match outcome {
            CycleOutcome::Failed { step, reason } => {
                assert_eq!(step, CycleStep::Collect);
                assert!(reason.contains("connection refused"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
        let shared = state.lock().await;
        assert!(shared.store.load_watermarks().unwrap().is_empty());
        assert_eq!(shared.engine.alerts_generated(), 0);
    }

    #[tokio::test]
    async fn refetched_events_are_deduplicated_but_cycle_commits() {
        let dir = tempfile::tempdir().unwrap();
        let state = fresh_state(&dir);
        let normalizer = Normalizer::new().unwrap();
        let config = PipelineConfig::default();
        let host = linux_host();

        let first = run_cycle(
            &FixedShell::with_stdout(TWO_ATTACKS),
            &config,
            &host,
            &normalizer,
            &state,
            None,
            now(),
        )
        .await;
        assert!(matches!(first, CycleOutcome::Committed(_)));

        // 같은 구간 재수집: 배치는 다시 기록되지만 알림은 생기지 않음
        let later = now() + chrono::Duration::seconds(60);
        let second = run_cycle(
            &FixedShell::with_stdout(TWO_ATTACKS),
            &config,
            &host,
            &normalizer,
            &state,
            Some(now()),
            later,
        )
        .await;

        let report = match second {
            CycleOutcome::Committed(report) => report,
            other => panic!("expected commit, got {other:?}"),
        };
        assert!(report.alerts.is_empty());
        assert_eq!(report.stats.deduplicated, 2);

        let shared = state.lock().await;
        assert_eq!(shared.watermarks.get("web-01"), Some(&later));
        assert_eq!(shared.store.recent_alerts(10).unwrap().len(), 2);
        assert_eq!(shared.store.recent_archives(10).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn commit_failure_rolls_back_batch_and_state() {
        let dir = tempfile::tempdir().unwrap();
        let state = fresh_state(&dir);
        let shell = FixedShell::with_stdout(TWO_ATTACKS);
        let normalizer = Normalizer::new().unwrap();

        // 아카이브 장부 경로를 디렉토리로 점유해 마지막 append를 실패시킴.
        // 알림 장부와 레지스트리는 이미 기록된 뒤의 중간 실패 경로입니다.
        std::fs::create_dir(dir.path().join("archives.jsonl")).unwrap();

        let outcome = run_cycle(
            &shell,
            &PipelineConfig::default(),
            &linux_host(),
            &normalizer,
            &state,
            None,
            now(),
        )
        .await;

        match outcome {
            CycleOutcome::Failed { step, .. } => assert_eq!(step, CycleStep::Commit),
            other => panic!("expected commit failure, got {other:?}"),
        }

        let shared = state.lock().await;
        // 배치 파일은 롤백으로 제거되고, 메모리 상태도 변하지 않음
        let batch = DataStore::batch_filename("web-01", now());
        assert!(!shared.store.batch_path(&batch).exists());
        assert!(shared.watermarks.is_empty());
        assert!(shared.store.load_watermarks().unwrap().is_empty());
        assert!(shared.registry.is_empty());
        assert_eq!(shared.engine.alerts_generated(), 0);
        // 남는 것은 알림 라인뿐이고, 재시작 시 재수화가 이를 읽어들임
        assert_eq!(shared.store.recent_alerts(10).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn alert_ledger_failure_leaves_no_archive_record() {
        let dir = tempfile::tempdir().unwrap();
        let state = fresh_state(&dir);
        let shell = FixedShell::with_stdout(TWO_ATTACKS);
        let normalizer = Normalizer::new().unwrap();

        // 알림 장부 경로를 디렉토리로 점유해 커밋의 첫 저장물을 실패시킴
        std::fs::create_dir(dir.path().join("alerts.jsonl")).unwrap();

        let outcome = run_cycle(
            &shell,
            &PipelineConfig::default(),
            &linux_host(),
            &normalizer,
            &state,
            None,
            now(),
        )
        .await;

        match outcome {
            CycleOutcome::Failed { step, .. } => assert_eq!(step, CycleStep::Commit),
            other => panic!("expected commit failure, got {other:?}"),
        }

        let shared = state.lock().await;
        // 실패한 사이클은 아카이브 기록을 절대 남기지 않음
        assert!(shared.store.recent_archives(10).unwrap().is_empty());
        let batch = DataStore::batch_filename("web-01", now());
        assert!(!shared.store.batch_path(&batch).exists());
        assert!(shared.watermarks.is_empty());
        assert!(shared.store.load_watermarks().unwrap().is_empty());
        assert!(shared.registry.is_empty());
        assert_eq!(shared.engine.alerts_generated(), 0);
    }

    #[tokio::test]
    async fn watermark_save_failure_keeps_archived_batch() {
        let dir = tempfile::tempdir().unwrap();
        let state = fresh_state(&dir);
        let shell = FixedShell::with_stdout(TWO_ATTACKS);
        let normalizer = Normalizer::new().unwrap();

        // 워터마크 경로를 디렉토리로 점유해 커밋의 마지막 저장만 실패시킴
        std::fs::create_dir(dir.path().join("watermarks.json")).unwrap();

        let outcome = run_cycle(
            &shell,
            &PipelineConfig::default(),
            &linux_host(),
            &normalizer,
            &state,
            None,
            now(),
        )
        .await;

        match outcome {
            CycleOutcome::Failed { step, .. } => assert_eq!(step, CycleStep::Commit),
            other => panic!("expected commit failure, got {other:?}"),
        }

        let shared = state.lock().await;
        // 아카이브 기록과 배치 파일은 짝으로 남고, 워터마크만 전진하지 않음
        let archives = shared.store.recent_archives(10).unwrap();
        assert_eq!(archives.len(), 1);
        assert!(shared.store.batch_path(&archives[0].filename).exists());
        assert!(shared.watermarks.is_empty());
        // 메모리 상태는 커밋 완료 전까지 바뀌지 않음
        assert!(shared.registry.is_empty());
        assert_eq!(shared.engine.alerts_generated(), 0);
    }
}
