//! 파이프라인 오케스트레이션 -- 플릿 순회와 호스트 사이클 실행을 관리합니다.
//!
//! [`FetchPipeline`]은 core의 [`Pipeline`](authwatch_core::pipeline::Pipeline) trait을 구현하여
//! `authwatch-daemon`에서 다른 모듈과 동일한 생명주기로 관리됩니다.
//!
//! # 내부 아키텍처
//! ```text
//! interval tick -> sweep -> [host cycle, host cycle, ...] -> cleanup -> mpsc -> downstream
//! ```
//!
//! 한 순회(sweep)는 설정된 모든 호스트의 사이클을 세마포어로 제한된
//! 동시성 안에서 실행합니다. 순회끼리는 절대 겹치지 않습니다.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use tokio::sync::{Mutex, Semaphore, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use authwatch_core::error::AuthwatchError;
use authwatch_core::event::Alert;
use authwatch_core::metrics::DAEMON_SWEEPS_TOTAL;
use authwatch_core::pipeline::{HealthStatus, Pipeline};

use crate::config::PipelineConfig;
use crate::correlate::CorrelationEngine;
use crate::cycle::{CycleOutcome, SharedState, run_cycle};
use crate::error::LogPipelineError;
use crate::executor::OpenSshShell;
use crate::normalizer::Normalizer;
use crate::registry::TrustRegistry;
use crate::store::DataStore;

/// 파이프라인 실행 상태
#[derive(Debug, Clone, PartialEq, Eq)]
enum PipelineState {
    /// 초기화됨, 아직 시작하지 않음
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨
    Stopped,
}

/// 순회 집계 카운터
///
/// 스윕 태스크가 갱신하고 파이프라인이 헬스 판정에 읽습니다.
#[derive(Debug, Default)]
struct SweepStats {
    /// 완료된 순회 수
    sweeps_completed: AtomicU64,
    /// 커밋된 호스트 사이클 수
    cycles_committed: AtomicU64,
    /// 실패한 호스트 사이클 수
    cycles_failed: AtomicU64,
    /// 채널로 전달된 알림 수
    alerts_delivered: AtomicU64,
    /// 가장 최근 순회에서 실패한 호스트 수
    last_sweep_failures: AtomicUsize,
}

/// 디스크에서 파이프라인 공유 상태를 복원합니다.
///
/// 워터마크와 레지스트리를 읽고, 보존 기간 내의 커밋된 알림으로
/// 상관 엔진의 중복 제거 인덱스와 교차 호스트 기록을 재구성합니다.
pub(crate) fn load_shared_state(
    config: &PipelineConfig,
    now: DateTime<Utc>,
) -> Result<SharedState, LogPipelineError> {
    let store = DataStore::open(&config.data_dir)?;
    let registry = TrustRegistry::load(Path::new(&config.data_dir))?;
    let watermarks = store.load_watermarks()?;
    let mut engine = CorrelationEngine::new(
        config.correlation_window_secs,
        config.history_retention_secs,
    );
    let cutoff = now - Duration::seconds(config.history_retention_secs as i64);
    let rehydrated = store.alerts_since(cutoff)?;
    engine.rehydrate(&rehydrated);
    info!(
        watermarks = watermarks.len(),
        known_ips = registry.len(),
        rehydrated = rehydrated.len(),
        "pipeline state loaded"
    );
    Ok(SharedState::new(store, registry, engine, watermarks))
}

/// 한 호스트의 사이클을 한 번만 실행합니다.
///
/// CLI의 수동 수집 명령에서 사용합니다. 디스크에서 상태를 복원하고
/// 사이클 하나를 실행한 뒤 결과를 반환합니다. 데몬이 같은 데이터
/// 디렉토리를 쓰는 동안에는 호출하면 안 됩니다.
pub async fn fetch_host_once(
    config: &PipelineConfig,
    host_id: &str,
) -> Result<CycleOutcome, LogPipelineError> {
    config.validate()?;
    let host = config
        .hosts
        .iter()
        .find(|h| h.id == host_id)
        .cloned()
        .ok_or_else(|| LogPipelineError::Config {
            field: "hosts".to_owned(),
            reason: format!("unknown host id '{host_id}'"),
        })?;

    let now = Utc::now();
    let shared = load_shared_state(config, now)?;
    let watermark = shared.watermarks.get(&host.id).copied();
    let normalizer = Normalizer::new()?;
    let executor = OpenSshShell::from_config(config);
    let state = Mutex::new(shared);
    Ok(run_cycle(&executor, config, &host, &normalizer, &state, watermark, now).await)
}

/// 순회 실행기 -- 스윕 루프와 호스트 태스크를 소유합니다.
///
/// `start()`마다 새로 만들어져 디스크 상태를 다시 읽습니다.
struct SweepRunner {
    config: Arc<PipelineConfig>,
    executor: Arc<OpenSshShell>,
    normalizer: Arc<Normalizer>,
    state: Arc<Mutex<SharedState>>,
    limiter: Arc<Semaphore>,
    alert_tx: mpsc::Sender<Alert>,
    stats: Arc<SweepStats>,
}

impl SweepRunner {
    fn initialize(
        config: &PipelineConfig,
        alert_tx: mpsc::Sender<Alert>,
        stats: Arc<SweepStats>,
    ) -> Result<Self, LogPipelineError> {
        let shared = load_shared_state(config, Utc::now())?;
        let normalizer = Normalizer::new()?;
        let executor = OpenSshShell::from_config(config);
        Ok(Self {
            config: Arc::new(config.clone()),
            executor: Arc::new(executor),
            normalizer: Arc::new(normalizer),
            state: Arc::new(Mutex::new(shared)),
            limiter: Arc::new(Semaphore::new(config.max_concurrent_fetches)),
            alert_tx,
            stats,
        })
    }

    /// 스윕 루프를 실행합니다.
    ///
    /// 시작 직후 첫 순회를 돌고, 이후 `sweep_interval_secs`마다 반복합니다.
    /// 취소 신호는 순회 사이에서만 확인하므로 진행 중인 순회는 끝까지
    /// 완료됩니다.
    async fn run(self, cancel: CancellationToken) {
        let period = std::time::Duration::from_secs(self.config.sweep_interval_secs);
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("sweep loop shutting down");
                    break;
                }
                _ = interval.tick() => {
                    self.sweep_once().await;
                }
            }
        }
    }

    /// 플릿 전체를 한 번 순회합니다.
    async fn sweep_once(&self) {
        let started = std::time::Instant::now();
        let watermarks = self.state.lock().await.watermarks.clone();

        let mut handles = Vec::with_capacity(self.config.hosts.len());
        for host in self.config.hosts.iter().cloned() {
            let watermark = watermarks.get(&host.id).copied();
            let limiter = Arc::clone(&self.limiter);
            let config = Arc::clone(&self.config);
            let executor = Arc::clone(&self.executor);
            let normalizer = Arc::clone(&self.normalizer);
            let state = Arc::clone(&self.state);

            handles.push(tokio::spawn(async move {
                let permit = match limiter.acquire_owned().await {
                    Ok(p) => p,
                    Err(_) => {
                        warn!(host = %host.id, "fetch limiter closed, skipping host");
                        return (host.id, CycleOutcome::NoData);
                    }
                };
                let outcome = run_cycle(
                    executor.as_ref(),
                    config.as_ref(),
                    &host,
                    normalizer.as_ref(),
                    state.as_ref(),
                    watermark,
                    Utc::now(),
                )
                .await;
                drop(permit);
                (host.id, outcome)
            }));
        }

        let mut committed = 0usize;
        let mut no_data = 0usize;
        let mut failed = 0usize;
        let mut alerts_total = 0usize;
        for handle in handles {
            match handle.await {
                Ok((host_id, CycleOutcome::Committed(report))) => {
                    committed += 1;
                    alerts_total += report.alerts.len();
                    self.forward_alerts(&host_id, report.alerts);
                }
                Ok((_, CycleOutcome::NoData)) => no_data += 1,
                Ok((_, CycleOutcome::Failed { .. })) => failed += 1,
                Err(e) => {
                    failed += 1;
                    warn!(error = %e, "host cycle task aborted");
                }
            }
        }

        self.state.lock().await.engine.cleanup_expired(Utc::now());

        self.stats.sweeps_completed.fetch_add(1, Ordering::Relaxed);
        self.stats
            .cycles_committed
            .fetch_add(committed as u64, Ordering::Relaxed);
        self.stats
            .cycles_failed
            .fetch_add(failed as u64, Ordering::Relaxed);
        self.stats
            .last_sweep_failures
            .store(failed, Ordering::Relaxed);
        counter!(DAEMON_SWEEPS_TOTAL).increment(1);

        info!(
            hosts = self.config.hosts.len(),
            committed,
            no_data,
            failed,
            alerts = alerts_total,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "fleet sweep finished"
        );
    }

    /// 커밋된 알림을 다운스트림 채널로 전달합니다.
    ///
    /// 채널이 가득 차거나 닫혀 있으면 버립니다. 알림은 이미 원장에
    /// 기록되어 있으므로 채널 전달은 최선 노력(best effort)입니다.
    fn forward_alerts(&self, host_id: &str, alerts: Vec<Alert>) -> usize {
        let mut delivered = 0usize;
        for alert in alerts {
            match self.alert_tx.try_send(alert) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(alert)) => {
                    warn!(host = %host_id, ip = %alert.source_ip, "alert channel full, dropping alert");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!(host = %host_id, "alert channel closed, no downstream consumer");
                }
            }
        }
        self.stats
            .alerts_delivered
            .fetch_add(delivered as u64, Ordering::Relaxed);
        delivered
    }
}

/// 수집 파이프라인 -- 플릿 순회/수집/분석의 전체 흐름을 관리합니다.
///
/// core의 `Pipeline` trait을 구현하여 `authwatch-daemon`에서
/// 다른 모듈과 동일한 생명주기(start/stop/health_check)로 관리됩니다.
///
/// # 사용 예시
/// ```ignore
/// use authwatch_log_pipeline::{FetchPipeline, FetchPipelineBuilder};
///
/// let (pipeline, alert_rx) = FetchPipelineBuilder::new()
///     .config(config)
///     .build()?;
///
/// // Pipeline trait으로 시작
/// pipeline.start().await?;
/// ```
#[derive(Debug)]
pub struct FetchPipeline {
    /// 파이프라인 설정
    config: PipelineConfig,
    /// 현재 상태
    state: PipelineState,
    /// 알림 전송 채널 (파이프라인 -> downstream)
    alert_tx: mpsc::Sender<Alert>,
    /// 순회 집계
    stats: Arc<SweepStats>,
    /// 스윕 루프 취소 토큰
    cancel: Option<CancellationToken>,
    /// 스윕 루프 태스크 핸들
    sweep_task: Option<tokio::task::JoinHandle<()>>,
}

impl FetchPipeline {
    /// 현재 상태를 반환합니다.
    pub fn state_name(&self) -> &str {
        match self.state {
            PipelineState::Initialized => "initialized",
            PipelineState::Running => "running",
            PipelineState::Stopped => "stopped",
        }
    }

    /// 설정된 호스트 수를 반환합니다.
    pub fn host_count(&self) -> usize {
        self.config.hosts.len()
    }

    /// 완료된 순회 수를 반환합니다.
    pub fn sweeps_completed(&self) -> u64 {
        self.stats.sweeps_completed.load(Ordering::Relaxed)
    }

    /// 커밋된 호스트 사이클 수를 반환합니다.
    pub fn cycles_committed(&self) -> u64 {
        self.stats.cycles_committed.load(Ordering::Relaxed)
    }

    /// 실패한 호스트 사이클 수를 반환합니다.
    pub fn cycles_failed(&self) -> u64 {
        self.stats.cycles_failed.load(Ordering::Relaxed)
    }

    /// 채널로 전달된 알림 수를 반환합니다.
    pub fn alerts_delivered(&self) -> u64 {
        self.stats.alerts_delivered.load(Ordering::Relaxed)
    }
}

impl Pipeline for FetchPipeline {
    async fn start(&mut self) -> Result<(), AuthwatchError> {
        if self.state == PipelineState::Running {
            return Err(authwatch_core::error::PipelineError::AlreadyRunning.into());
        }

        info!(
            hosts = self.config.hosts.len(),
            interval_secs = self.config.sweep_interval_secs,
            "starting fetch pipeline"
        );

        let runner = SweepRunner::initialize(
            &self.config,
            self.alert_tx.clone(),
            Arc::clone(&self.stats),
        )
        .map_err(AuthwatchError::from)?;

        let cancel = CancellationToken::new();
        let task = tokio::spawn(runner.run(cancel.clone()));
        self.cancel = Some(cancel);
        self.sweep_task = Some(task);
        self.state = PipelineState::Running;

        info!("fetch pipeline started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), AuthwatchError> {
        if self.state != PipelineState::Running {
            return Err(authwatch_core::error::PipelineError::NotRunning.into());
        }

        info!("stopping fetch pipeline");

        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        // 진행 중인 순회가 커밋을 마칠 때까지 기다림
        if let Some(task) = self.sweep_task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "sweep task terminated abnormally");
            }
        }

        self.state = PipelineState::Stopped;
        info!(
            sweeps = self.sweeps_completed(),
            cycles = self.cycles_committed(),
            "fetch pipeline stopped"
        );
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            PipelineState::Running => {
                let failures = self.stats.last_sweep_failures.load(Ordering::Relaxed);
                if failures > 0 {
                    HealthStatus::Degraded(format!("{failures} host cycle(s) failed in last sweep"))
                } else {
                    HealthStatus::Healthy
                }
            }
            PipelineState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            PipelineState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

/// 수집 파이프라인 빌더
///
/// 파이프라인을 구성하고 알림 채널을 생성합니다.
pub struct FetchPipelineBuilder {
    config: PipelineConfig,
    alert_tx: Option<mpsc::Sender<Alert>>,
}

impl FetchPipelineBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
            alert_tx: None,
        }
    }

    /// 파이프라인 설정을 지정합니다.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// 외부 알림 전송 채널을 설정합니다.
    ///
    /// 설정하지 않으면 빌더가 `alert_channel_capacity` 크기의 새 채널을
    /// 생성합니다.
    pub fn alert_sender(mut self, tx: mpsc::Sender<Alert>) -> Self {
        self.alert_tx = Some(tx);
        self
    }

    /// 파이프라인을 빌드합니다.
    ///
    /// # Returns
    /// - `FetchPipeline`: 파이프라인 인스턴스
    /// - `Option<mpsc::Receiver<Alert>>`: 알림 수신 채널
    ///   (외부 alert_sender를 설정한 경우 None)
    pub fn build(self) -> Result<(FetchPipeline, Option<mpsc::Receiver<Alert>>), LogPipelineError> {
        self.config.validate()?;

        let (alert_tx, alert_rx) = if let Some(tx) = self.alert_tx {
            (tx, None)
        } else {
            let (tx, rx) = mpsc::channel(self.config.alert_channel_capacity);
            (tx, Some(rx))
        };

        let pipeline = FetchPipeline {
            config: self.config,
            state: PipelineState::Initialized,
            alert_tx,
            stats: Arc::new(SweepStats::default()),
            cancel: None,
            sweep_task: None,
        };

        Ok((pipeline, alert_rx))
    }
}

impl Default for FetchPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
