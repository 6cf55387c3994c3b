//! 로그 파이프라인 설정
//!
//! [`PipelineConfig`]는 core의 [`AuthwatchConfig`](authwatch_core::config::AuthwatchConfig)에서
//! 파이프라인이 쓰는 값을 평탄화한 것으로, 파이프라인 전용 확장 필드를 더합니다.
//!
//! # 사용 예시
//! ```ignore
//! use authwatch_core::config::AuthwatchConfig;
//! use authwatch_log_pipeline::config::PipelineConfig;
//!
//! let core_config = AuthwatchConfig::default();
//! let config = PipelineConfig::from_core(&core_config);
//! ```

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use authwatch_core::types::Host;

use crate::error::LogPipelineError;

/// 로그 파이프라인 설정
///
/// core 설정의 `general`/`fleet`/`collection`/`correlation` 섹션에서 파생되며,
/// 파이프라인 내부에서만 쓰는 확장 필드를 포함합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// 데이터 디렉토리 (배치 파일, 레지스트리, 워터마크, 원장)
    pub data_dir: String,
    /// 수집 대상 호스트 목록
    pub hosts: Vec<Host>,
    /// 플릿 순회 간격 (초)
    pub sweep_interval_secs: u64,
    /// journalctl `-u`에 넘기는 systemd 유닛 이름
    pub journal_unit: String,
    /// 워터마크가 없는 호스트의 첫 수집 범위 (journalctl `--since` 구문)
    pub first_fetch_lookback: String,
    /// 워터마크가 없는 Windows 호스트에서 가져올 최대 이벤트 수
    pub windows_first_fetch_events: u32,
    /// SSH 연결 타임아웃 (초)
    pub connect_timeout_secs: u64,
    /// 원격 명령 전체 타임아웃 (초)
    pub command_timeout_secs: u64,
    /// SSH 개인키 경로 (미설정 시 ssh 기본 동작)
    pub identity_file: Option<String>,
    /// 교차 호스트 공격 판정 윈도우 (초)
    pub correlation_window_secs: u64,
    /// 상관 엔진 메모리 상태의 보존 기간 (초)
    pub history_retention_secs: u64,

    // --- 확장 설정 (core에 없는 추가 필드) ---
    /// ssh 실행 파일 경로
    pub ssh_binary: String,
    /// 원격 Windows 호스트에서 호출할 PowerShell 실행 파일
    pub powershell_binary: String,
    /// 한 번의 순회에서 동시에 수집할 호스트 수 상한
    pub max_concurrent_fetches: usize,
    /// 알림 채널 용량 (외부 채널 미사용 시)
    pub alert_channel_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: "/var/lib/authwatch".to_owned(),
            hosts: Vec::new(),
            sweep_interval_secs: 300,
            journal_unit: "ssh".to_owned(),
            first_fetch_lookback: "7 days ago".to_owned(),
            windows_first_fetch_events: 20,
            connect_timeout_secs: 10,
            command_timeout_secs: 60,
            identity_file: None,
            correlation_window_secs: 600,
            history_retention_secs: 86_400,
            ssh_binary: "ssh".to_owned(),
            powershell_binary: "powershell".to_owned(),
            max_concurrent_fetches: 4,
            alert_channel_capacity: 1024,
        }
    }
}

impl PipelineConfig {
    /// core의 `AuthwatchConfig`에서 파이프라인 설정을 생성합니다.
    ///
    /// core 설정에 없는 확장 필드는 기본값이 적용됩니다.
    pub fn from_core(core: &authwatch_core::config::AuthwatchConfig) -> Self {
        Self {
            data_dir: core.general.data_dir.clone(),
            hosts: core.fleet.hosts.clone(),
            sweep_interval_secs: core.fleet.sweep_interval_secs,
            journal_unit: core.collection.journal_unit.clone(),
            first_fetch_lookback: core.collection.first_fetch_lookback.clone(),
            windows_first_fetch_events: core.collection.windows_first_fetch_events,
            connect_timeout_secs: core.collection.connect_timeout_secs,
            command_timeout_secs: core.collection.command_timeout_secs,
            identity_file: core.collection.identity_file.clone(),
            correlation_window_secs: core.correlation.window_secs,
            history_retention_secs: core.correlation.history_retention_secs,
            ..Self::default()
        }
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogPipelineError> {
        const MAX_SWEEP_INTERVAL_SECS: u64 = 86_400;
        const MAX_TIMEOUT_SECS: u64 = 3_600;
        const MAX_CORRELATION_WINDOW_SECS: u64 = 604_800;
        const MAX_CONCURRENT_FETCHES: usize = 64;

        if self.data_dir.is_empty() {
            return Err(LogPipelineError::Config {
                field: "data_dir".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        if self.sweep_interval_secs == 0 || self.sweep_interval_secs > MAX_SWEEP_INTERVAL_SECS {
            return Err(LogPipelineError::Config {
                field: "sweep_interval_secs".to_owned(),
                reason: format!("must be 1-{}", MAX_SWEEP_INTERVAL_SECS),
            });
        }

        if self.journal_unit.is_empty() {
            return Err(LogPipelineError::Config {
                field: "journal_unit".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        if self.first_fetch_lookback.is_empty() {
            return Err(LogPipelineError::Config {
                field: "first_fetch_lookback".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        if self.connect_timeout_secs == 0 || self.connect_timeout_secs > MAX_TIMEOUT_SECS {
            return Err(LogPipelineError::Config {
                field: "connect_timeout_secs".to_owned(),
                reason: format!("must be 1-{}", MAX_TIMEOUT_SECS),
            });
        }

        if self.command_timeout_secs == 0 || self.command_timeout_secs > MAX_TIMEOUT_SECS {
            return Err(LogPipelineError::Config {
                field: "command_timeout_secs".to_owned(),
                reason: format!("must be 1-{}", MAX_TIMEOUT_SECS),
            });
        }

        if self.correlation_window_secs == 0
            || self.correlation_window_secs > MAX_CORRELATION_WINDOW_SECS
        {
            return Err(LogPipelineError::Config {
                field: "correlation_window_secs".to_owned(),
                reason: format!("must be 1-{}", MAX_CORRELATION_WINDOW_SECS),
            });
        }

        if self.history_retention_secs < self.correlation_window_secs {
            return Err(LogPipelineError::Config {
                field: "history_retention_secs".to_owned(),
                reason: "must be at least correlation_window_secs".to_owned(),
            });
        }

        if self.ssh_binary.is_empty() {
            return Err(LogPipelineError::Config {
                field: "ssh_binary".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        if self.powershell_binary.is_empty() {
            return Err(LogPipelineError::Config {
                field: "powershell_binary".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        if self.max_concurrent_fetches == 0 || self.max_concurrent_fetches > MAX_CONCURRENT_FETCHES
        {
            return Err(LogPipelineError::Config {
                field: "max_concurrent_fetches".to_owned(),
                reason: format!("must be 1-{}", MAX_CONCURRENT_FETCHES),
            });
        }

        if self.alert_channel_capacity == 0 {
            return Err(LogPipelineError::Config {
                field: "alert_channel_capacity".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        let mut seen_ids = HashSet::new();
        for host in &self.hosts {
            if host.id.is_empty() {
                return Err(LogPipelineError::Config {
                    field: "hosts".to_owned(),
                    reason: "host id must not be empty".to_owned(),
                });
            }
            if !seen_ids.insert(host.id.as_str()) {
                return Err(LogPipelineError::Config {
                    field: "hosts".to_owned(),
                    reason: format!("duplicate host id '{}'", host.id),
                });
            }
        }

        Ok(())
    }
}

/// 파이프라인 설정 빌더
///
/// 테스트와 CLI에서 부분 설정을 조립할 때 사용합니다.
#[derive(Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 데이터 디렉토리를 설정합니다.
    pub fn data_dir(mut self, dir: impl Into<String>) -> Self {
        self.config.data_dir = dir.into();
        self
    }

    /// 수집 대상 호스트 목록을 설정합니다.
    pub fn hosts(mut self, hosts: Vec<Host>) -> Self {
        self.config.hosts = hosts;
        self
    }

    /// 플릿 순회 간격(초)을 설정합니다.
    pub fn sweep_interval_secs(mut self, secs: u64) -> Self {
        self.config.sweep_interval_secs = secs;
        self
    }

    /// journalctl 유닛 이름을 설정합니다.
    pub fn journal_unit(mut self, unit: impl Into<String>) -> Self {
        self.config.journal_unit = unit.into();
        self
    }

    /// 원격 명령 타임아웃(초)을 설정합니다.
    pub fn command_timeout_secs(mut self, secs: u64) -> Self {
        self.config.command_timeout_secs = secs;
        self
    }

    /// 교차 호스트 윈도우(초)를 설정합니다.
    pub fn correlation_window_secs(mut self, secs: u64) -> Self {
        self.config.correlation_window_secs = secs;
        self
    }

    /// 엔진 상태 보존 기간(초)을 설정합니다.
    pub fn history_retention_secs(mut self, secs: u64) -> Self {
        self.config.history_retention_secs = secs;
        self
    }

    /// 동시 수집 호스트 수 상한을 설정합니다.
    pub fn max_concurrent_fetches(mut self, n: usize) -> Self {
        self.config.max_concurrent_fetches = n;
        self
    }

    /// 설정을 검증하고 `PipelineConfig`를 생성합니다.
    pub fn build(self) -> Result<PipelineConfig, LogPipelineError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
