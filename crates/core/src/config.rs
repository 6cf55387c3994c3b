//! 설정 관리 -- authwatch.toml 파싱 및 런타임 설정
//!
//! [`AuthwatchConfig`]는 데몬과 CLI가 공유하는 최상위 설정 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`AUTHWATCH_FLEET_SWEEP_INTERVAL_SECS=60` 형식)
//! 3. 설정 파일 (`authwatch.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), authwatch_core::error::AuthwatchError> {
//! use authwatch_core::config::AuthwatchConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = AuthwatchConfig::load("authwatch.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = AuthwatchConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{AuthwatchError, ConfigError};
use crate::types::Host;

// --- 검증 상한 ---

const MAX_SWEEP_INTERVAL_SECS: u64 = 86_400;
const MAX_TIMEOUT_SECS: u64 = 3_600;
const MAX_CORRELATION_WINDOW_SECS: u64 = 604_800;
const MAX_WINDOWS_FIRST_FETCH_EVENTS: u32 = 10_000;

/// Authwatch 통합 설정
///
/// `authwatch.toml` 파일의 최상위 구조를 나타냅니다.
/// 각 컴포넌트는 자기 섹션만 읽어 사용합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthwatchConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 플릿 호스트 목록과 스윕 주기
    #[serde(default)]
    pub fleet: FleetConfig,
    /// 원격 수집 파라미터
    #[serde(default)]
    pub collection: CollectionConfig,
    /// 상관 분석 파라미터
    #[serde(default)]
    pub correlation: CorrelationConfig,
    /// Prometheus 메트릭 노출
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl AuthwatchConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    ///
    /// 설정 로딩 순서:
    /// 1. TOML 파일 파싱
    /// 2. 환경변수 오버라이드 적용
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, AuthwatchError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, AuthwatchError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AuthwatchError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                AuthwatchError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, AuthwatchError> {
        toml::from_str(toml_str).map_err(|e| {
            AuthwatchError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `AUTHWATCH_{SECTION}_{FIELD}`
    /// 예: `AUTHWATCH_GENERAL_LOG_LEVEL=debug`
    ///
    /// 호스트 목록(`fleet.hosts`)은 구조가 복잡해 환경변수로 덮어쓸 수 없습니다.
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "AUTHWATCH_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "AUTHWATCH_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.data_dir, "AUTHWATCH_GENERAL_DATA_DIR");
        override_string(&mut self.general.pid_file, "AUTHWATCH_GENERAL_PID_FILE");

        // Fleet
        override_u64(
            &mut self.fleet.sweep_interval_secs,
            "AUTHWATCH_FLEET_SWEEP_INTERVAL_SECS",
        );

        // Collection
        override_string(
            &mut self.collection.journal_unit,
            "AUTHWATCH_COLLECTION_JOURNAL_UNIT",
        );
        override_string(
            &mut self.collection.first_fetch_lookback,
            "AUTHWATCH_COLLECTION_FIRST_FETCH_LOOKBACK",
        );
        override_u32(
            &mut self.collection.windows_first_fetch_events,
            "AUTHWATCH_COLLECTION_WINDOWS_FIRST_FETCH_EVENTS",
        );
        override_u64(
            &mut self.collection.connect_timeout_secs,
            "AUTHWATCH_COLLECTION_CONNECT_TIMEOUT_SECS",
        );
        override_u64(
            &mut self.collection.command_timeout_secs,
            "AUTHWATCH_COLLECTION_COMMAND_TIMEOUT_SECS",
        );
        if let Ok(val) = std::env::var("AUTHWATCH_COLLECTION_IDENTITY_FILE") {
            self.collection.identity_file = Some(val);
        }

        // Correlation
        override_u64(
            &mut self.correlation.window_secs,
            "AUTHWATCH_CORRELATION_WINDOW_SECS",
        );
        override_u64(
            &mut self.correlation.history_retention_secs,
            "AUTHWATCH_CORRELATION_HISTORY_RETENTION_SECS",
        );

        // Metrics
        override_bool(&mut self.metrics.enabled, "AUTHWATCH_METRICS_ENABLED");
        override_string(&mut self.metrics.bind, "AUTHWATCH_METRICS_BIND");
        override_u16(&mut self.metrics.port, "AUTHWATCH_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), AuthwatchError> {
        // log_level 검증
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        // log_format 검증
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        if self.general.data_dir.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "general.data_dir".to_owned(),
                reason: "data_dir must not be empty".to_owned(),
            }
            .into());
        }

        // 스윕 주기 검증
        if self.fleet.sweep_interval_secs == 0
            || self.fleet.sweep_interval_secs > MAX_SWEEP_INTERVAL_SECS
        {
            return Err(ConfigError::InvalidValue {
                field: "fleet.sweep_interval_secs".to_owned(),
                reason: format!("must be between 1 and {MAX_SWEEP_INTERVAL_SECS}"),
            }
            .into());
        }

        // 호스트 목록 검증: 빈 필드와 중복 id 거부
        let mut seen_ids = std::collections::HashSet::new();
        for host in &self.fleet.hosts {
            if host.id.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "fleet.hosts.id".to_owned(),
                    reason: "host id must not be empty".to_owned(),
                }
                .into());
            }
            if host.address.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "fleet.hosts.address".to_owned(),
                    reason: format!("host '{}' has an empty address", host.id),
                }
                .into());
            }
            if host.username.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "fleet.hosts.username".to_owned(),
                    reason: format!("host '{}' has an empty username", host.id),
                }
                .into());
            }
            if !seen_ids.insert(host.id.as_str()) {
                return Err(ConfigError::InvalidValue {
                    field: "fleet.hosts.id".to_owned(),
                    reason: format!("duplicate host id '{}'", host.id),
                }
                .into());
            }
        }

        // 수집 파라미터 검증
        if self.collection.journal_unit.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "collection.journal_unit".to_owned(),
                reason: "journal_unit must not be empty".to_owned(),
            }
            .into());
        }
        if self.collection.connect_timeout_secs == 0
            || self.collection.connect_timeout_secs > MAX_TIMEOUT_SECS
        {
            return Err(ConfigError::InvalidValue {
                field: "collection.connect_timeout_secs".to_owned(),
                reason: format!("must be between 1 and {MAX_TIMEOUT_SECS}"),
            }
            .into());
        }
        if self.collection.command_timeout_secs == 0
            || self.collection.command_timeout_secs > MAX_TIMEOUT_SECS
        {
            return Err(ConfigError::InvalidValue {
                field: "collection.command_timeout_secs".to_owned(),
                reason: format!("must be between 1 and {MAX_TIMEOUT_SECS}"),
            }
            .into());
        }
        if self.collection.windows_first_fetch_events == 0
            || self.collection.windows_first_fetch_events > MAX_WINDOWS_FIRST_FETCH_EVENTS
        {
            return Err(ConfigError::InvalidValue {
                field: "collection.windows_first_fetch_events".to_owned(),
                reason: format!("must be between 1 and {MAX_WINDOWS_FIRST_FETCH_EVENTS}"),
            }
            .into());
        }

        // 상관 분석 파라미터 검증
        if self.correlation.window_secs == 0
            || self.correlation.window_secs > MAX_CORRELATION_WINDOW_SECS
        {
            return Err(ConfigError::InvalidValue {
                field: "correlation.window_secs".to_owned(),
                reason: format!("must be between 1 and {MAX_CORRELATION_WINDOW_SECS}"),
            }
            .into());
        }
        if self.correlation.history_retention_secs < self.correlation.window_secs {
            return Err(ConfigError::InvalidValue {
                field: "correlation.history_retention_secs".to_owned(),
                reason: "must be at least as long as correlation.window_secs".to_owned(),
            }
            .into());
        }

        // 메트릭 노출 검증
        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "metrics.port".to_owned(),
                reason: "port must not be 0 when metrics are enabled".to_owned(),
            }
            .into());
        }

        Ok(())
    }
}

// Default는 derive 매크로로 자동 생성 (각 필드가 Default를 구현하므로)

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 출력 형식 (json, pretty)
    pub log_format: String,
    /// 배치 파일과 레지스트리가 저장되는 디렉토리
    pub data_dir: String,
    /// PID 파일 경로
    pub pid_file: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            data_dir: "/var/lib/authwatch".to_owned(),
            pid_file: "/var/run/authwatch.pid".to_owned(),
        }
    }
}

/// 플릿 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    /// 전체 호스트를 순회하는 스윕 주기 (초)
    pub sweep_interval_secs: u64,
    /// 모니터링 대상 호스트 목록
    pub hosts: Vec<Host>,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 300,
            hosts: Vec::new(),
        }
    }
}

/// 원격 수집 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
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
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            journal_unit: "ssh".to_owned(),
            first_fetch_lookback: "7 days ago".to_owned(),
            windows_first_fetch_events: 20,
            connect_timeout_secs: 10,
            command_timeout_secs: 60,
            identity_file: None,
        }
    }
}

/// 상관 분석 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationConfig {
    /// 교차 호스트 공격 판정 윈도우 (초)
    pub window_secs: u64,
    /// 메모리 내 최근 알림 인덱스의 보존 기간 (초)
    pub history_retention_secs: u64,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            window_secs: 600,
            history_retention_secs: 86_400,
        }
    }
}

/// Prometheus 메트릭 노출 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 바인드 주소
    pub bind: String,
    /// 포트
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind: "127.0.0.1".to_owned(),
            port: 9469,
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u16 from env var, ignoring"
            ),
        }
    }
}

fn override_u32(target: &mut u32, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u32>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u32 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}
