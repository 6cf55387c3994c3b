//! 파이프라인 생명주기 trait
//!
//! 데몬 오케스트레이터는 이 trait을 통해 파이프라인을 기동/정지하고
//! 주기적으로 헬스 상태를 수집합니다.

use std::fmt;

use serde::Serialize;

use crate::error::AuthwatchError;

/// 파이프라인 헬스 상태
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "lowercase")]
pub enum HealthStatus {
    /// 정상 동작 중
    Healthy,
    /// 동작 중이지만 주의가 필요함
    Degraded(String),
    /// 동작 불능
    Unhealthy(String),
}

impl HealthStatus {
    /// 정상 상태인지 반환합니다.
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// 동작 불능 상태인지 반환합니다.
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded(reason) => write!(f, "degraded: {reason}"),
            Self::Unhealthy(reason) => write!(f, "unhealthy: {reason}"),
        }
    }
}

/// 데몬이 관리하는 장기 실행 컴포넌트의 공통 생명주기
///
/// 시작과 정지는 내부 상태를 바꾸므로 `&mut self`를 받습니다.
#[allow(async_fn_in_trait)]
pub trait Pipeline {
    /// 파이프라인을 시작합니다. 이미 실행 중이면 에러를 반환합니다.
    async fn start(&mut self) -> Result<(), AuthwatchError>;

    /// 파이프라인을 정지하고 보류 중인 작업을 마무리합니다.
    async fn stop(&mut self) -> Result<(), AuthwatchError>;

    /// 현재 헬스 상태를 보고합니다.
    async fn health_check(&self) -> HealthStatus;
}
