//! 원격 로그 수집 모듈 -- 운영체제별 명령으로 원시 인증 로그를 가져옵니다.
//!
//! # 수집 소스
//! - [`linux`]: `journalctl -o json` (sshd/sudo 인증 이벤트)
//! - [`windows`]: PowerShell `Get-WinEvent` (보안 감사 4625 + OpenSSH 운영 로그)
//!
//! # 아키텍처
//! 수집은 사이클마다 한 번씩 실행되는 pull 방식입니다. 수집기는
//! [`RemoteExecutor`](crate::executor::RemoteExecutor)를 통해 명령을 실행하고,
//! 결과를 [`RawEntry`] 목록으로 반환합니다. 원시 payload의 해석(JSON 파싱,
//! 패턴 매칭)은 정규화 단계의 몫이므로, 수집 단계에서는 개별 항목의 형식
//! 오류로 실패하지 않습니다.

pub mod linux;
pub mod windows;

use chrono::{DateTime, Utc};

use authwatch_core::types::{Host, OsKind};

use crate::config::PipelineConfig;
use crate::error::LogPipelineError;
use crate::executor::RemoteExecutor;

/// 원시 payload의 출처 형식
///
/// 정규화 단계가 payload를 어떤 규칙으로 해석할지 결정합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawOrigin {
    /// journalctl이 출력한 JSON 한 줄
    JournalJson,
    /// Windows 쿼리가 출력한 이벤트 레코드 JSON 객체
    WinEventJson,
}

/// 수집된 원시 로그 항목
///
/// 수집기가 생성하고, 정규화기가 소비하는 중간 데이터 형식입니다.
#[derive(Debug, Clone)]
pub struct RawEntry {
    /// 출처 형식
    pub origin: RawOrigin,
    /// 원시 payload (JSON 텍스트)
    pub payload: String,
}

impl RawEntry {
    /// 새 RawEntry를 생성합니다.
    pub fn new(origin: RawOrigin, payload: impl Into<String>) -> Self {
        Self {
            origin,
            payload: payload.into(),
        }
    }
}

/// 호스트의 운영체제에 맞는 수집기를 실행합니다.
///
/// `watermark`가 None이면 첫 수집으로 간주하고 설정된 lookback 범위를
/// 사용합니다. 전송 계층 실패는 그대로 에러로 반환되며, 호출자(사이클)가
/// soft 실패로 처리합니다.
pub async fn collect_host<E: RemoteExecutor>(
    executor: &E,
    config: &PipelineConfig,
    host: &Host,
    watermark: Option<DateTime<Utc>>,
) -> Result<Vec<RawEntry>, LogPipelineError> {
    match host.os {
        OsKind::Linux => linux::collect(executor, config, host, watermark).await,
        OsKind::Windows => windows::collect(executor, config, host, watermark).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_entry_creation() {
        let entry = RawEntry::new(RawOrigin::JournalJson, r#"{"MESSAGE":"x"}"#);
        assert_eq!(entry.origin, RawOrigin::JournalJson);
        assert_eq!(entry.payload, r#"{"MESSAGE":"x"}"#);
    }
}
