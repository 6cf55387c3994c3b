//! 로그 파이프라인 에러 타입
//!
//! [`LogPipelineError`]는 로그 파이프라인 내부에서 발생하는 모든 에러를 표현합니다.
//! `From<LogPipelineError> for AuthwatchError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use authwatch_core::error::{AuthwatchError, PipelineError, StorageError};

/// 로그 파이프라인 도메인 에러
///
/// 원격 수집, 영속화, 상관 분석, 설정 등 파이프라인 내부의
/// 모든 에러 상황을 포괄합니다.
#[derive(Debug, thiserror::Error)]
pub enum LogPipelineError {
    /// 원격 명령 실행 실패 (연결, 인증, 비정상 종료 코드)
    #[error("remote command failed on {host}: {reason}")]
    Remote {
        /// 대상 호스트 id
        host: String,
        /// 실패 사유
        reason: String,
    },

    /// 원격 명령 타임아웃
    #[error("remote command timed out on {host} after {secs}s")]
    Timeout {
        /// 대상 호스트 id
        host: String,
        /// 적용된 타임아웃 (초)
        secs: u64,
    },

    /// 원격 스크립트 비정상 종료 (PowerShell 등)
    #[error("remote script failed on {host}: {reason}")]
    Script {
        /// 대상 호스트 id
        host: String,
        /// stderr 또는 종료 코드 요약
        reason: String,
    },

    /// 저장소 에러 (배치/레지스트리/워터마크 읽기·쓰기)
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 정규식 컴파일 에러
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl From<LogPipelineError> for AuthwatchError {
    fn from(err: LogPipelineError) -> Self {
        match err {
            LogPipelineError::Storage(e) => AuthwatchError::Storage(e),
            other => AuthwatchError::Pipeline(PipelineError::InitFailed(other.to_string())),
        }
    }
}
