//! 에러 타입 -- 도메인별 에러 정의

/// Authwatch 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum AuthwatchError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 파이프라인 생명주기 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// 저장소 에러
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 파이프라인 생명주기 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 이미 실행 중인 파이프라인을 다시 시작함
    #[error("pipeline is already running")]
    AlreadyRunning,

    /// 실행 중이 아닌 파이프라인을 정지함
    #[error("pipeline is not running")]
    NotRunning,

    /// 파이프라인 초기화 실패
    #[error("pipeline init failed: {0}")]
    InitFailed(String),
}

/// 저장소 에러
///
/// 배치 파일, 레지스트리, 워터마크 등 디스크 상태를 다루다 발생하는
/// 에러입니다. `path`는 진단 메시지를 위한 표시용 경로입니다.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// 파일 쓰기 실패
    #[error("failed to write {path}: {reason}")]
    WriteFailed { path: String, reason: String },

    /// 파일 읽기 실패
    #[error("failed to read {path}: {reason}")]
    ReadFailed { path: String, reason: String },

    /// 저장된 데이터가 손상됨
    #[error("corrupt data in {path}: {reason}")]
    Corrupt { path: String, reason: String },
}
