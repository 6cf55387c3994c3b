//! 이벤트 레코드 -- 정규화된 인증 이벤트, 알림, 아카이브 기록
//!
//! 수집기가 만들어낸 원본 엔트리는 [`AuthEvent`]로 정규화되어 배치 파일에
//! 기록되고, 상관 엔진은 공격 시그널을 [`Alert`]로 승격합니다.
//! [`ArchiveRecord`]는 커밋된 배치 파일 하나의 장부 항목입니다.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{EventKind, Severity};

// --- 알림 메시지 태그 ---

/// 교차 호스트 공격 알림 메시지 앞에 붙는 태그
pub const TAG_CROSS_HOST: &str = "[CROSS-HOST ATTACK DETECTED]";

/// 차단된 IP 활동 알림 메시지 앞에 붙는 태그
pub const TAG_BANNED_IP: &str = "[BANNED IP DETECTED!]";

/// 수집 원본에서 정규화된 단일 인증 이벤트
///
/// 운영체제별 수집 결과는 전부 이 공통 스키마로 변환된 뒤
/// 배치 파일에 기록되고 상관 분석에 입력됩니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthEvent {
    /// 이벤트 발생 시각 (UTC)
    pub timestamp: DateTime<Utc>,
    /// 이벤트 종류
    pub kind: EventKind,
    /// 대상 계정 이름. 추출할 수 없으면 "UNKNOWN"
    pub user: String,
    /// 소스 IP 또는 로컬 센티널
    pub source_ip: String,
    /// 사람이 읽는 요약 ("FAILED_LOGIN for user: root")
    pub message: String,
    /// 원본 로그. JSON 이벤트는 컴팩트 직렬화, 텍스트 라인은 원문
    pub raw_log: String,
}

impl AuthEvent {
    /// 표준 요약 메시지를 붙여 새 이벤트를 생성합니다.
    pub fn new(
        timestamp: DateTime<Utc>,
        kind: EventKind,
        user: impl Into<String>,
        source_ip: impl Into<String>,
        raw_log: impl Into<String>,
    ) -> Self {
        let user = user.into();
        let message = format!("{kind} for user: {user}");
        Self {
            timestamp,
            kind,
            user,
            source_ip: source_ip.into(),
            message,
            raw_log: raw_log.into(),
        }
    }
}

impl fmt::Display for AuthEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] user={} ip={} at {}",
            self.kind,
            self.user,
            self.source_ip,
            self.timestamp.format("%Y-%m-%d %H:%M:%S")
        )
    }
}

/// 상관 엔진이 생성하는 알림 레코드
///
/// `timestamp`는 알림 생성 시각이 아니라 원본 이벤트의 발생 시각입니다.
/// 교차 호스트 판정과 중복 제거가 모두 이벤트 시각 기준으로 동작합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// 알림을 발생시킨 호스트 식별자
    pub host_id: String,
    /// 원본 이벤트의 발생 시각 (UTC)
    pub timestamp: DateTime<Utc>,
    /// 이벤트 종류
    pub kind: EventKind,
    /// 소스 IP
    pub source_ip: String,
    /// 심각도
    pub severity: Severity,
    /// 알림 메시지 (CRITICAL이면 심각도 태그가 앞에 붙음)
    pub message: String,
}

impl Alert {
    /// 중복 제거에 사용하는 자연 키를 반환합니다.
    pub fn key(&self) -> AlertKey {
        AlertKey {
            host_id: self.host_id.clone(),
            source_ip: self.source_ip.clone(),
            kind: self.kind,
            timestamp: self.timestamp,
        }
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {} (from {})",
            self.severity, self.host_id, self.message, self.source_ip
        )
    }
}

/// 알림의 유일성을 결정하는 자연 키
///
/// 같은 (호스트, 소스 IP, 종류, 시각) 조합은 프로세스 수명 동안
/// 한 번만 알림이 됩니다. 재수집으로 같은 이벤트가 다시 들어와도
/// 이 키가 중복을 걸러냅니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AlertKey {
    /// 호스트 식별자
    pub host_id: String,
    /// 소스 IP
    pub source_ip: String,
    /// 이벤트 종류
    pub kind: EventKind,
    /// 원본 이벤트 시각
    pub timestamp: DateTime<Utc>,
}

/// 커밋된 배치 파일 하나의 장부 항목
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveRecord {
    /// 호스트 식별자
    pub host_id: String,
    /// 커밋 시각 (UTC)
    pub recorded_at: DateTime<Utc>,
    /// 배치 디렉토리 기준 파일 이름
    pub filename: String,
    /// 배치에 기록된 이벤트 수 (0 가능)
    pub record_count: usize,
}

impl fmt::Display for ArchiveRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} ({} events)",
            self.host_id, self.filename, self.record_count
        )
    }
}
