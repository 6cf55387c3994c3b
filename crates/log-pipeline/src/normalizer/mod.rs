//! 정규화 모듈 -- 원시 수집 항목을 공통 [`AuthEvent`] 스키마로 변환합니다.
//!
//! 운영체제별 payload 해석은 하위 모듈이 담당합니다:
//! - [`linux`]: journalctl JSON 라인 + sshd/sudo 패턴 매칭
//! - [`windows`]: `Get-WinEvent` 레코드 JSON
//!
//! 정규화는 항목 단위로 실패합니다. 형식이 깨진 항목은 경고 후 버리고
//! 나머지 항목의 처리를 계속하므로, 항목 하나 때문에 배치 전체가
//! 실패하는 일은 없습니다.

pub mod linux;
pub mod windows;

pub use linux::AuthPatterns;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use authwatch_core::event::AuthEvent;
use authwatch_core::types::Host;

use crate::collector::{RawEntry, RawOrigin};
use crate::error::LogPipelineError;

/// 단일 원시 항목의 정규화 결과
#[derive(Debug)]
pub enum NormalizeOutcome {
    /// 인증 이벤트로 변환됨
    Event(AuthEvent),
    /// 인증 패턴과 무관한 항목 (정상 스킵)
    Unmatched,
    /// 형식이 깨진 항목 (경고 후 스킵)
    Malformed(String),
}

/// 배치 정규화 결과
///
/// `events.len() + unmatched + malformed`는 입력 항목 수와 같습니다.
#[derive(Debug, Default)]
pub struct NormalizedBatch {
    /// 정규화된 인증 이벤트 (입력 순서 유지)
    pub events: Vec<AuthEvent>,
    /// 인증 패턴과 무관해 버린 항목 수
    pub unmatched: usize,
    /// 형식 오류로 버린 항목 수
    pub malformed: usize,
}

/// 원시 항목 정규화기
///
/// 패턴 정규식은 생성 시 한 번만 컴파일합니다.
pub struct Normalizer {
    patterns: AuthPatterns,
}

impl Normalizer {
    /// 새 정규화기를 생성합니다.
    ///
    /// 내장 패턴이 컴파일되지 않으면 에러를 반환합니다.
    pub fn new() -> Result<Self, LogPipelineError> {
        Ok(Self {
            patterns: AuthPatterns::new()?,
        })
    }

    /// 수집된 원시 항목 배치를 정규화합니다.
    ///
    /// `now`는 타임스탬프를 복원할 수 없는 항목의 대체 시각입니다.
    pub fn normalize_batch(
        &self,
        host: &Host,
        entries: &[RawEntry],
        now: DateTime<Utc>,
    ) -> NormalizedBatch {
        let mut batch = NormalizedBatch::default();

        for entry in entries {
            let outcome = match entry.origin {
                RawOrigin::JournalJson => linux::normalize_line(&self.patterns, &entry.payload, now),
                RawOrigin::WinEventJson => windows::normalize_record(&entry.payload, now),
            };
            match outcome {
                NormalizeOutcome::Event(event) => batch.events.push(event),
                NormalizeOutcome::Unmatched => batch.unmatched += 1,
                NormalizeOutcome::Malformed(reason) => {
                    warn!(host = %host.id, reason, "dropping malformed entry");
                    batch.malformed += 1;
                }
            }
        }

        debug!(
            host = %host.id,
            events = batch.events.len(),
            unmatched = batch.unmatched,
            malformed = batch.malformed,
            "normalized batch"
        );
        batch
    }
}
