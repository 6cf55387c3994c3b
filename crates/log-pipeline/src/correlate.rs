//! 상관 분석 엔진 -- 공격 이벤트를 알림으로 승격하고 교차 호스트 공격을
//! 판정합니다.
//!
//! [`CorrelationEngine::analyze`]는 읽기 전용입니다. 알림과 레지스트리
//! 변경을 [`AnalysisReport`]에 스테이징만 하고, 호출자가 영속화에 성공한
//! 뒤 [`commit`](CorrelationEngine::commit)을 호출해야 엔진의 중복 제거
//! 인덱스와 최근 알림 인덱스에 반영됩니다. 영속화가 실패하면 report를
//! 버리는 것으로 롤백이 끝납니다.
//!
//! 같은 배치를 커밋 없이 다시 분석하면 항상 같은 결과가 나옵니다.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use authwatch_core::event::{Alert, AlertKey, AuthEvent, TAG_BANNED_IP, TAG_CROSS_HOST};
use authwatch_core::types::{IpTrustEntry, Severity, TrustStatus, is_local_source};

use crate::registry::TrustRegistry;

/// 분석 집계
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisStats {
    /// 입력 이벤트 수
    pub events_in: usize,
    /// 공격 시그널이 아니라 건너뛴 수 (sudo 등)
    pub non_attack: usize,
    /// 로컬 센티널 IP라 건너뛴 수
    pub local_skipped: usize,
    /// 중복으로 억제된 수
    pub deduplicated: usize,
    /// 신뢰 IP라 억제된 수
    pub trusted_suppressed: usize,
    /// 교차 호스트 공격으로 판정된 수
    pub cross_host: usize,
    /// 이미 차단된 IP의 활동 수
    pub banned_hits: usize,
}

/// 분석 단계가 스테이징한 변경 묶음
///
/// 커밋 전까지 엔진과 레지스트리 어디에도 반영되지 않습니다.
#[derive(Debug, Default)]
pub struct AnalysisReport {
    /// 승격된 알림 (입력 이벤트 순서)
    pub alerts: Vec<Alert>,
    /// 레지스트리에 반영할 엔트리 (IP당 하나)
    pub registry_changes: Vec<IpTrustEntry>,
    /// 집계
    pub stats: AnalysisStats,
}

/// 상관 분석 엔진
///
/// 메모리 인덱스 두 개를 유지합니다:
/// - 커밋된 알림의 자연 키 집합 (재수집 중복 제거)
/// - 소스 IP별 최근 커밋된 알림의 (호스트, 이벤트 시각) 목록
///   (교차 호스트 판정)
///
/// 프로세스 재시작 시에는 알림 장부에서 [`rehydrate`](Self::rehydrate)로
/// 인덱스를 복원합니다.
pub struct CorrelationEngine {
    /// 교차 호스트 판정 윈도우
    window: Duration,
    /// 인덱스 보존 기간 (윈도우 이상)
    retention: Duration,
    /// 커밋된 알림 자연 키
    seen: HashSet<AlertKey>,
    /// 소스 IP -> 최근 커밋된 알림의 (호스트, 이벤트 시각)
    recent: HashMap<String, Vec<(String, DateTime<Utc>)>>,
    /// 커밋된 총 알림 수
    alerts_generated: u64,
    /// 중복으로 억제된 누적 수
    dedup_suppressed: u64,
    /// 신뢰 IP로 억제된 누적 수
    trusted_suppressed: u64,
    /// 교차 호스트 판정 누적 수
    cross_host_detected: u64,
}

impl CorrelationEngine {
    /// 새 엔진을 생성합니다.
    pub fn new(window_secs: u64, retention_secs: u64) -> Self {
        Self {
            window: Duration::seconds(window_secs as i64),
            retention: Duration::seconds(retention_secs as i64),
            seen: HashSet::new(),
            recent: HashMap::new(),
            alerts_generated: 0,
            dedup_suppressed: 0,
            trusted_suppressed: 0,
            cross_host_detected: 0,
        }
    }

    /// 과거에 커밋된 알림으로 메모리 인덱스를 복원합니다.
    pub fn rehydrate(&mut self, alerts: &[Alert]) {
        for alert in alerts {
            self.seen.insert(alert.key());
            self.recent
                .entry(alert.source_ip.clone())
                .or_default()
                .push((alert.host_id.clone(), alert.timestamp));
        }
    }

    /// 윈도우 안에 다른 호스트에서 커밋된 알림이 있는지 확인합니다.
    fn is_cross_host(&self, host_id: &str, ip: &str, now: DateTime<Utc>) -> bool {
        let cutoff = now - self.window;
        self.recent.get(ip).is_some_and(|hits| {
            hits.iter()
                .any(|(other_host, ts)| other_host != host_id && *ts > cutoff)
        })
    }

    /// 한 호스트의 정규화된 배치를 분석합니다.
    ///
    /// 이벤트별 처리 순서:
    /// 1. 공격 시그널이 아니면 건너뜀
    /// 2. 로컬 센티널 IP면 건너뜀
    /// 3. 자연 키 중복이면 건너뜀 (레지스트리 관측도 하지 않음)
    /// 4. 레지스트리 관측 스테이징 (last_seen 갱신)
    /// 5. 신뢰 IP면 알림 없이 종료, UNKNOWN이면 교차 호스트 판정
    /// 6. 심각도와 태그 결정 (교차 호스트와 차단 태그는 겹치지 않음)
    /// 7. 이벤트의 원래 시각을 실은 알림 생성
    pub fn analyze(
        &self,
        host_id: &str,
        events: &[AuthEvent],
        registry: &TrustRegistry,
        now: DateTime<Utc>,
    ) -> AnalysisReport {
        let mut report = AnalysisReport::default();
        report.stats.events_in = events.len();

        // 같은 배치 안에서 앞선 이벤트가 스테이징한 변경을 뒤의 이벤트가
        // 볼 수 있도록 오버레이로 조회합니다.
        let mut staged_registry: BTreeMap<String, IpTrustEntry> = BTreeMap::new();
        let mut staged_keys: HashSet<AlertKey> = HashSet::new();

        for event in events {
            if !event.kind.is_attack() {
                report.stats.non_attack += 1;
                continue;
            }
            if is_local_source(&event.source_ip) {
                report.stats.local_skipped += 1;
                continue;
            }

            let key = AlertKey {
                host_id: host_id.to_owned(),
                source_ip: event.source_ip.clone(),
                kind: event.kind,
                timestamp: event.timestamp,
            };
            if self.seen.contains(&key) || staged_keys.contains(&key) {
                report.stats.deduplicated += 1;
                debug!(host = host_id, ip = %event.source_ip, "alert suppressed as duplicate");
                continue;
            }

            let mut entry = staged_registry
                .get(&event.source_ip)
                .cloned()
                .or_else(|| registry.get(&event.source_ip).cloned())
                .unwrap_or_else(|| IpTrustEntry::new(&event.source_ip, now));
            entry.last_seen = now;
            let prior_status = entry.status;

            if prior_status == TrustStatus::Trusted {
                staged_registry.insert(event.source_ip.clone(), entry);
                report.stats.trusted_suppressed += 1;
                debug!(host = host_id, ip = %event.source_ip, "alert suppressed for trusted ip");
                continue;
            }

            let cross_host = prior_status == TrustStatus::Unknown
                && self.is_cross_host(host_id, &event.source_ip, now);
            if cross_host {
                entry.status = TrustStatus::Banned;
            }
            staged_registry.insert(event.source_ip.clone(), entry);

            let (severity, message) = if cross_host {
                report.stats.cross_host += 1;
                (
                    Severity::Critical,
                    format!("{TAG_CROSS_HOST} {}", event.message),
                )
            } else if prior_status == TrustStatus::Banned {
                report.stats.banned_hits += 1;
                (
                    Severity::Critical,
                    format!("{TAG_BANNED_IP} {}", event.message),
                )
            } else {
                (Severity::Warning, event.message.clone())
            };

            staged_keys.insert(key);
            report.alerts.push(Alert {
                host_id: host_id.to_owned(),
                timestamp: event.timestamp,
                kind: event.kind,
                source_ip: event.source_ip.clone(),
                severity,
                message,
            });
        }

        report.registry_changes = staged_registry.into_values().collect();
        report
    }

    /// 영속화에 성공한 report를 엔진 상태에 반영합니다.
    ///
    /// 레지스트리 변경은 호출자가 [`TrustRegistry::apply`]로 따로
    /// 반영합니다.
    pub fn commit(&mut self, report: &AnalysisReport) {
        for alert in &report.alerts {
            self.seen.insert(alert.key());
            self.recent
                .entry(alert.source_ip.clone())
                .or_default()
                .push((alert.host_id.clone(), alert.timestamp));
        }
        self.alerts_generated += report.alerts.len() as u64;
        self.dedup_suppressed += report.stats.deduplicated as u64;
        self.trusted_suppressed += report.stats.trusted_suppressed as u64;
        self.cross_host_detected += report.stats.cross_host as u64;
    }

    /// 보존 기간이 지난 인덱스 항목을 정리합니다.
    ///
    /// 주기적으로 호출하여 메모리 성장을 방지합니다.
    pub fn cleanup_expired(&mut self, now: DateTime<Utc>) {
        let cutoff = now - self.retention;
        self.seen.retain(|key| key.timestamp > cutoff);
        self.recent.retain(|_, hits| {
            hits.retain(|(_, ts)| *ts > cutoff);
            !hits.is_empty()
        });
    }

    /// 커밋된 총 알림 수를 반환합니다.
    pub fn alerts_generated(&self) -> u64 {
        self.alerts_generated
    }

    /// 중복으로 억제된 누적 수를 반환합니다.
    pub fn dedup_suppressed(&self) -> u64 {
        self.dedup_suppressed
    }

    /// 신뢰 IP로 억제된 누적 수를 반환합니다.
    pub fn trusted_suppressed(&self) -> u64 {
        self.trusted_suppressed
    }

    /// 교차 호스트 판정 누적 수를 반환합니다.
    pub fn cross_host_detected(&self) -> u64 {
        self.cross_host_detected
    }

    /// 최근 알림 인덱스에 올라 있는 IP 수를 반환합니다.
    pub fn tracked_ips(&self) -> usize {
        self.recent.len()
    }
}
