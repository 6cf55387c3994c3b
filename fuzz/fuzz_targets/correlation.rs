#![no_main]

use std::path::Path;

use arbitrary::Arbitrary;
use chrono::{DateTime, Duration, Utc};
use libfuzzer_sys::fuzz_target;

use authwatch_core::event::AuthEvent;
use authwatch_core::types::{EventKind, TrustStatus};
use authwatch_log_pipeline::{CorrelationEngine, TrustRegistry};

/// 퍼저용 구조적 입력
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    /// 분석할 이벤트 목록 (최대 16개로 제한)
    events: Vec<FuzzEvent>,
    /// 레지스트리에 미리 심어둘 상태
    statuses: Vec<([u8; 4], FuzzStatus)>,
}

#[derive(Arbitrary, Debug)]
struct FuzzEvent {
    kind: FuzzKind,
    /// true면 두 번째 호스트에서 온 이벤트 (교차 호스트 경로)
    other_host: bool,
    /// true면 소스 IP 대신 로컬 센티널
    local: bool,
    octets: [u8; 4],
    user: String,
    offset_secs: i16,
}

#[derive(Arbitrary, Debug)]
enum FuzzKind {
    FailedLogin,
    InvalidUser,
    SudoUsage,
    WinFailedLogin,
    SshWindowsLogin,
}

#[derive(Arbitrary, Debug)]
enum FuzzStatus {
    Unknown,
    Trusted,
    Banned,
}

impl FuzzKind {
    fn to_event_kind(&self) -> EventKind {
        match self {
            FuzzKind::FailedLogin => EventKind::FailedLogin,
            FuzzKind::InvalidUser => EventKind::InvalidUser,
            FuzzKind::SudoUsage => EventKind::SudoUsage,
            FuzzKind::WinFailedLogin => EventKind::WinFailedLogin,
            FuzzKind::SshWindowsLogin => EventKind::SshWindowsLogin,
        }
    }
}

impl FuzzStatus {
    fn to_trust_status(&self) -> TrustStatus {
        match self {
            FuzzStatus::Unknown => TrustStatus::Unknown,
            FuzzStatus::Trusted => TrustStatus::Trusted,
            FuzzStatus::Banned => TrustStatus::Banned,
        }
    }
}

fn base_time() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH + Duration::seconds(1_700_000_000)
}

fuzz_target!(|input: FuzzInput| {
    let now = base_time();

    // 존재하지 않는 경로면 load는 빈 레지스트리를 돌려준다 (디스크 I/O 없음)
    let Ok(mut registry) = TrustRegistry::load(Path::new("/nonexistent/authwatch-fuzz"))
    else {
        return;
    };
    for (octets, status) in input.statuses.iter().take(16) {
        let ip = format!("{}.{}.{}.{}", octets[0], octets[1], octets[2], octets[3]);
        registry.set_status(&ip, status.to_trust_status(), now);
    }

    let events: Vec<AuthEvent> = input
        .events
        .iter()
        .take(16)
        .map(|e| {
            let ip = if e.local {
                "LOCAL".to_owned()
            } else {
                format!("{}.{}.{}.{}", e.octets[0], e.octets[1], e.octets[2], e.octets[3])
            };
            AuthEvent::new(
                now + Duration::seconds(e.offset_secs as i64),
                e.kind.to_event_kind(),
                e.user.as_str(),
                ip,
                "fuzz raw line",
            )
        })
        .collect();

    let mut engine = CorrelationEngine::new(600, 3600);

    // 첫 배치: 알림 수는 입력 이벤트 수를 넘을 수 없다
    let report = engine.analyze("fuzz-host", &events, &registry, now);
    assert_eq!(report.stats.events_in, events.len());
    assert!(report.alerts.len() <= events.len());
    engine.commit(&report);

    // 같은 배치를 다른 호스트에서 재분석 -- 중복 제거와 교차 호스트
    // 인덱스가 채워진 상태에서도 크래시가 없어야 한다
    let host_id = if input.events.iter().any(|e| e.other_host) {
        "fuzz-host-2"
    } else {
        "fuzz-host"
    };
    let second = engine.analyze(host_id, &events, &registry, now);
    assert!(second.alerts.len() <= events.len());
    engine.commit(&second);

    engine.cleanup_expired(now + Duration::seconds(7200));
});
