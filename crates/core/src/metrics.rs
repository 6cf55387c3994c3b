//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 컴포넌트는 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `authwatch_`
//! - 컴포넌트명: `pipeline_`, `daemon_`
//! - 접미어: `_total` (counter), `_seconds` (histogram/latency), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use authwatch_core::metrics;
//! use metrics::counter;
//!
//! counter!(authwatch_core::metrics::PIPELINE_CYCLES_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 호스트 레이블 키 (플릿 호스트 id)
pub const LABEL_HOST: &str = "host";

/// 운영체제 레이블 키 (linux, windows)
pub const LABEL_OS: &str = "os";

/// 심각도 레이블 키 (warning, critical)
pub const LABEL_SEVERITY: &str = "severity";

/// 사이클 실패 단계 레이블 키 (collect, normalize, persist, analyze, commit)
pub const LABEL_STEP: &str = "step";

/// 알림 억제 사유 레이블 키 (dedup, trusted, local)
pub const LABEL_REASON: &str = "reason";

/// 신뢰 상태 레이블 키 (unknown, trusted, banned)
pub const LABEL_STATUS: &str = "status";

// ─── Pipeline 메트릭 ────────────────────────────────────────────────

/// Pipeline: 완료된 수집 사이클 수 (counter, label: host)
pub const PIPELINE_CYCLES_TOTAL: &str = "authwatch_pipeline_cycles_total";

/// Pipeline: 실패한 수집 사이클 수 (counter, labels: host, step)
pub const PIPELINE_CYCLE_FAILURES_TOTAL: &str = "authwatch_pipeline_cycle_failures_total";

/// Pipeline: 원격에서 수집된 원본 엔트리 수 (counter, label: host)
pub const PIPELINE_ENTRIES_COLLECTED_TOTAL: &str = "authwatch_pipeline_entries_collected_total";

/// Pipeline: 정규화에 성공한 이벤트 수 (counter, label: host)
pub const PIPELINE_EVENTS_NORMALIZED_TOTAL: &str = "authwatch_pipeline_events_normalized_total";

/// Pipeline: 형식 불량으로 건너뛴 엔트리 수 (counter, label: host)
pub const PIPELINE_ENTRIES_SKIPPED_TOTAL: &str = "authwatch_pipeline_entries_skipped_total";

/// Pipeline: 생성된 알림 수 (counter, label: severity)
pub const PIPELINE_ALERTS_TOTAL: &str = "authwatch_pipeline_alerts_total";

/// Pipeline: 억제된 알림 후보 수 (counter, label: reason)
pub const PIPELINE_ALERTS_SUPPRESSED_TOTAL: &str = "authwatch_pipeline_alerts_suppressed_total";

/// Pipeline: 수집 사이클 소요 시간 (histogram, 초)
pub const PIPELINE_CYCLE_DURATION_SECONDS: &str = "authwatch_pipeline_cycle_duration_seconds";

/// Pipeline: 레지스트리에 등록된 IP 수 (gauge, label: status)
pub const PIPELINE_KNOWN_IPS: &str = "authwatch_pipeline_known_ips";

// ─── Daemon 메트릭 ──────────────────────────────────────────────────

/// Daemon: 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "authwatch_daemon_uptime_seconds";

/// Daemon: 완료된 플릿 스윕 수 (counter)
pub const DAEMON_SWEEPS_TOTAL: &str = "authwatch_daemon_sweeps_total";

/// Daemon: 빌드 정보 (gauge, 항상 1, label: version)
pub const DAEMON_BUILD_INFO: &str = "authwatch_daemon_build_info";

// ─── 히스토그램 버킷 정의 ────────────────────────────────────────────

/// 수집 사이클 소요 시간 히스토그램 버킷 (초)
///
/// 100ms ~ 120s 범위. SSH 왕복과 원격 명령 실행이 포함되므로 초 단위가 보통입니다.
pub const CYCLE_DURATION_BUCKETS: [f64; 9] = [0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// `metrics::describe_counter!()`, `describe_gauge!()`, `describe_histogram!()`을
/// 호출하여 Prometheus HELP 텍스트를 설정합니다.
///
/// 이 함수는 전역 레코더 설치 후 한 번만 호출해야 합니다.
/// 일반적으로 `authwatch-daemon`의 시작 시점에서 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    // Pipeline
    describe_counter!(
        PIPELINE_CYCLES_TOTAL,
        "Total number of completed fetch cycles per host"
    );
    describe_counter!(
        PIPELINE_CYCLE_FAILURES_TOTAL,
        "Total number of failed fetch cycles per host and step"
    );
    describe_counter!(
        PIPELINE_ENTRIES_COLLECTED_TOTAL,
        "Total number of raw entries collected from remote hosts"
    );
    describe_counter!(
        PIPELINE_EVENTS_NORMALIZED_TOTAL,
        "Total number of entries successfully normalized into events"
    );
    describe_counter!(
        PIPELINE_ENTRIES_SKIPPED_TOTAL,
        "Total number of malformed entries skipped during normalization"
    );
    describe_counter!(
        PIPELINE_ALERTS_TOTAL,
        "Total number of alerts created by the correlation engine"
    );
    describe_counter!(
        PIPELINE_ALERTS_SUPPRESSED_TOTAL,
        "Total number of alert candidates suppressed (dedup, trusted, local)"
    );
    describe_histogram!(
        PIPELINE_CYCLE_DURATION_SECONDS,
        "Time to run a single fetch cycle in seconds"
    );
    describe_gauge!(
        PIPELINE_KNOWN_IPS,
        "Number of IPs in the trust registry by status"
    );

    // Daemon
    describe_gauge!(DAEMON_UPTIME_SECONDS, "Authwatch daemon uptime in seconds");
    describe_counter!(
        DAEMON_SWEEPS_TOTAL,
        "Total number of completed fleet sweeps"
    );
    describe_gauge!(
        DAEMON_BUILD_INFO,
        "Build information (always 1, with version label)"
    );
}
