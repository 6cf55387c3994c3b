//! 상관 분석 벤치마크
//!
//! 중복 제거 인덱스와 교차 호스트 판정을 포함한 분석 처리량을 측정합니다.

use chrono::{DateTime, Duration, TimeZone, Utc};
use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};

use authwatch_core::event::{Alert, AuthEvent};
use authwatch_core::types::{EventKind, Severity, TrustStatus};
use authwatch_log_pipeline::correlate::CorrelationEngine;
use authwatch_log_pipeline::registry::TrustRegistry;

const WINDOW_SECS: u64 = 600;
const RETENTION_SECS: u64 = 86_400;

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
}

fn attack(ip: &str, offset_secs: i64) -> AuthEvent {
    AuthEvent::new(
        base_time() + Duration::seconds(offset_secs),
        EventKind::FailedLogin,
        "root",
        ip,
        "Failed password for root",
    )
}

/// 서로 다른 IP에서 온 공격 이벤트 배치
fn distinct_ip_batch(count: usize) -> Vec<AuthEvent> {
    (0..count)
        .map(|i| attack(&format!("203.0.113.{}", i % 250 + 1), i as i64))
        .collect()
}

fn empty_registry(dir: &tempfile::TempDir) -> TrustRegistry {
    TrustRegistry::load(dir.path()).unwrap()
}

fn bench_analyze(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let registry = empty_registry(&dir);
    let engine = CorrelationEngine::new(WINDOW_SECS, RETENTION_SECS);
    let now = base_time() + Duration::seconds(3_600);

    let mut group = c.benchmark_group("analyze");

    group.throughput(Throughput::Elements(1));
    let single = vec![attack("203.0.113.9", 0)];
    group.bench_function("single_event", |b| {
        b.iter(|| engine.analyze(black_box("web-01"), black_box(&single), &registry, now))
    });

    group.throughput(Throughput::Elements(100));
    let batch = distinct_ip_batch(100);
    group.bench_function("batch_100_distinct_ips", |b| {
        b.iter(|| engine.analyze(black_box("web-01"), black_box(&batch), &registry, now))
    });

    group.throughput(Throughput::Elements(1000));
    let batch = distinct_ip_batch(1000);
    group.bench_function("batch_1000", |b| {
        b.iter(|| engine.analyze(black_box("web-01"), black_box(&batch), &registry, now))
    });

    group.finish();
}

fn bench_analyze_with_populated_registry(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let mut registry = empty_registry(&dir);
    let now = base_time() + Duration::seconds(3_600);
    // trusted/banned가 섞인 큰 레지스트리
    for i in 0..2_000u32 {
        let ip = format!("198.51.{}.{}", i / 250, i % 250 + 1);
        let status = match i % 3 {
            0 => TrustStatus::Trusted,
            1 => TrustStatus::Banned,
            _ => TrustStatus::Unknown,
        };
        registry.set_status(&ip, status, now);
    }
    let engine = CorrelationEngine::new(WINDOW_SECS, RETENTION_SECS);
    let batch: Vec<AuthEvent> = (0..100)
        .map(|i| attack(&format!("198.51.0.{}", i % 250 + 1), i as i64))
        .collect();

    let mut group = c.benchmark_group("analyze_populated_registry");
    group.throughput(Throughput::Elements(100));
    group.bench_function("batch_100_2000_known_ips", |b| {
        b.iter(|| engine.analyze(black_box("web-01"), black_box(&batch), &registry, now))
    });
    group.finish();
}

fn bench_analyze_after_rehydrate(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let registry = empty_registry(&dir);
    let now = base_time() + Duration::seconds(3_600);

    // 보존 기간 내 알림 10,000건으로 재구성된 엔진
    let alerts: Vec<Alert> = (0..10_000)
        .map(|i| Alert {
            host_id: format!("web-{:02}", i % 20),
            timestamp: base_time() + Duration::seconds(i as i64 % 3_000),
            kind: EventKind::FailedLogin,
            source_ip: format!("203.0.113.{}", i % 250 + 1),
            severity: Severity::Warning,
            message: "Failed password for root".to_owned(),
        })
        .collect();
    let mut engine = CorrelationEngine::new(WINDOW_SECS, RETENTION_SECS);
    engine.rehydrate(&alerts);

    let batch = distinct_ip_batch(100);

    let mut group = c.benchmark_group("analyze_rehydrated");
    group.throughput(Throughput::Elements(100));
    group.bench_function("batch_100_10000_seen", |b| {
        b.iter(|| engine.analyze(black_box("db-01"), black_box(&batch), &registry, now))
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_analyze,
    bench_analyze_with_populated_registry,
    bench_analyze_after_rehydrate
);
criterion_main!(benches);
