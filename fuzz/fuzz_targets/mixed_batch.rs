#![no_main]

use arbitrary::Arbitrary;
use chrono::Utc;
use libfuzzer_sys::fuzz_target;

use authwatch_core::types::{Host, OsKind};
use authwatch_log_pipeline::{Normalizer, RawEntry, RawOrigin};

/// 퍼저용 구조적 입력 -- OS가 섞인 배치
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    entries: Vec<FuzzEntry>,
}

#[derive(Arbitrary, Debug)]
struct FuzzEntry {
    windows: bool,
    payload: String,
}

fuzz_target!(|input: FuzzInput| {
    let Ok(normalizer) = Normalizer::new() else {
        return;
    };

    // 항목 수 제한 (성능)
    let entries: Vec<RawEntry> = input
        .entries
        .iter()
        .take(32)
        .map(|e| {
            let origin = if e.windows {
                RawOrigin::WinEventJson
            } else {
                RawOrigin::JournalJson
            };
            RawEntry::new(origin, e.payload.as_str())
        })
        .collect();

    let host = Host {
        id: "fuzz-mixed".to_owned(),
        address: "10.0.0.3".to_owned(),
        os: OsKind::Linux,
        username: "root".to_owned(),
        port: 22,
    };

    // 항목 단위 실패: 입력이 아무리 깨져도 합계는 보존되어야 한다
    let batch = normalizer.normalize_batch(&host, &entries, Utc::now());
    assert_eq!(
        batch.events.len() + batch.unmatched + batch.malformed,
        entries.len()
    );
});
