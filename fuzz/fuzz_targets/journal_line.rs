#![no_main]

use chrono::Utc;
use libfuzzer_sys::fuzz_target;

use authwatch_core::types::{Host, OsKind};
use authwatch_log_pipeline::{Normalizer, RawEntry, RawOrigin};

fn fuzz_host() -> Host {
    Host {
        id: "fuzz-linux".to_owned(),
        address: "10.0.0.1".to_owned(),
        os: OsKind::Linux,
        username: "root".to_owned(),
        port: 22,
    }
}

fuzz_target!(|data: &[u8]| {
    let Ok(normalizer) = Normalizer::new() else {
        return;
    };

    // journalctl 출력을 가장한 임의 바이트 -- 크래시나 패닉 없이
    // Event/Unmatched/Malformed 중 하나로 분류되어야 한다
    let payload = String::from_utf8_lossy(data);
    let entries = [RawEntry::new(RawOrigin::JournalJson, payload.as_ref())];

    let batch = normalizer.normalize_batch(&fuzz_host(), &entries, Utc::now());
    assert_eq!(batch.events.len() + batch.unmatched + batch.malformed, 1);
});
