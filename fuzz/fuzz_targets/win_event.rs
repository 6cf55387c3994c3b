#![no_main]

use chrono::Utc;
use libfuzzer_sys::fuzz_target;

use authwatch_core::types::{Host, OsKind};
use authwatch_log_pipeline::{Normalizer, RawEntry, RawOrigin};

fn fuzz_host() -> Host {
    Host {
        id: "fuzz-windows".to_owned(),
        address: "10.0.0.2".to_owned(),
        os: OsKind::Windows,
        username: "Administrator".to_owned(),
        port: 22,
    }
}

fuzz_target!(|data: &[u8]| {
    let Ok(normalizer) = Normalizer::new() else {
        return;
    };

    // Get-WinEvent 레코드 JSON을 가장한 임의 바이트
    let payload = String::from_utf8_lossy(data);
    let entries = [RawEntry::new(RawOrigin::WinEventJson, payload.as_ref())];

    let batch = normalizer.normalize_batch(&fuzz_host(), &entries, Utc::now());
    assert_eq!(batch.events.len() + batch.unmatched + batch.malformed, 1);
});
