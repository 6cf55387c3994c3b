//! Windows 정규화기 -- `Get-WinEvent` 레코드 JSON을 인증 이벤트로 변환합니다.
//!
//! 레코드는 수집 쿼리가 만든 평탄한 JSON 객체입니다. 보안 감사 쿼리는
//! `EventId`만 싣고, OpenSSH 쿼리는 `Type` 필드로 이벤트 종류를 지정합니다.
//! `Type`이 없으면 보안 감사 로그인 실패(WIN_FAILED_LOGIN)로 간주합니다.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;

use authwatch_core::event::AuthEvent;
use authwatch_core::types::EventKind;

use crate::normalizer::NormalizeOutcome;

/// 네트워크 출발지가 없는 로그인의 소스 IP 자리에 기록하는 센티널
const LOCAL_CONSOLE: &str = "LOCAL_CONSOLE";

/// 사용자 이름을 추출할 수 없을 때의 대체 값
const UNKNOWN_USER: &str = "UNKNOWN";

/// 수집 쿼리가 TimeCreated를 직렬화하는 형식 (UTC 벽시계)
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 수집 쿼리가 내보내는 레코드에서 쓰는 필드만 추린 형태
#[derive(Debug, Deserialize)]
struct WinRecord {
    #[serde(rename = "Timestamp", default)]
    timestamp: Option<String>,
    #[serde(rename = "IpAddress", default)]
    ip_address: Option<String>,
    #[serde(rename = "User", default)]
    user: Option<String>,
    #[serde(rename = "Type", default)]
    kind: Option<String>,
}

/// 레코드 타임스탬프를 복원합니다. 실패하면 `fallback`을 사용합니다.
fn record_timestamp(raw: Option<&str>, fallback: DateTime<Utc>) -> DateTime<Utc> {
    raw.and_then(|s| NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).ok())
        .map(|naive| naive.and_utc())
        .unwrap_or(fallback)
}

/// IpAddress 값을 소스 IP로 변환합니다.
///
/// 이벤트 로그는 출발지가 없는 로그인에 빈 문자열, `-`, 루프백 주소를
/// 기록하므로 전부 LOCAL_CONSOLE 센티널로 정규화합니다.
fn source_ip(raw: Option<&str>) -> String {
    match raw {
        Some(ip) if !ip.is_empty() && ip != "-" && ip != "::1" => ip.to_owned(),
        _ => LOCAL_CONSOLE.to_owned(),
    }
}

/// Windows 이벤트 레코드 하나를 정규화합니다.
///
/// 레코드 JSON 원문이 이벤트의 `raw_log`가 되고, `message`는
/// "{종류} for user: {사용자}" 형식으로 합성됩니다.
pub(crate) fn normalize_record(payload: &str, now: DateTime<Utc>) -> NormalizeOutcome {
    let record: WinRecord = match serde_json::from_str(payload) {
        Ok(record) => record,
        Err(e) => return NormalizeOutcome::Malformed(format!("invalid event record: {e}")),
    };

    let kind = match record.kind.as_deref() {
        None => EventKind::WinFailedLogin,
        Some(name) => match EventKind::from_wire(name) {
            Some(kind) => kind,
            None => {
                return NormalizeOutcome::Malformed(format!("unknown event type: {name}"));
            }
        },
    };

    let timestamp = record_timestamp(record.timestamp.as_deref(), now);
    let user = record.user.unwrap_or_else(|| UNKNOWN_USER.to_owned());
    let ip = source_ip(record.ip_address.as_deref());

    NormalizeOutcome::Event(AuthEvent::new(timestamp, kind, user, ip, payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn expect_event(payload: &str) -> AuthEvent {
        match normalize_record(payload, now()) {
            NormalizeOutcome::Event(event) => event,
            other => panic!("expected event, got {other:?}"),
        }
    }

    #[test]
    fn security_record_maps_to_win_failed_login() {
        let event = expect_event(
            r#"{"Timestamp":"2025-03-01 11:58:30","IpAddress":"203.0.113.9","User":"admin","EventId":4625}"#,
        );
        assert_eq!(event.kind, EventKind::WinFailedLogin);
        assert_eq!(event.user, "admin");
        assert_eq!(event.source_ip, "203.0.113.9");
        assert_eq!(
            event.timestamp,
            Utc.with_ymd_and_hms(2025, 3, 1, 11, 58, 30).unwrap()
        );
    }

    #[test]
    fn message_is_synthesized_and_raw_log_keeps_record() {
        let payload = r#"{"Timestamp":"2025-03-01 11:58:30","IpAddress":"203.0.113.9","User":"admin","EventId":4625}"#;
        let event = expect_event(payload);
        assert_eq!(event.message, "WIN_FAILED_LOGIN for user: admin");
        assert_eq!(event.raw_log, payload);
    }

    #[test]
    fn type_field_selects_openssh_kind() {
        let event = expect_event(
            r#"{"Timestamp":"2025-03-01 11:59:00","IpAddress":"198.51.100.7","User":"root","Type":"SSH_WINDOWS_LOGIN"}"#,
        );
        assert_eq!(event.kind, EventKind::SshWindowsLogin);
        assert_eq!(event.message, "SSH_WINDOWS_LOGIN for user: root");
    }

    #[test]
    fn unknown_type_is_malformed() {
        assert!(matches!(
            normalize_record(r#"{"Timestamp":"2025-03-01 11:59:00","Type":"WEIRD"}"#, now()),
            NormalizeOutcome::Malformed(_)
        ));
    }

    #[test]
    fn sourceless_addresses_become_local_console() {
        for payload in [
            r#"{"IpAddress":"","User":"a","EventId":4625}"#,
            r#"{"IpAddress":"-","User":"a","EventId":4625}"#,
            r#"{"IpAddress":"::1","User":"a","EventId":4625}"#,
            r#"{"User":"a","EventId":4625}"#,
        ] {
            let event = expect_event(payload);
            assert_eq!(event.source_ip, "LOCAL_CONSOLE", "payload: {payload}");
        }
    }

    #[test]
    fn null_or_missing_user_becomes_unknown() {
        for payload in [
            r#"{"IpAddress":"1.2.3.4","User":null,"EventId":4625}"#,
            r#"{"IpAddress":"1.2.3.4","EventId":4625}"#,
        ] {
            let event = expect_event(payload);
            assert_eq!(event.user, "UNKNOWN", "payload: {payload}");
        }
    }

    #[test]
    fn unparsable_timestamp_falls_back_to_now() {
        let event = expect_event(
            r#"{"Timestamp":"yesterday","IpAddress":"1.2.3.4","User":"a","EventId":4625}"#,
        );
        assert_eq!(event.timestamp, now());
    }

    #[test]
    fn missing_timestamp_falls_back_to_now() {
        let event = expect_event(r#"{"IpAddress":"1.2.3.4","User":"a","EventId":4625}"#);
        assert_eq!(event.timestamp, now());
    }

    #[test]
    fn non_object_payload_is_malformed() {
        assert!(matches!(
            normalize_record("42", now()),
            NormalizeOutcome::Malformed(_)
        ));
        assert!(matches!(
            normalize_record("#< CLIXML", now()),
            NormalizeOutcome::Malformed(_)
        ));
    }
}
