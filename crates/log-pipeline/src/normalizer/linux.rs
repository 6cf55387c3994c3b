//! 리눅스 정규화기 -- journal JSON 라인에서 인증 이벤트를 추출합니다.
//!
//! journalctl 항목의 `MESSAGE` 필드에 sshd/sudo 패턴을 적용합니다.
//! 패턴 우선순위가 중요합니다: "Failed password for invalid user root"처럼
//! 두 패턴이 겹치는 메시지는 비밀번호 실패로 분류해야 하므로
//! `Failed password` 패턴을 먼저 검사합니다.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Deserialize;

use authwatch_core::event::AuthEvent;
use authwatch_core::types::EventKind;

use crate::error::LogPipelineError;
use crate::normalizer::NormalizeOutcome;

/// sshd 비밀번호 인증 실패. 존재하지 않는 사용자의 실패도 포함합니다.
const FAILED_PASSWORD_PATTERN: &str =
    r"Failed password for (?:invalid user )?([\w.-]+) from ([\d.]+)";

/// sshd 존재하지 않는 사용자 시도 (비밀번호 단계 이전)
const INVALID_USER_PATTERN: &str = r"Invalid user ([\w.-]+) from ([\d.]+)";

/// sudo 실행 기록의 syslog 태그 형식
const SUDO_PATTERN: &str = r"sudo:\s+([a-zA-Z0-9._-]+)\s*:";

/// sudo 이벤트의 소스 IP 자리에 기록하는 센티널
const SUDO_SOURCE: &str = "LOCAL";

/// 컴파일된 인증 로그 패턴 모음
///
/// 생성 시 한 번만 컴파일하여 라인 매칭 시 재컴파일 오버헤드를 제거합니다.
pub struct AuthPatterns {
    failed_password: Regex,
    invalid_user: Regex,
    sudo: Regex,
}

impl AuthPatterns {
    /// 내장 패턴을 컴파일합니다.
    pub fn new() -> Result<Self, LogPipelineError> {
        Ok(Self {
            failed_password: Regex::new(FAILED_PASSWORD_PATTERN)?,
            invalid_user: Regex::new(INVALID_USER_PATTERN)?,
            sudo: Regex::new(SUDO_PATTERN)?,
        })
    }

    /// 메시지에서 (이벤트 종류, 사용자, 소스 IP)를 추출합니다.
    ///
    /// 어떤 패턴에도 해당하지 않으면 None을 반환합니다.
    fn classify(&self, message: &str) -> Option<(EventKind, String, String)> {
        if let Some(caps) = self.failed_password.captures(message) {
            return Some((
                EventKind::FailedLogin,
                caps[1].to_owned(),
                caps[2].to_owned(),
            ));
        }
        if let Some(caps) = self.invalid_user.captures(message) {
            return Some((
                EventKind::InvalidUser,
                caps[1].to_owned(),
                caps[2].to_owned(),
            ));
        }
        if let Some(caps) = self.sudo.captures(message) {
            return Some((EventKind::SudoUsage, caps[1].to_owned(), SUDO_SOURCE.to_owned()));
        }
        None
    }
}

/// journal JSON 항목에서 쓰는 필드만 추린 형태
#[derive(Debug, Deserialize)]
struct JournalLine {
    #[serde(rename = "MESSAGE", default)]
    message: Option<String>,
    /// epoch 마이크로초의 십진 문자열
    #[serde(rename = "__REALTIME_TIMESTAMP", default)]
    realtime: Option<String>,
}

/// journal 타임스탬프를 복원합니다. 실패하면 `fallback`을 사용합니다.
fn journal_timestamp(realtime: Option<&str>, fallback: DateTime<Utc>) -> DateTime<Utc> {
    realtime
        .and_then(|raw| raw.parse::<i64>().ok())
        .and_then(DateTime::from_timestamp_micros)
        .unwrap_or(fallback)
}

/// journal JSON 라인 하나를 정규화합니다.
///
/// 원본 메시지 텍스트가 이벤트의 `message`와 `raw_log`에 그대로 들어갑니다.
pub(crate) fn normalize_line(
    patterns: &AuthPatterns,
    payload: &str,
    now: DateTime<Utc>,
) -> NormalizeOutcome {
    let line: JournalLine = match serde_json::from_str(payload) {
        Ok(line) => line,
        Err(e) => return NormalizeOutcome::Malformed(format!("invalid journal json: {e}")),
    };

    let Some(message) = line.message else {
        return NormalizeOutcome::Unmatched;
    };

    let Some((kind, user, source_ip)) = patterns.classify(&message) else {
        return NormalizeOutcome::Unmatched;
    };

    let timestamp = journal_timestamp(line.realtime.as_deref(), now);
    NormalizeOutcome::Event(AuthEvent {
        timestamp,
        kind,
        user,
        source_ip,
        raw_log: message.clone(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn normalize(payload: &str) -> NormalizeOutcome {
        let patterns = AuthPatterns::new().unwrap();
        normalize_line(&patterns, payload, now())
    }

    fn expect_event(payload: &str) -> AuthEvent {
        match normalize(payload) {
            NormalizeOutcome::Event(event) => event,
            other => panic!("expected event, got {other:?}"),
        }
    }

    #[test]
    fn failed_password_extracts_user_and_ip() {
        let event = expect_event(
            r#"{"MESSAGE":"Failed password for root from 10.0.0.5 port 22 ssh2","__REALTIME_TIMESTAMP":"1740830400000000"}"#,
        );
        assert_eq!(event.kind, EventKind::FailedLogin);
        assert_eq!(event.user, "root");
        assert_eq!(event.source_ip, "10.0.0.5");
        assert_eq!(event.timestamp, now());
    }

    // "invalid user"가 포함돼도 비밀번호 실패 패턴이 우선합니다.
    #[test]
    fn failed_password_for_invalid_user_wins_priority() {
        let event = expect_event(
            r#"{"MESSAGE":"Failed password for invalid user root from 10.0.0.5 port 22 ssh2"}"#,
        );
        assert_eq!(event.kind, EventKind::FailedLogin);
        assert_eq!(event.user, "root");
        assert_eq!(event.source_ip, "10.0.0.5");
    }

    #[test]
    fn invalid_user_attempt() {
        let event = expect_event(r#"{"MESSAGE":"Invalid user admin from 203.0.113.9"}"#);
        assert_eq!(event.kind, EventKind::InvalidUser);
        assert_eq!(event.user, "admin");
        assert_eq!(event.source_ip, "203.0.113.9");
    }

    #[test]
    fn sudo_usage_maps_to_local_source() {
        let event = expect_event(
            r#"{"MESSAGE":"sudo: alice : TTY=pts/0 ; PWD=/home/alice ; USER=root ; COMMAND=/bin/ls"}"#,
        );
        assert_eq!(event.kind, EventKind::SudoUsage);
        assert_eq!(event.user, "alice");
        assert_eq!(event.source_ip, "LOCAL");
    }

    #[test]
    fn message_and_raw_log_keep_journal_text() {
        let event = expect_event(r#"{"MESSAGE":"Invalid user admin from 203.0.113.9"}"#);
        assert_eq!(event.message, "Invalid user admin from 203.0.113.9");
        assert_eq!(event.raw_log, event.message);
    }

    #[test]
    fn unrelated_message_is_unmatched() {
        assert!(matches!(
            normalize(r#"{"MESSAGE":"Accepted publickey for ops from 10.0.0.9 port 50000"}"#),
            NormalizeOutcome::Unmatched
        ));
    }

    // pam의 "sudo:session" 태그에는 콜론 뒤 공백이 없어 매칭되지 않습니다.
    #[test]
    fn pam_session_line_is_unmatched() {
        assert!(matches!(
            normalize(r#"{"MESSAGE":"pam_unix(sudo:session): session opened for user root"}"#),
            NormalizeOutcome::Unmatched
        ));
    }

    #[test]
    fn missing_message_field_is_unmatched() {
        assert!(matches!(
            normalize(r#"{"__REALTIME_TIMESTAMP":"1740830400000000"}"#),
            NormalizeOutcome::Unmatched
        ));
    }

    #[test]
    fn invalid_json_is_malformed() {
        assert!(matches!(
            normalize("journalctl: command not found"),
            NormalizeOutcome::Malformed(_)
        ));
    }

    #[test]
    fn unparsable_timestamp_falls_back_to_now() {
        let event = expect_event(
            r#"{"MESSAGE":"Invalid user admin from 203.0.113.9","__REALTIME_TIMESTAMP":"not-a-number"}"#,
        );
        assert_eq!(event.timestamp, now());
    }

    #[test]
    fn missing_timestamp_falls_back_to_now() {
        let event = expect_event(r#"{"MESSAGE":"Invalid user admin from 203.0.113.9"}"#);
        assert_eq!(event.timestamp, now());
    }

    #[test]
    fn dotted_and_dashed_usernames_match() {
        let event = expect_event(
            r#"{"MESSAGE":"Failed password for svc-backup.prod from 198.51.100.7 port 22"}"#,
        );
        assert_eq!(event.user, "svc-backup.prod");
    }

    // 임의 입력에 대한 속성 검증
    #[cfg(test)]
    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn normalize_arbitrary_payload_does_not_panic(payload in any::<String>()) {
                let patterns = AuthPatterns::new().unwrap();
                let _ = normalize_line(&patterns, &payload, now());
            }

            #[test]
            fn well_formed_journal_line_is_never_malformed(
                message in "\\PC{0,200}",
                realtime in "\\PC{0,30}",
            ) {
                let patterns = AuthPatterns::new().unwrap();
                let payload = serde_json::json!({
                    "MESSAGE": message,
                    "__REALTIME_TIMESTAMP": realtime,
                })
                .to_string();
                let outcome = normalize_line(&patterns, &payload, now());
                prop_assert!(!matches!(outcome, NormalizeOutcome::Malformed(_)));
            }

            #[test]
            fn matched_events_carry_user_and_source_ip(
                user in "[a-z][a-z0-9._-]{0,30}",
                a in 0u8..=255,
                b in 0u8..=255,
                c in 0u8..=255,
                d in 0u8..=255,
            ) {
                let patterns = AuthPatterns::new().unwrap();
                let ip = format!("{a}.{b}.{c}.{d}");
                let payload = serde_json::json!({
                    "MESSAGE": format!("Failed password for {user} from {ip} port 22 ssh2"),
                })
                .to_string();
                match normalize_line(&patterns, &payload, now()) {
                    NormalizeOutcome::Event(event) => {
                        prop_assert_eq!(event.kind, EventKind::FailedLogin);
                        prop_assert_eq!(event.user, user);
                        prop_assert_eq!(event.source_ip, ip);
                    }
                    other => prop_assert!(false, "expected event, got {:?}", other),
                }
            }
        }
    }
}
