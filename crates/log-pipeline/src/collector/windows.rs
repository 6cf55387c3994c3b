//! Windows 수집기 -- PowerShell `Get-WinEvent`로 로그인 실패 이벤트를 가져옵니다.
//!
//! 쿼리는 두 가지를 순서대로 실행합니다:
//! 1. 보안 감사 로그의 이벤트 ID 4625 (로그인 실패)
//! 2. OpenSSH/Operational 로그의 비밀번호 인증 실패
//!
//! 두 쿼리 모두 `ConvertTo-Json -Compress`로 직렬화한 레코드를 stdout으로
//! 내보냅니다. PowerShell은 결과가 하나면 객체를, 여럿이면 배열을 출력하므로
//! 두 형태를 모두 받아들입니다. 한 쿼리의 출력이 JSON이 아니면 그 쿼리만
//! 건너뛰고, 전송 계층 실패는 호스트 전체 수집 실패로 전파합니다.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use authwatch_core::types::Host;

use crate::collector::{RawEntry, RawOrigin};
use crate::config::PipelineConfig;
use crate::error::LogPipelineError;
use crate::executor::RemoteExecutor;

/// StartTime 필터에 쓰는 타임스탬프 형식
///
/// 원격 호스트의 `[datetime]` 파싱은 타임존 표기가 없는 문자열을 받으므로
/// 워터마크를 UTC 벽시계 값으로 내려보냅니다. 수신한 TimeCreated도 같은
/// 규칙(UTC)으로 해석해 왕복이 일관되게 유지됩니다.
fn format_start_time(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// 보안 감사 로그(이벤트 ID 4625) 쿼리 스크립트를 조립합니다.
///
/// 이벤트 본문은 XML이므로 `EventData`를 해시테이블로 펼쳐 `IpAddress`와
/// `TargetUserName`만 추립니다. 첫 수집(워터마크 없음)은 최신 이벤트
/// `max_events`건으로 제한합니다.
pub(crate) fn security_query(watermark: Option<DateTime<Utc>>, max_events: u32) -> String {
    let (filter, limit) = match watermark {
        Some(ts) => (
            format!(
                "@{{LogName='Security'; Id=4625; StartTime=[datetime]'{}'}}",
                format_start_time(ts)
            ),
            String::new(),
        ),
        None => (
            "@{LogName='Security'; Id=4625}".to_owned(),
            format!(" -MaxEvents {max_events}"),
        ),
    };
    format!(
        "try {{ Get-WinEvent -FilterHashtable {filter}{limit} -ErrorAction SilentlyContinue | \
         ForEach-Object {{ $xml = [xml]$_.ToXml(); $data = @{{}}; \
         $xml.Event.EventData.Data | ForEach-Object {{ $data[$_.Name] = $_.'#text' }}; \
         [PSCustomObject]@{{ Timestamp = $_.TimeCreated.ToString('yyyy-MM-dd HH:mm:ss'); \
         IpAddress = $data['IpAddress']; User = $data['TargetUserName']; EventId = $_.Id }} }} | \
         ConvertTo-Json -Compress }} catch {{ }}"
    )
}

/// OpenSSH 운영 로그 쿼리 스크립트를 조립합니다.
///
/// 메시지 본문에서 사용자와 출발지 IP를 정규식으로 추출하고, 레코드에
/// `Type` 필드를 실어 정규화 단계가 이벤트 종류를 구분하게 합니다.
pub(crate) fn openssh_query(watermark: Option<DateTime<Utc>>, max_events: u32) -> String {
    let (filter, limit) = match watermark {
        Some(ts) => (
            format!(
                "@{{LogName='OpenSSH/Operational'; StartTime=[datetime]'{}'}}",
                format_start_time(ts)
            ),
            String::new(),
        ),
        None => (
            "@{LogName='OpenSSH/Operational'}".to_owned(),
            format!(" -MaxEvents {max_events}"),
        ),
    };
    format!(
        "try {{ Get-WinEvent -FilterHashtable {filter}{limit} -ErrorAction SilentlyContinue | \
         ForEach-Object {{ if ($_.Message -match 'Failed password for (?:invalid user )?(.+) from ([\\d\\.]+)') {{ \
         [PSCustomObject]@{{ Timestamp = $_.TimeCreated.ToString('yyyy-MM-dd HH:mm:ss'); \
         IpAddress = $matches[2]; User = $matches[1]; Type = 'SSH_WINDOWS_LOGIN' }} }} }} | \
         ConvertTo-Json -Compress }} catch {{ }}"
    )
}

/// 쿼리 stdout을 레코드 목록으로 해석합니다.
///
/// 빈 출력은 레코드 0건, 객체는 1건, 배열은 요소별 1건입니다.
/// 그 밖의 형태는 None을 반환하며 호출자가 해당 쿼리를 건너뜁니다.
fn parse_query_output(stdout: &str) -> Option<Vec<serde_json::Value>> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Some(Vec::new());
    }
    match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(serde_json::Value::Object(map)) => Some(vec![serde_json::Value::Object(map)]),
        Ok(serde_json::Value::Array(items)) => Some(items),
        Ok(_) | Err(_) => None,
    }
}

/// 호스트에서 Windows 이벤트 로그를 수집합니다.
pub async fn collect<E: RemoteExecutor>(
    executor: &E,
    config: &PipelineConfig,
    host: &Host,
    watermark: Option<DateTime<Utc>>,
) -> Result<Vec<RawEntry>, LogPipelineError> {
    let queries = [
        (
            "security",
            security_query(watermark, config.windows_first_fetch_events),
        ),
        (
            "openssh",
            openssh_query(watermark, config.windows_first_fetch_events),
        ),
    ];

    let mut entries = Vec::new();
    for (name, script) in queries {
        let stdout = executor.run_script(host, &script).await?;
        match parse_query_output(&stdout) {
            Some(records) => {
                for record in records {
                    entries.push(RawEntry::new(RawOrigin::WinEventJson, record.to_string()));
                }
            }
            None => {
                warn!(host = %host.id, query = name, "query output is not valid JSON, skipping query");
            }
        }
    }

    debug!(host = %host.id, count = entries.len(), "collected windows event records");
    Ok(entries)
}
