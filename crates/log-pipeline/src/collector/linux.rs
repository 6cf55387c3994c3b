//! 리눅스 수집기 -- 원격 `journalctl`에서 sshd 인증 로그를 가져옵니다.
//!
//! journalctl의 `-o json` 출력은 이벤트당 JSON 한 줄이므로, stdout을
//! 줄 단위로 잘라 [`RawEntry`]로 전달합니다. 개별 줄의 JSON 유효성은
//! 여기서 검사하지 않습니다.

use chrono::{DateTime, Utc};
use tracing::debug;

use authwatch_core::types::Host;

use crate::collector::{RawEntry, RawOrigin};
use crate::config::PipelineConfig;
use crate::error::LogPipelineError;
use crate::executor::{RemoteExecutor, failure_reason};

/// 수집용 journalctl 명령을 조립합니다.
///
/// 워터마크가 있으면 epoch 초 형식(`@{secs}`)으로 하한을 지정합니다.
/// 문자열 타임스탬프와 달리 원격 호스트의 타임존 설정에 영향을 받지
/// 않습니다. 워터마크가 없는 첫 수집은 설정된 lookback 표현을 그대로
/// 사용합니다 (예: `"7 days ago"`).
pub(crate) fn journalctl_command(config: &PipelineConfig, watermark: Option<DateTime<Utc>>) -> String {
    let since = match watermark {
        Some(ts) => format!("@{}", ts.timestamp()),
        None => config.first_fetch_lookback.clone(),
    };
    format!(
        "sudo journalctl -u {} -o json --no-pager --since \"{since}\"",
        config.journal_unit
    )
}

/// 호스트에서 journal 로그를 수집합니다.
pub async fn collect<E: RemoteExecutor>(
    executor: &E,
    config: &PipelineConfig,
    host: &Host,
    watermark: Option<DateTime<Utc>>,
) -> Result<Vec<RawEntry>, LogPipelineError> {
    let command = journalctl_command(config, watermark);
    let output = executor.run(host, &command).await?;

    if !output.success() {
        return Err(LogPipelineError::Remote {
            host: host.id.clone(),
            reason: failure_reason(&output),
        });
    }

    let entries: Vec<RawEntry> = output
        .stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| RawEntry::new(RawOrigin::JournalJson, line))
        .collect();

    debug!(host = %host.id, count = entries.len(), "collected journal entries");
    Ok(entries)
}
