//! 원격 실행 채널 -- 수집기가 호스트에서 명령을 실행할 때 쓰는 trait
//!
//! [`RemoteExecutor`]는 수집기와 전송 계층 사이의 경계입니다.
//! 프로덕션 구현은 [`OpenSshShell`] (시스템 `ssh` 바이너리 호출)이고,
//! 테스트에서는 스크립트된 mock으로 교체해 네트워크 없이 전체 사이클을
//! 검증합니다.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;

use authwatch_core::types::{Host, OsKind};

use crate::config::PipelineConfig;
use crate::error::LogPipelineError;

/// 원격 명령 실행 결과
#[derive(Debug, Clone)]
pub struct RemoteOutput {
    /// 종료 코드 (시그널 종료 시 None)
    pub code: Option<i32>,
    /// 표준 출력 (UTF-8 lossy 디코딩)
    pub stdout: String,
    /// 표준 에러 (UTF-8 lossy 디코딩)
    pub stderr: String,
}

impl RemoteOutput {
    /// 종료 코드 0으로 끝났는지 여부를 반환합니다.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// 원격 실행 채널
///
/// 두 가지 실행 형태를 제공합니다:
/// - [`run`](RemoteExecutor::run): 원격 셸 명령 실행, 종료 코드와 무관하게
///   출력을 반환 (해석은 호출자 몫)
/// - [`run_script`](RemoteExecutor::run_script): 원격 PowerShell 스크립트
///   실행, 비정상 종료 시 에러
#[allow(async_fn_in_trait)]
pub trait RemoteExecutor {
    /// 호스트에서 셸 명령을 실행하고 출력을 반환합니다.
    async fn run(&self, host: &Host, command: &str) -> Result<RemoteOutput, LogPipelineError>;

    /// 호스트에서 PowerShell 스크립트를 실행하고 stdout을 반환합니다.
    ///
    /// 비정상 종료 코드는 [`LogPipelineError::Script`]로 변환됩니다.
    async fn run_script(&self, host: &Host, script: &str) -> Result<String, LogPipelineError>;
}

/// 시스템 `ssh` 바이너리 기반 프로덕션 실행기
///
/// BatchMode로 동작하므로 password 프롬프트 없이 키 인증만 사용합니다.
/// Windows 호스트도 OpenSSH 서버를 통해 같은 채널로 접근하며,
/// `run_script`는 스크립트를 원격 PowerShell 호출로 감쌉니다.
#[derive(Debug, Clone)]
pub struct OpenSshShell {
    ssh_binary: String,
    powershell_binary: String,
    connect_timeout_secs: u64,
    command_timeout_secs: u64,
    identity_file: Option<String>,
}

impl OpenSshShell {
    /// 파이프라인 설정에서 실행기를 생성합니다.
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            ssh_binary: config.ssh_binary.clone(),
            powershell_binary: config.powershell_binary.clone(),
            connect_timeout_secs: config.connect_timeout_secs,
            command_timeout_secs: config.command_timeout_secs,
            identity_file: config.identity_file.clone(),
        }
    }

    /// ssh 호출 인자를 조립합니다.
    ///
    /// 원격 명령은 마지막 인자 하나로 전달하므로 로컬 셸 해석을 거치지
    /// 않습니다.
    fn ssh_args(&self, host: &Host, command: &str) -> Vec<String> {
        let mut args = vec![
            "-o".to_owned(),
            "BatchMode=yes".to_owned(),
            "-o".to_owned(),
            format!("ConnectTimeout={}", self.connect_timeout_secs),
            "-o".to_owned(),
            "StrictHostKeyChecking=accept-new".to_owned(),
            "-p".to_owned(),
            host.port.to_string(),
        ];
        if let Some(identity) = &self.identity_file {
            args.push("-i".to_owned());
            args.push(identity.clone());
        }
        args.push(format!("{}@{}", host.username, host.address));
        args.push(command.to_owned());
        args
    }
}

/// stderr에서 한 줄짜리 실패 사유를 뽑아냅니다.
pub(crate) fn failure_reason(output: &RemoteOutput) -> String {
    match output.stderr.lines().find(|line| !line.trim().is_empty()) {
        Some(line) => line.trim().to_owned(),
        None => match output.code {
            Some(code) => format!("exit status {code}"),
            None => "terminated by signal".to_owned(),
        },
    }
}

impl RemoteExecutor for OpenSshShell {
    async fn run(&self, host: &Host, command: &str) -> Result<RemoteOutput, LogPipelineError> {
        let args = self.ssh_args(host, command);
        tracing::debug!(host = %host.id, command, "running remote command");

        let child = Command::new(&self.ssh_binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output();

        let output = timeout(Duration::from_secs(self.command_timeout_secs), child)
            .await
            .map_err(|_| LogPipelineError::Timeout {
                host: host.id.clone(),
                secs: self.command_timeout_secs,
            })?
            .map_err(|e| LogPipelineError::Remote {
                host: host.id.clone(),
                reason: format!("failed to spawn {}: {e}", self.ssh_binary),
            })?;

        Ok(RemoteOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn run_script(&self, host: &Host, script: &str) -> Result<String, LogPipelineError> {
        debug_assert_eq!(host.os, OsKind::Windows);
        // 스크립트는 큰따옴표 하나로 묶어 원격 cmd.exe에 전달합니다.
        // 수집기가 만드는 스크립트는 작은따옴표만 사용해야 합니다.
        let command = format!(
            "{} -NoProfile -NonInteractive -Command \"{script}\"",
            self.powershell_binary
        );
        let output = self.run(host, &command).await?;

        if !output.success() {
            return Err(LogPipelineError::Script {
                host: host.id.clone(),
                reason: failure_reason(&output),
            });
        }

        Ok(output.stdout)
    }
}
