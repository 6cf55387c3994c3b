//! 도메인 타입 -- 이벤트 종류, 심각도, IP 신뢰 상태, 플릿 호스트

use std::fmt;

use serde::{Deserialize, Serialize};

// --- 로컬 소스 센티널 ---

/// 원격 IP가 아닌 로컬 세션을 나타내는 센티널 값 목록입니다.
///
/// 정규화기는 소스 IP를 추출할 수 없는 이벤트에 이 값 중 하나를 기록하고,
/// 상관 엔진은 이 값을 가진 이벤트로부터 알림을 생성하지 않습니다.
pub const LOCAL_SENTINELS: [&str; 5] = ["LOCAL", "LOCAL_CONSOLE", "-", "127.0.0.1", "::1"];

/// 리눅스 sudo처럼 로컬에서 발생한 이벤트의 기본 센티널입니다.
pub const SENTINEL_LOCAL: &str = "LOCAL";

/// Windows 콘솔 로그인 실패 이벤트의 센티널입니다.
pub const SENTINEL_LOCAL_CONSOLE: &str = "LOCAL_CONSOLE";

/// 주어진 소스 IP가 로컬 센티널인지 판별합니다.
pub fn is_local_source(ip: &str) -> bool {
    LOCAL_SENTINELS.contains(&ip)
}

/// 정규화된 인증 이벤트의 종류
///
/// 배치 파일과 알림 스트림에는 SCREAMING_SNAKE_CASE 와이어 이름으로 기록됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    /// 리눅스 sshd 비밀번호 인증 실패
    FailedLogin,
    /// 리눅스 sshd 존재하지 않는 사용자 로그인 시도
    InvalidUser,
    /// 리눅스 sudo 명령 실행
    SudoUsage,
    /// Windows 보안 감사 로그인 실패 (이벤트 ID 4625)
    WinFailedLogin,
    /// Windows OpenSSH 로그인 실패
    SshWindowsLogin,
}

impl EventKind {
    /// 저장 형식에 기록되는 와이어 이름을 반환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FailedLogin => "FAILED_LOGIN",
            Self::InvalidUser => "INVALID_USER",
            Self::SudoUsage => "SUDO_USAGE",
            Self::WinFailedLogin => "WIN_FAILED_LOGIN",
            Self::SshWindowsLogin => "SSH_WINDOWS_LOGIN",
        }
    }

    /// 와이어 이름에서 이벤트 종류를 파싱합니다.
    ///
    /// 배치 파일을 다시 읽을 때 사용하며, 대소문자를 구분합니다.
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "FAILED_LOGIN" => Some(Self::FailedLogin),
            "INVALID_USER" => Some(Self::InvalidUser),
            "SUDO_USAGE" => Some(Self::SudoUsage),
            "WIN_FAILED_LOGIN" => Some(Self::WinFailedLogin),
            "SSH_WINDOWS_LOGIN" => Some(Self::SshWindowsLogin),
            _ => None,
        }
    }

    /// 공격 시그널 여부를 반환합니다.
    ///
    /// sudo 사용은 감사 목적으로 수집하지만 공격으로 취급하지 않습니다.
    pub fn is_attack(&self) -> bool {
        !matches!(self, Self::SudoUsage)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 알림 심각도
///
/// 순서 비교가 가능합니다: `Warning < Critical`
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    /// 단독 공격 시그널
    #[default]
    Warning,
    /// 교차 호스트 공격 또는 차단된 IP의 활동
    Critical,
}

impl Severity {
    /// 대소문자를 무시하고 문자열에서 심각도를 파싱합니다.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "warning" | "warn" => Some(Self::Warning),
            "critical" | "crit" => Some(Self::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Warning => "WARNING",
            Self::Critical => "CRITICAL",
        };
        write!(f, "{s}")
    }
}

/// IP 신뢰 레지스트리의 상태 값
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrustStatus {
    /// 아직 판정되지 않은 IP (기본값)
    #[default]
    Unknown,
    /// 운영자가 신뢰한다고 지정한 IP. 알림을 생성하지 않습니다.
    Trusted,
    /// 차단된 IP. 모든 공격 이벤트가 CRITICAL 알림이 됩니다.
    Banned,
}

impl TrustStatus {
    /// 대소문자를 무시하고 문자열에서 신뢰 상태를 파싱합니다.
    ///
    /// CLI 인자(`trusted`, `banned`, `unknown`)를 받아들이기 위한 용도입니다.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "unknown" => Some(Self::Unknown),
            "trusted" | "trust" => Some(Self::Trusted),
            "banned" | "ban" => Some(Self::Banned),
            _ => None,
        }
    }
}

impl fmt::Display for TrustStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unknown => "UNKNOWN",
            Self::Trusted => "TRUSTED",
            Self::Banned => "BANNED",
        };
        write!(f, "{s}")
    }
}

/// 플릿 호스트의 운영체제 종류
///
/// 운영체제에 따라 수집 명령과 정규화 규칙이 달라집니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsKind {
    /// systemd journal 기반 리눅스
    Linux,
    /// 보안 감사 로그 + OpenSSH 운영 로그 기반 Windows
    Windows,
}

impl OsKind {
    /// 설정 파일에 쓰이는 소문자 이름을 반환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::Windows => "windows",
        }
    }

    /// 대소문자를 무시하고 문자열에서 운영체제 종류를 파싱합니다.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "linux" => Some(Self::Linux),
            "windows" | "win" => Some(Self::Windows),
            _ => None,
        }
    }
}

impl fmt::Display for OsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 플릿 설정에 등록된 원격 호스트
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    /// 플릿 안에서 유일한 호스트 식별자
    pub id: String,
    /// 접속 주소 (IP 또는 호스트네임)
    pub address: String,
    /// 운영체제 종류
    pub os: OsKind,
    /// 원격 셸 계정 이름
    #[serde(default = "default_username")]
    pub username: String,
    /// SSH 포트
    #[serde(default = "default_ssh_port")]
    pub port: u16,
}

fn default_username() -> String {
    "root".to_owned()
}

fn default_ssh_port() -> u16 {
    22
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {})", self.id, self.address, self.os)
    }
}

/// IP 신뢰 레지스트리의 단일 엔트리
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IpTrustEntry {
    /// 소스 IP 또는 로컬 센티널 값
    pub ip: String,
    /// 신뢰 상태
    #[serde(default)]
    pub status: TrustStatus,
    /// 마지막으로 관측된 시각 (UTC)
    pub last_seen: chrono::DateTime<chrono::Utc>,
}

impl IpTrustEntry {
    /// UNKNOWN 상태의 새 엔트리를 생성합니다.
    pub fn new(ip: impl Into<String>, last_seen: chrono::DateTime<chrono::Utc>) -> Self {
        Self {
            ip: ip.into(),
            status: TrustStatus::Unknown,
            last_seen,
        }
    }
}

impl fmt::Display for IpTrustEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] last seen {}",
            self.ip,
            self.status,
            self.last_seen.format("%Y-%m-%d %H:%M:%S")
        )
    }
}
