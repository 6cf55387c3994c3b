//! IP 신뢰 레지스트리 -- 관측된 소스 IP의 신뢰 상태를 관리합니다.
//!
//! 레지스트리는 `<data_dir>/registry.json` 하나로 영속화되는 단순한
//! 메모리 맵입니다. 상관 엔진은 분석 결과를 커밋할 때 갱신하고,
//! 운영자는 CLI로 상태를 직접 지정합니다. 두 경로 모두 변경 후
//! [`save`](TrustRegistry::save)를 호출해야 디스크에 반영됩니다.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use authwatch_core::error::StorageError;
use authwatch_core::types::{IpTrustEntry, TrustStatus};

use crate::store::write_atomic;

/// 레지스트리 파일 이름
const REGISTRY_FILE: &str = "registry.json";

/// 디스크 표현: IP를 키로 쓰므로 엔트리에는 상태와 관측 시각만 남습니다.
#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    #[serde(default)]
    status: TrustStatus,
    last_seen: DateTime<Utc>,
}

/// IP 신뢰 레지스트리
#[derive(Debug, Clone)]
pub struct TrustRegistry {
    path: PathBuf,
    entries: BTreeMap<String, IpTrustEntry>,
}

impl TrustRegistry {
    /// 데이터 디렉토리에서 레지스트리를 읽습니다.
    ///
    /// 파일이 없으면 빈 레지스트리로 시작합니다.
    pub fn load(data_dir: &Path) -> Result<Self, StorageError> {
        let path = data_dir.join(REGISTRY_FILE);
        if !path.exists() {
            return Ok(Self {
                path,
                entries: BTreeMap::new(),
            });
        }

        let raw = fs::read_to_string(&path).map_err(|e| StorageError::ReadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let stored: BTreeMap<String, StoredEntry> =
            serde_json::from_str(&raw).map_err(|e| StorageError::Corrupt {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        let entries = stored
            .into_iter()
            .map(|(ip, entry)| {
                let full = IpTrustEntry {
                    ip: ip.clone(),
                    status: entry.status,
                    last_seen: entry.last_seen,
                };
                (ip, full)
            })
            .collect();
        Ok(Self { path, entries })
    }

    /// 레지스트리를 원자적으로 저장합니다.
    pub fn save(&self) -> Result<(), StorageError> {
        let stored: BTreeMap<&str, StoredEntry> = self
            .entries
            .values()
            .map(|entry| {
                (
                    entry.ip.as_str(),
                    StoredEntry {
                        status: entry.status,
                        last_seen: entry.last_seen,
                    },
                )
            })
            .collect();
        let json = serde_json::to_vec_pretty(&stored).map_err(|e| StorageError::WriteFailed {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })?;
        write_atomic(&self.path, &json)
    }

    /// 레지스트리 파일 경로를 반환합니다.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// IP의 신뢰 상태를 반환합니다. 미등록 IP는 UNKNOWN입니다.
    pub fn status(&self, ip: &str) -> TrustStatus {
        self.entries
            .get(ip)
            .map(|entry| entry.status)
            .unwrap_or_default()
    }

    /// IP의 엔트리를 반환합니다.
    pub fn get(&self, ip: &str) -> Option<&IpTrustEntry> {
        self.entries.get(ip)
    }

    /// IP 관측을 기록합니다.
    ///
    /// 미등록 IP는 UNKNOWN으로 추가하고, 기존 엔트리는 상태를 유지한 채
    /// `last_seen`만 갱신합니다.
    pub fn observe(&mut self, ip: &str, seen_at: DateTime<Utc>) {
        self.entries
            .entry(ip.to_owned())
            .and_modify(|entry| entry.last_seen = seen_at)
            .or_insert_with(|| IpTrustEntry::new(ip, seen_at));
    }

    /// IP의 신뢰 상태를 지정합니다. 미등록 IP는 새로 추가합니다.
    pub fn set_status(&mut self, ip: &str, status: TrustStatus, now: DateTime<Utc>) {
        self.entries
            .entry(ip.to_owned())
            .and_modify(|entry| entry.status = status)
            .or_insert_with(|| IpTrustEntry {
                ip: ip.to_owned(),
                status,
                last_seen: now,
            });
    }

    /// 상관 엔진이 스테이징한 엔트리를 그대로 반영합니다.
    pub fn apply(&mut self, entry: IpTrustEntry) {
        self.entries.insert(entry.ip.clone(), entry);
    }

    /// IP 엔트리를 제거합니다. 존재했으면 true를 반환합니다.
    pub fn remove(&mut self, ip: &str) -> bool {
        self.entries.remove(ip).is_some()
    }

    /// 등록된 엔트리 수를 반환합니다.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 레지스트리가 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 주어진 상태의 엔트리 수를 반환합니다.
    pub fn count_with_status(&self, status: TrustStatus) -> usize {
        self.entries
            .values()
            .filter(|entry| entry.status == status)
            .count()
    }

    /// 엔트리를 최근 관측 순으로 반환합니다.
    pub fn entries_by_last_seen(&self) -> Vec<&IpTrustEntry> {
        let mut entries: Vec<&IpTrustEntry> = self.entries.values().collect();
        entries.sort_by(|a, b| b.last_seen.cmp(&a.last_seen).then_with(|| a.ip.cmp(&b.ip)));
        entries
    }
}
