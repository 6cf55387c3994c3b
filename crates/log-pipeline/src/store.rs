//! 데이터 저장소 -- 배치 파일, 워터마크, 장부 파일의 디스크 레이아웃
//!
//! 데이터 디렉토리 구조:
//! ```text
//! <data_dir>/
//!   batches/logs_{host}_{YYYYMMDD_HHMMSS}.csv   커밋된 이벤트 배치
//!   watermarks.json                             호스트별 수집 하한선
//!   archives.jsonl                              배치 커밋 장부 (append)
//!   alerts.jsonl                                알림 장부 (append)
//! ```
//!
//! 전체 파일을 다시 쓰는 경로(배치, 워터마크)는 임시 파일에 쓴 뒤
//! rename하는 방식으로 원자성을 보장합니다. 장부 파일은 append 전용이라
//! 마지막 줄이 잘릴 수 있으므로, 읽을 때 손상된 줄은 경고 후 건너뜁니다.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use tracing::warn;

use authwatch_core::error::StorageError;
use authwatch_core::event::{Alert, ArchiveRecord, AuthEvent};
use authwatch_core::types::EventKind;

/// 배치 파일 디렉토리 이름
const BATCH_DIR: &str = "batches";
/// 호스트별 수집 워터마크 파일 이름
const WATERMARK_FILE: &str = "watermarks.json";
/// 배치 커밋 장부 파일 이름
const ARCHIVE_FILE: &str = "archives.jsonl";
/// 알림 장부 파일 이름
const ALERT_FILE: &str = "alerts.jsonl";

/// 배치 CSV 열 순서
const BATCH_HEADER: [&str; 6] = [
    "timestamp",
    "source_ip",
    "alert_type",
    "user",
    "message",
    "raw_log",
];

fn write_err(path: &Path, e: impl std::fmt::Display) -> StorageError {
    StorageError::WriteFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    }
}

fn read_err(path: &Path, e: impl std::fmt::Display) -> StorageError {
    StorageError::ReadFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    }
}

fn corrupt(path: &Path, e: impl std::fmt::Display) -> StorageError {
    StorageError::Corrupt {
        path: path.display().to_string(),
        reason: e.to_string(),
    }
}

/// 임시 파일에 쓴 뒤 rename으로 교체합니다.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes).map_err(|e| write_err(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| write_err(path, e))
}

/// 파이프라인 디스크 상태의 단일 진입점
///
/// IP 신뢰 레지스트리는 운영자 명령으로도 변경되므로 별도 모듈
/// ([`TrustRegistry`](crate::registry::TrustRegistry))가 관리합니다.
#[derive(Debug, Clone)]
pub struct DataStore {
    data_dir: PathBuf,
}

impl DataStore {
    /// 데이터 디렉토리를 열고 필요한 하위 디렉토리를 만듭니다.
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let data_dir = data_dir.into();
        let batches = data_dir.join(BATCH_DIR);
        fs::create_dir_all(&batches).map_err(|e| write_err(&batches, e))?;
        Ok(Self { data_dir })
    }

    /// 데이터 디렉토리 경로를 반환합니다.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn batch_dir(&self) -> PathBuf {
        self.data_dir.join(BATCH_DIR)
    }

    /// 배치 파일 이름으로 절대 경로를 만듭니다.
    pub fn batch_path(&self, filename: &str) -> PathBuf {
        self.batch_dir().join(filename)
    }

    /// 호스트와 기록 시각으로 배치 파일 이름을 만듭니다.
    pub fn batch_filename(host_id: &str, now: DateTime<Utc>) -> String {
        format!("logs_{host_id}_{}.csv", now.format("%Y%m%d_%H%M%S"))
    }

    /// 이벤트 배치를 CSV 파일로 기록하고 파일 이름을 반환합니다.
    pub fn write_batch(
        &self,
        host_id: &str,
        events: &[AuthEvent],
        now: DateTime<Utc>,
    ) -> Result<String, StorageError> {
        let filename = Self::batch_filename(host_id, now);
        let path = self.batch_path(&filename);

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record(BATCH_HEADER)
            .map_err(|e| write_err(&path, e))?;
        for event in events {
            writer
                .write_record([
                    event.timestamp.to_rfc3339().as_str(),
                    &event.source_ip,
                    event.kind.as_str(),
                    &event.user,
                    &event.message,
                    &event.raw_log,
                ])
                .map_err(|e| write_err(&path, e))?;
        }
        let bytes = writer.into_inner().map_err(|e| write_err(&path, e))?;

        write_atomic(&path, &bytes)?;
        Ok(filename)
    }

    /// 배치 파일을 다시 읽습니다. 파일이 없으면 빈 목록을 반환합니다.
    pub fn read_batch(&self, filename: &str) -> Result<Vec<AuthEvent>, StorageError> {
        let path = self.batch_path(filename);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::Reader::from_path(&path).map_err(|e| read_err(&path, e))?;
        let mut events = Vec::new();
        for row in reader.records() {
            let row = row.map_err(|e| corrupt(&path, e))?;
            if row.len() != BATCH_HEADER.len() {
                return Err(corrupt(
                    &path,
                    format!("expected {} columns, got {}", BATCH_HEADER.len(), row.len()),
                ));
            }
            let timestamp = DateTime::parse_from_rfc3339(&row[0])
                .map_err(|e| corrupt(&path, e))?
                .with_timezone(&Utc);
            let kind = EventKind::from_wire(&row[2])
                .ok_or_else(|| corrupt(&path, format!("unknown event kind: {}", &row[2])))?;
            events.push(AuthEvent {
                timestamp,
                kind,
                source_ip: row[1].to_owned(),
                user: row[3].to_owned(),
                message: row[4].to_owned(),
                raw_log: row[5].to_owned(),
            });
        }
        Ok(events)
    }

    /// 커밋 실패 롤백 시 배치 파일을 제거합니다.
    ///
    /// 이미 없는 파일은 무시하고, 그 외 실패는 경고만 남깁니다.
    pub fn remove_batch(&self, filename: &str) {
        let path = self.batch_path(filename);
        if let Err(e) = fs::remove_file(&path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %path.display(), error = %e, "failed to remove batch file");
            }
        }
    }

    /// 호스트별 워터마크를 읽습니다. 파일이 없으면 빈 맵을 반환합니다.
    pub fn load_watermarks(&self) -> Result<BTreeMap<String, DateTime<Utc>>, StorageError> {
        let path = self.data_dir.join(WATERMARK_FILE);
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let raw = fs::read_to_string(&path).map_err(|e| read_err(&path, e))?;
        serde_json::from_str(&raw).map_err(|e| corrupt(&path, e))
    }

    /// 호스트별 워터마크를 원자적으로 저장합니다.
    pub fn save_watermarks(
        &self,
        watermarks: &BTreeMap<String, DateTime<Utc>>,
    ) -> Result<(), StorageError> {
        let path = self.data_dir.join(WATERMARK_FILE);
        let json = serde_json::to_vec_pretty(watermarks).map_err(|e| write_err(&path, e))?;
        write_atomic(&path, &json)
    }

    fn append_jsonl(&self, file: &str, lines: &[String]) -> Result<(), StorageError> {
        let path = self.data_dir.join(file);
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| write_err(&path, e))?;
        for line in lines {
            writeln!(f, "{line}").map_err(|e| write_err(&path, e))?;
        }
        Ok(())
    }

    fn read_jsonl<T: DeserializeOwned>(&self, file: &str) -> Result<Vec<T>, StorageError> {
        let path = self.data_dir.join(file);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&path).map_err(|e| read_err(&path, e))?;
        let mut records = Vec::new();
        for line in raw.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(record) => records.push(record),
                // append 도중 중단되면 마지막 줄이 잘릴 수 있음
                Err(e) => warn!(path = %path.display(), error = %e, "skipping corrupt ledger line"),
            }
        }
        Ok(records)
    }

    /// 배치 커밋 장부에 항목을 추가합니다.
    pub fn append_archive(&self, record: &ArchiveRecord) -> Result<(), StorageError> {
        let line = serde_json::to_string(record)
            .map_err(|e| write_err(&self.data_dir.join(ARCHIVE_FILE), e))?;
        self.append_jsonl(ARCHIVE_FILE, &[line])
    }

    /// 최근 커밋된 배치 장부 항목을 최신순으로 반환합니다.
    pub fn recent_archives(&self, limit: usize) -> Result<Vec<ArchiveRecord>, StorageError> {
        let mut records: Vec<ArchiveRecord> = self.read_jsonl(ARCHIVE_FILE)?;
        records.reverse();
        records.truncate(limit);
        Ok(records)
    }

    /// 알림 장부에 알림들을 추가합니다.
    pub fn append_alerts(&self, alerts: &[Alert]) -> Result<(), StorageError> {
        let mut lines = Vec::with_capacity(alerts.len());
        for alert in alerts {
            let line = serde_json::to_string(alert)
                .map_err(|e| write_err(&self.data_dir.join(ALERT_FILE), e))?;
            lines.push(line);
        }
        self.append_jsonl(ALERT_FILE, &lines)
    }

    /// 최근 알림을 최신순으로 반환합니다.
    pub fn recent_alerts(&self, limit: usize) -> Result<Vec<Alert>, StorageError> {
        let mut alerts: Vec<Alert> = self.read_jsonl(ALERT_FILE)?;
        alerts.reverse();
        alerts.truncate(limit);
        Ok(alerts)
    }

    /// 이벤트 시각이 `cutoff` 이후인 알림을 기록 순서대로 반환합니다.
    ///
    /// 시작 시 상관 엔진의 메모리 인덱스를 재구성할 때 사용합니다.
    pub fn alerts_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<Alert>, StorageError> {
        let alerts: Vec<Alert> = self.read_jsonl(ALERT_FILE)?;
        Ok(alerts
            .into_iter()
            .filter(|alert| alert.timestamp > cutoff)
            .collect())
    }
}
