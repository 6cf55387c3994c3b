#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`collector`]: OS별 원격 로그 수집 (Linux journalctl, Windows 이벤트 로그)
//! - [`normalizer`]: 원시 엔트리를 [`AuthEvent`](authwatch_core::event::AuthEvent)로 정규화
//! - [`store`]: 배치 CSV, 워터마크, 수집/알림 원장의 디스크 저장
//! - [`registry`]: IP 신뢰 레지스트리 (unknown/trusted/banned)
//! - [`correlate`]: 중복 제거와 교차 호스트 상관 분석
//! - [`cycle`]: 호스트 단위 수집-커밋 사이클
//! - [`executor`]: SSH 기반 원격 명령 실행
//! - [`pipeline`]: 플릿 순회 오케스트레이션 (Pipeline trait 구현)
//! - [`config`]: 파이프라인 설정 (core 설정 확장)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! Fleet sweep -> Collector -> Normalizer -> DataStore -> CorrelationEngine -> downstream
//!     |             |             |            |               |
//!  Semaphore    ssh/journalctl  regex/json   CSV batch    dedup + cross-host
//!               PowerShell                   watermark     trust registry
//! ```

pub mod config;
pub mod correlate;
pub mod cycle;
pub mod error;
pub mod pipeline;
pub mod registry;
pub mod store;

pub mod collector;
pub mod executor;
pub mod normalizer;

// --- 주요 타입 re-export ---

// 파이프라인
pub use pipeline::{FetchPipeline, FetchPipelineBuilder, fetch_host_once};

// 설정
pub use config::{PipelineConfig, PipelineConfigBuilder};

// 에러
pub use error::LogPipelineError;

// 수집기
pub use collector::{RawEntry, RawOrigin};

// 정규화
pub use normalizer::{NormalizedBatch, Normalizer};

// 저장소
pub use store::DataStore;

// 레지스트리
pub use registry::TrustRegistry;

// 상관 분석
pub use correlate::{AnalysisReport, AnalysisStats, CorrelationEngine};

// 사이클
pub use cycle::{CycleOutcome, CycleReport, CycleStep, SharedState, run_cycle};

// 원격 실행
pub use executor::{OpenSshShell, RemoteExecutor, RemoteOutput};
