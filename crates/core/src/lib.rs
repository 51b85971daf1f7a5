//! Bootlogger 공통 크레이트
//!
//! 다른 크레이트가 공유하는 최상위 에러 타입, `bootlogger.toml` 설정,
//! 라인 필터 확장 포인트, 메트릭 이름을 정의합니다.
//!
//! # 모듈 구성
//! - [`config`]: TOML 설정 + 환경변수 오버라이드
//! - [`error`]: 도메인 에러 타입
//! - [`pipeline`]: [`LineFilter`] trait
//! - [`metrics`]: 메트릭 이름 상수

pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;

// --- 주요 타입 re-export ---

// 에러
pub use error::{BootloggerError, ConfigError, PipelineError};

// 설정
pub use config::{BootloggerConfig, SessionMode};

// 필터 trait
pub use pipeline::LineFilter;
