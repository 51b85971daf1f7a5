//! Bootlogger 로그 수집 파이프라인
//!
//! # 모듈 구성
//!
//! - [`source`]: 로그 소스 (`/proc/kmsg` 파일, `logcat` 명령)
//! - [`sink`]: 버퍼링된 라인 출력 파일, 빈 파일 정리
//! - [`filter`]: [`LineFilter`](bootlogger_core::LineFilter) 구현 (AVC, libc 프로퍼티)
//! - [`tailer`]: 소스 하나를 읽어 필터와 싱크로 분배하는 테일러
//! - [`pipeline`]: 테일러 태스크 묶음 실행과 조인
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! LogSource --open--> SourceStream --Tailer::run--> [filter_1 .. filter_n] --> <filter>.<source>.txt
//!                                        |                 |
//!                                        |                 +--> DenialCollection (avc)
//!                                        +--> <source>.txt
//! ```

pub mod error;
pub mod filter;
pub mod pipeline;
pub mod sink;
pub mod source;
pub mod tailer;

// --- 주요 타입 re-export ---

// 에러
pub use error::LogPipelineError;

// 필터
pub use filter::{AvcFilter, DenialCollection, PropertyFilter};

// 실행
pub use pipeline::CapturePipeline;
pub use tailer::{StopReason, Tailer, TailerConfig, TailerStats};

// 입출력
pub use sink::OutputSink;
pub use source::{LogSource, SourceStream};
