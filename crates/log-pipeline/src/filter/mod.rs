//! 라인 필터 구현
//!
//! - [`AvcFilter`]: SELinux AVC 거부 라인. 매칭 시 [`DenialCollection`]에 레코드 추가
//! - [`PropertyFilter`]: libc 시스템 프로퍼티 접근 거부 라인. 이름만 있는 메시지는 첫 번째만 매칭
//!
//! 모든 필터는 [`LineFilter`](bootlogger_core::LineFilter)를 구현하며
//! `Arc<dyn LineFilter>`로 여러 테일러에 공유됩니다.

pub mod avc;
pub mod property;

pub use avc::{AvcFilter, DenialCollection};
pub use property::PropertyFilter;
