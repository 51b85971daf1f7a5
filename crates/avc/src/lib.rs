//! AVC 거부 레코드 처리 -- 파싱, 병합, allow 규칙 생성
//!
//! # 모듈 구성
//!
//! - [`context`]: 보안 컨텍스트 레이블 (`u:r:foo:s0` -> `foo`)
//! - [`record`]: 로그 라인 -> [`DenialRecord`] 파서
//! - [`merge`]: 동등한 레코드의 권한 집합 병합
//! - [`rules`]: 살아남은 레코드를 정렬/중복 제거된 allow 규칙으로 렌더링
//! - [`error`]: 파싱 에러 타입
//!
//! # 흐름
//!
//! ```text
//! "... avc: denied { ioctl } for ... scontext=u:r:foo:s0 ..."
//!     |  DenialRecord::parse
//!     v
//! Vec<DenialRecord> --merge_records--> RuleSynthesizer::synthesize --> PolicyRules
//! ```

pub mod context;
pub mod error;
pub mod merge;
pub mod record;
pub mod rules;

pub use context::SecurityContext;
pub use error::DenialParseError;
pub use merge::{MergeSummary, merge_records};
pub use record::DenialRecord;
pub use rules::{AllowRule, PolicyRules, RuleSynthesizer};
