//! 커널 빌드 설정 분류기
//!
//! `/proc/config.gz`를 풀어 한 줄씩 분류한 뒤 심볼 테이블을 만듭니다.
//! 데몬은 이 테이블에서 `CONFIG_AUDIT`이 빌트인인지 여부만 사용합니다.
//!
//! # 모듈 구성
//! - [`table`]: 라인 분류와 [`KernelConfig`] 심볼 테이블
//! - [`reader`]: gzip 해제와 감사 게이트
//! - [`error`]: 읽기 에러 타입

pub mod error;
pub mod reader;
pub mod table;

pub use error::KernelConfigError;
pub use reader::{audit_available, read_config_gz};
pub use table::{ConfigValue, KernelConfig};
