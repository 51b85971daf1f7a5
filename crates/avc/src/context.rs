//! 보안 컨텍스트 레이블
//!
//! 커널은 `u:object_r:vendor_device:s0` 같은 전체 레이블을 기록하지만,
//! 정책 규칙에는 타입 이름(`vendor_device`)만 필요합니다.

use std::fmt;

/// 전체 레이블에서 추출한 타입/도메인 이름
///
/// `u:r:<name>:s0...` 또는 `u:object_r:<name>:s0...` 형식이면 `<name>`만 보관합니다.
/// 형식이 다르면 원문을 그대로 보관합니다 (추출은 최선 노력).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SecurityContext(String);

impl SecurityContext {
    /// 원본 레이블에서 컨텍스트를 생성합니다.
    pub fn new(raw: &str) -> Self {
        match extract_type_name(raw) {
            Some(name) => Self(name.to_owned()),
            None => Self(raw.to_owned()),
        }
    }

    /// 추출된 이름을 반환합니다.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SecurityContext {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl fmt::Display for SecurityContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `^u:(object_)?r:([\w-]+):s0(.+)?$`에 해당하는 레이블에서 이름을 꺼냅니다.
fn extract_type_name(raw: &str) -> Option<&str> {
    let rest = raw.strip_prefix("u:")?;
    let rest = rest.strip_prefix("object_").unwrap_or(rest);
    let rest = rest.strip_prefix("r:")?;
    let (name, level) = rest.split_once(':')?;

    let valid_name = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-');
    if !valid_name || !level.starts_with("s0") {
        return None;
    }
    Some(name)
}
