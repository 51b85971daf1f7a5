//! libc 시스템 프로퍼티 접근 거부 필터
//!
//! ```text
//! libc    : Access denied finding property "ro.vendor.foo"
//! libc    : Unable to set property "ctl.start" to "vendor.bar"
//! ```
//!
//! 두 번째 형태(대상 값 포함)는 항상 매칭합니다.
//! 첫 번째 형태(이름만)는 같은 이름이 반복되면 처음 한 번만 매칭합니다.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use regex::Regex;

use bootlogger_core::LineFilter;

use crate::error::LogPipelineError;

const PROPERTY_PATTERN: &str =
    r#"libc\s+:\s+\w+\s\w+\s\w+\s\w+\s"([\w.\-]+)"( to "([\w.@:/\-]+)")?"#;

/// 프로퍼티 접근 거부 필터
pub struct PropertyFilter {
    pattern: Regex,
    /// 이미 보고한 프로퍼티 이름 (필터 인스턴스 수명 동안 유지)
    seen: Mutex<HashSet<String>>,
}

impl PropertyFilter {
    pub const NAME: &'static str = "libc_props";

    pub fn new() -> Result<Self, LogPipelineError> {
        Ok(Self {
            pattern: Regex::new(PROPERTY_PATTERN)?,
            seen: Mutex::new(HashSet::new()),
        })
    }

    /// 처음 보는 이름이면 기록하고 `true`
    fn first_sighting(&self, property: &str) -> bool {
        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        if seen.contains(property) {
            return false;
        }
        seen.insert(property.to_owned())
    }
}

impl LineFilter for PropertyFilter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn matches(&self, line: &str) -> bool {
        let Some(caps) = self.pattern.captures(line) else {
            return false;
        };
        let Some(property) = caps.get(1).map(|m| m.as_str()) else {
            return false;
        };

        if let Some(destination) = caps.get(3) {
            tracing::info!(
                property,
                destination = destination.as_str(),
                "control message could not be set"
            );
            return true;
        }

        let first = self.first_sighting(property);
        if first {
            tracing::info!(property, "property access denied");
        }
        first
    }
}
