//! allow 규칙 생성
//!
//! 병합 후 살아남은 레코드를 `allow S T:C perms;` 형식으로 렌더링합니다.
//! 결과는 문자열 단위로 중복 제거되고 사전순으로 정렬됩니다.

use std::collections::BTreeSet;
use std::fmt;

use crate::record::DenialRecord;

/// 레코드 하나를 빌려서 만든 allow 규칙 뷰
pub struct AllowRule<'a> {
    pub source: &'a str,
    pub target: &'a str,
    pub class: &'a str,
    pub perms: &'a BTreeSet<String>,
}

impl<'a> From<&'a DenialRecord> for AllowRule<'a> {
    fn from(record: &'a DenialRecord) -> Self {
        Self {
            source: record.source_context.as_str(),
            target: record.target_context.as_str(),
            class: &record.target_class,
            perms: &record.operations,
        }
    }
}

impl fmt::Display for AllowRule<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "allow {} {}:{} ", self.source, self.target, self.class)?;
        let mut perms = self.perms.iter();
        match (perms.next(), self.perms.len()) {
            (None, _) => {}
            (Some(only), 1) => f.write_str(only)?,
            (Some(first), _) => {
                write!(f, "{{ {first}")?;
                for perm in perms {
                    write!(f, " {perm}")?;
                }
                f.write_str(" }")?;
            }
        }
        f.write_str(";")
    }
}

/// 레코드 집합을 정책 규칙으로 변환합니다.
#[derive(Debug, Clone)]
pub struct RuleSynthesizer {
    excluded_permissions: BTreeSet<String>,
}

impl RuleSynthesizer {
    /// 제외할 권한 목록으로 생성합니다.
    ///
    /// 제외 권한이 하나라도 포함된 레코드는 규칙을 만들지 않습니다.
    pub fn new<I, S>(excluded_permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            excluded_permissions: excluded_permissions.into_iter().map(Into::into).collect(),
        }
    }

    /// 레코드 하나를 렌더링합니다. inert이거나 제외 권한을 포함하면 `None`.
    pub fn render(&self, record: &DenialRecord) -> Option<String> {
        if record.is_inert() {
            return None;
        }
        if let Some(perm) = record
            .operations
            .iter()
            .find(|op| self.excluded_permissions.contains(*op))
        {
            tracing::debug!(
                source = record.source_context.as_str(),
                target = record.target_context.as_str(),
                perm = perm.as_str(),
                "suppressing rule with excluded permission"
            );
            return None;
        }
        Some(AllowRule::from(record).to_string())
    }

    /// 모든 레코드를 렌더링해 중복 없는 규칙 집합을 만듭니다.
    pub fn synthesize<'a, I>(&self, records: I) -> PolicyRules
    where
        I: IntoIterator<Item = &'a DenialRecord>,
    {
        PolicyRules(records.into_iter().filter_map(|r| self.render(r)).collect())
    }
}

impl Default for RuleSynthesizer {
    fn default() -> Self {
        Self::new(["sys_admin"])
    }
}

/// 정렬되고 중복이 제거된 규칙 라인 집합
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyRules(BTreeSet<String>);

impl PolicyRules {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 사전순으로 규칙을 순회합니다.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// 규칙마다 한 줄씩, 줄바꿈으로 끝나는 파일 본문
impl fmt::Display for PolicyRules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for rule in &self.0 {
            writeln!(f, "{rule}")?;
        }
        Ok(())
    }
}
