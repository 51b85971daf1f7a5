//! AVC 거부/허용 레코드 파서
//!
//! 커널 감사 메시지 한 줄을 [`DenialRecord`]로 변환합니다.
//!
//! # 입력 형식
//! ```text
//! ... avc: denied { read write } for pid=1 comm="foo" scontext=u:r:foo:s0 tcontext=u:object_r:bar:s0 tclass=file permissive=0
//! ```
//!
//! - 마커(`avc:`) 앞부분은 버립니다 (dmesg 타임스탬프, logcat 헤더 등).
//! - `{`와 `}` 사이 토큰은 모두 권한 이름입니다.
//! - `for` 뒤의 토큰은 `key=value` 쌍이며, 값의 큰따옴표는 제거합니다.
//! - `scontext`, `tcontext`, `tclass`, `permissive`는 필수입니다.

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use crate::context::SecurityContext;
use crate::error::DenialParseError;

/// 하나의 AVC 결정 이벤트
///
/// 파싱에 성공한 경우에만 생성되므로 필수 필드는 항상 채워져 있습니다.
/// 병합 엔진만 `operations`를 확장하고 `inert` 표시를 설정합니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenialRecord {
    /// 허용(granted)이면 true, 거부(denied)면 false
    pub granted: bool,
    /// 권한 이름 집합 (ioctl, read, open...)
    pub operations: BTreeSet<String>,
    /// 주체 컨텍스트
    pub source_context: SecurityContext,
    /// 대상 컨텍스트
    pub target_context: SecurityContext,
    /// 대상 객체 클래스 (file, chr_file, sock_file...)
    pub target_class: String,
    /// 소비되지 않은 나머지 `key=value` 필드 (ino, name, comm...)
    pub attributes: BTreeMap<String, String>,
    /// 이벤트 시점의 permissive 여부
    pub permissive: bool,
    /// 다른 레코드에 흡수되었는지 여부
    pub(crate) inert: bool,
}

impl DenialRecord {
    /// 레코드 시작을 알리는 마커
    pub const MARKER: &'static str = "avc:";

    /// 로그 라인 한 줄을 파싱합니다.
    ///
    /// 어떤 입력에도 패닉하지 않으며, 실패하면 사유를 담은 에러를 반환합니다.
    /// 부분적으로만 유효한 레코드는 만들지 않습니다.
    pub fn parse(line: &str) -> Result<Self, DenialParseError> {
        let start = line.find(Self::MARKER).ok_or(DenialParseError::MissingMarker {
            marker: Self::MARKER,
        })?;

        let mut tokens = line[start..].split_whitespace();
        tokens.next(); // avc:

        let granted = match tokens.next() {
            Some("granted") => true,
            Some("denied") => false,
            Some(other) => return Err(DenialParseError::UnknownStatus(other.to_owned())),
            None => return Err(DenialParseError::MissingStatus),
        };

        match tokens.next() {
            Some("{") => {}
            other => {
                return Err(DenialParseError::MissingOperations {
                    found: other.map(str::to_owned),
                });
            }
        }

        let mut operations = BTreeSet::new();
        loop {
            match tokens.next() {
                Some("}") => break,
                Some(op) => {
                    operations.insert(op.to_owned());
                }
                None => return Err(DenialParseError::UnterminatedOperations),
            }
        }

        let mut tokens = tokens.peekable();
        if tokens.next_if_eq(&"for").is_none() {
            tracing::debug!(line, "denial record without 'for' keyword");
        }

        let mut attributes = BTreeMap::new();
        for token in tokens {
            let Some((key, value)) = token.split_once('=') else {
                tracing::debug!(token, "skipping unparsable attribute");
                continue;
            };
            // 중복 키는 처음 값을 유지
            attributes
                .entry(key.to_owned())
                .or_insert_with(|| trim_double_quotes(value).to_owned());
        }

        let scontext = attributes.remove("scontext");
        let tcontext = attributes.remove("tcontext");
        let tclass = attributes.remove("tclass");
        let permissive = attributes.remove("permissive");

        let missing: Vec<&'static str> = [
            ("scontext", scontext.is_none()),
            ("tcontext", tcontext.is_none()),
            ("tclass", tclass.is_none()),
            ("permissive", permissive.is_none()),
        ]
        .into_iter()
        .filter_map(|(key, absent)| absent.then_some(key))
        .collect();

        let (Some(scontext), Some(tcontext), Some(target_class), Some(permissive)) =
            (scontext, tcontext, tclass, permissive)
        else {
            return Err(DenialParseError::MissingFields(missing));
        };

        let permissive = match permissive.parse::<i64>() {
            Ok(0) => false,
            Ok(1) => true,
            _ => return Err(DenialParseError::InvalidPermissive(permissive)),
        };

        Ok(Self {
            granted,
            operations,
            source_context: SecurityContext::new(&scontext),
            target_context: SecurityContext::new(&tcontext),
            target_class,
            attributes,
            permissive,
            inert: false,
        })
    }

    /// 다른 레코드에 흡수되어 렌더링에서 제외되는지 여부
    pub fn is_inert(&self) -> bool {
        self.inert
    }

    /// 두 레코드가 권한 집합만 다른 동등한 이벤트인지 판정합니다.
    ///
    /// `attributes`와 `permissive`는 비교하지 않습니다.
    pub fn is_mergeable_with(&self, other: &Self) -> bool {
        self.granted == other.granted
            && self.source_context == other.source_context
            && self.target_context == other.target_context
            && self.target_class == other.target_class
    }
}

impl FromStr for DenialRecord {
    type Err = DenialParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// 양 끝이 큰따옴표이고 안에 한 글자 이상 있으면 따옴표를 제거합니다.
fn trim_double_quotes(value: &str) -> &str {
    if value.len() > 2 && value.starts_with('"') && value.ends_with('"') {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IOCTL_LINE: &str = "avc: denied { ioctl } for comm=\"bar\" scontext=u:r:mydomain:s0 tcontext=u:object_r:vendor_device:s0 tclass=chr_file permissive=0";

    fn ops(record: &DenialRecord) -> Vec<&str> {
        record.operations.iter().map(String::as_str).collect()
    }

    #[test]
    fn parses_single_operation_denial() {
        let record = DenialRecord::parse(IOCTL_LINE).unwrap();
        assert!(!record.granted);
        assert_eq!(ops(&record), vec!["ioctl"]);
        assert_eq!(record.source_context.as_str(), "mydomain");
        assert_eq!(record.target_context.as_str(), "vendor_device");
        assert_eq!(record.target_class, "chr_file");
        assert!(!record.permissive);
        assert!(!record.is_inert());
        // comm만 남고 따옴표는 제거됨
        assert_eq!(record.attributes.len(), 1);
        assert_eq!(record.attributes.get("comm").map(String::as_str), Some("bar"));
    }

    #[test]
    fn discards_prefix_before_marker() {
        let line = format!("[   12.345678] type=1400 audit(0.0:4): {IOCTL_LINE}");
        let record = DenialRecord::parse(&line).unwrap();
        assert_eq!(record.source_context.as_str(), "mydomain");
        assert!(!record.attributes.contains_key("type"));
    }

    #[test]
    fn parses_kernel_style_denial_with_residual_attributes() {
        let line = "<5>[ 3.1] audit: type=1400 audit(1.2:3): avc:  denied  { read write } for  pid=612 comm=\"init\" name=\"mmcblk0\" dev=\"tmpfs\" ino=1234 scontext=u:r:init:s0 tcontext=u:object_r:block_device:s0 tclass=blk_file permissive=1";
        let record = DenialRecord::parse(line).unwrap();
        assert_eq!(ops(&record), vec!["read", "write"]);
        assert!(record.permissive);
        let keys: Vec<&str> = record.attributes.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["comm", "dev", "ino", "name", "pid"]);
        assert_eq!(record.attributes["name"], "mmcblk0");
    }

    #[test]
    fn parses_granted_status() {
        let line = "avc: granted { find } for scontext=u:r:a:s0 tcontext=u:object_r:b:s0 tclass=service_manager permissive=0";
        let record: DenialRecord = line.parse().unwrap();
        assert!(record.granted);
    }

    #[test]
    fn empty_operation_braces_are_valid() {
        let line = "avc: denied { } for scontext=u:r:a:s0 tcontext=u:r:b:s0 tclass=file permissive=0";
        let record = DenialRecord::parse(line).unwrap();
        assert!(record.operations.is_empty());
    }

    #[test]
    fn duplicate_operations_collapse() {
        let line = "avc: denied { read read open } for scontext=u:r:a:s0 tcontext=u:r:b:s0 tclass=file permissive=0";
        let record = DenialRecord::parse(line).unwrap();
        assert_eq!(ops(&record), vec!["open", "read"]);
    }

    #[test]
    fn unparsable_attribute_is_skipped() {
        let line = "avc: denied { read } for garbage scontext=u:r:a:s0 tcontext=u:r:b:s0 tclass=file permissive=0 trailing";
        let record = DenialRecord::parse(line).unwrap();
        assert!(record.attributes.is_empty());
    }

    #[test]
    fn quote_trimming_needs_content() {
        let line = "avc: denied { read } for name=\"\" path=\"/data\" scontext=u:r:a:s0 tcontext=u:r:b:s0 tclass=file permissive=0";
        let record = DenialRecord::parse(line).unwrap();
        assert_eq!(record.attributes["name"], "\"\"");
        assert_eq!(record.attributes["path"], "/data");
    }

    #[test]
    fn rejects_missing_marker() {
        assert_eq!(
            DenialRecord::parse("denied { read } for").unwrap_err(),
            DenialParseError::MissingMarker { marker: "avc:" }
        );
    }

    #[test]
    fn rejects_unknown_status() {
        let err = DenialRecord::parse("avc: audited { read } for").unwrap_err();
        assert_eq!(err, DenialParseError::UnknownStatus("audited".to_owned()));
    }

    #[test]
    fn rejects_missing_status() {
        assert_eq!(
            DenialRecord::parse("avc:").unwrap_err(),
            DenialParseError::MissingStatus
        );
    }

    #[test]
    fn rejects_missing_opening_brace() {
        let err = DenialRecord::parse("avc: denied read } for").unwrap_err();
        assert_eq!(
            err,
            DenialParseError::MissingOperations {
                found: Some("read".to_owned())
            }
        );
    }

    #[test]
    fn rejects_unterminated_operations() {
        let err = DenialRecord::parse("avc: denied { read write for scontext=u:r:a:s0").unwrap_err();
        assert_eq!(err, DenialParseError::UnterminatedOperations);
    }

    #[test]
    fn rejects_missing_required_keys() {
        let err = DenialRecord::parse("avc: denied { read } for scontext=u:r:a:s0 permissive=0")
            .unwrap_err();
        assert_eq!(
            err,
            DenialParseError::MissingFields(vec!["tcontext", "tclass"])
        );
    }

    #[test]
    fn rejects_invalid_permissive() {
        for value in ["2", "-1", "yes", ""] {
            let line = format!(
                "avc: denied {{ read }} for scontext=u:r:a:s0 tcontext=u:r:b:s0 tclass=file permissive={value}"
            );
            assert_eq!(
                DenialRecord::parse(&line).unwrap_err(),
                DenialParseError::InvalidPermissive(value.to_owned())
            );
        }
    }

    #[test]
    fn mergeability_ignores_attributes_and_permissive() {
        let a = DenialRecord::parse(IOCTL_LINE).unwrap();
        let b = DenialRecord::parse(
            "avc: denied { open } for ino=9 scontext=u:r:mydomain:s0 tcontext=u:object_r:vendor_device:s0 tclass=chr_file permissive=1",
        )
        .unwrap();
        assert!(a.is_mergeable_with(&b));

        let other_class = DenialRecord::parse(
            "avc: denied { open } for scontext=u:r:mydomain:s0 tcontext=u:object_r:vendor_device:s0 tclass=blk_file permissive=0",
        )
        .unwrap();
        assert!(!a.is_mergeable_with(&other_class));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn parse_arbitrary_text_does_not_panic(line in ".{0,400}") {
                let _ = DenialRecord::parse(&line);
            }

            #[test]
            fn parse_marker_prefixed_tokens_does_not_panic(
                tokens in prop::collection::vec("[a-z{}=\"_:]{0,12}", 0..30)
            ) {
                let line = format!("avc: {}", tokens.join(" "));
                let _ = DenialRecord::parse(&line);
            }

            #[test]
            fn well_formed_lines_roundtrip_fields(
                ops in prop::collection::btree_set("[a-z_]{1,10}", 1..6),
                source in "[a-z_]{1,16}",
                target in "[a-z_]{1,16}",
                class in "[a-z_]{1,12}",
                permissive in any::<bool>(),
            ) {
                let op_list: Vec<&str> = ops.iter().map(String::as_str).collect();
                let line = format!(
                    "avc: denied {{ {} }} for pid=1 scontext=u:r:{source}:s0 tcontext=u:object_r:{target}:s0 tclass={class} permissive={}",
                    op_list.join(" "),
                    u8::from(permissive),
                );
                let record = DenialRecord::parse(&line).unwrap();
                prop_assert_eq!(&record.operations, &ops);
                prop_assert_eq!(record.source_context.as_str(), source.as_str());
                prop_assert_eq!(record.target_context.as_str(), target.as_str());
                prop_assert_eq!(&record.target_class, &class);
                prop_assert_eq!(record.permissive, permissive);
                prop_assert_eq!(record.attributes.len(), 1);
            }
        }
    }
}
